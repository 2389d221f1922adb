//! Background job to rebuild cached check-in counters from the ledger.

use domain::services::CheckInService;

use super::scheduler::{Job, JobError, JobFrequency};

pub struct CheckinCounterReconciliationJob {
    checkin: CheckInService,
    interval_secs: u64,
}

impl CheckinCounterReconciliationJob {
    pub fn new(checkin: CheckInService, interval_secs: u64) -> Self {
        Self {
            checkin,
            interval_secs,
        }
    }
}

#[async_trait::async_trait]
impl Job for CheckinCounterReconciliationJob {
    fn name(&self) -> &'static str {
        "checkin_counter_reconciliation"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::from_secs(self.interval_secs)
    }

    async fn execute(&self) -> Result<(), JobError> {
        let drifts = self.checkin.reconcile_counters().await?;
        tracing::debug!(drifted = drifts.len(), "Check-in counters reconciled");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::services::{RecordingNotifier, RegistrationLedger};
    use domain::store::{InMemoryStore, RegistrationStore};
    use std::sync::Arc;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_resets_drifted_counter() {
        let store = Arc::new(InMemoryStore::new());
        let event_id = Uuid::new_v4();
        store.set_checkin_counter(event_id, 7).await;

        let ledger = RegistrationLedger::new(
            store.clone(),
            store.clone(),
            Arc::new(RecordingNotifier::new()),
        );
        let job = CheckinCounterReconciliationJob::new(
            CheckInService::new(ledger, store.clone()),
            300,
        );
        job.execute().await.unwrap();

        let counter = store.find_checkin_counter(event_id).await.unwrap().unwrap();
        assert_eq!(counter.checked_in, 0);
        assert!(counter.reconciled_at.is_some());
    }
}
