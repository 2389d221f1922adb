//! Background job that settles intents the webhook never resolved.

use domain::services::PaymentIntentCoordinator;

use super::scheduler::{Job, JobError, JobFrequency};

/// Cancels stale unpaid intents, then repairs succeeded intents that never
/// produced a registration.
pub struct PaymentReconciliationJob {
    payments: PaymentIntentCoordinator,
    interval_secs: u64,
}

impl PaymentReconciliationJob {
    pub fn new(payments: PaymentIntentCoordinator, interval_secs: u64) -> Self {
        Self {
            payments,
            interval_secs,
        }
    }
}

#[async_trait::async_trait]
impl Job for PaymentReconciliationJob {
    fn name(&self) -> &'static str {
        "payment_reconciliation"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::from_secs(self.interval_secs)
    }

    async fn execute(&self) -> Result<(), JobError> {
        let expiry = self.payments.expire_stale_intents().await?;
        let repair = self.payments.reconcile_confirmed().await?;

        if expiry.cancelled + expiry.settled + repair.repaired > 0 {
            tracing::info!(
                cancelled = expiry.cancelled,
                settled = expiry.settled,
                skipped = expiry.skipped,
                repaired = repair.repaired,
                unresolved = repair.unresolved,
                "Payment reconciliation applied changes"
            );
        }
        if repair.unresolved > 0 {
            tracing::warn!(
                unresolved = repair.unresolved,
                "Paid intents still without a registration"
            );
        }
        Ok(())
    }
}
