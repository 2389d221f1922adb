//! Background job to expire capacity holds past their deadline.

use domain::services::CapacityAllocator;

use super::scheduler::{Job, JobError, JobFrequency};

/// Releases seats held by abandoned checkouts.
///
/// Reservations also expire lapsed holds lazily, so this sweep only keeps
/// the held counters honest between purchases.
pub struct HoldExpirySweepJob {
    capacity: CapacityAllocator,
    interval_secs: u64,
}

impl HoldExpirySweepJob {
    pub fn new(capacity: CapacityAllocator, interval_secs: u64) -> Self {
        Self {
            capacity,
            interval_secs,
        }
    }
}

#[async_trait::async_trait]
impl Job for HoldExpirySweepJob {
    fn name(&self) -> &'static str {
        "hold_expiry_sweep"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::from_secs(self.interval_secs)
    }

    async fn execute(&self) -> Result<(), JobError> {
        let expired = self.capacity.sweep_expired().await?;
        tracing::debug!(expired = expired, "Hold sweep finished");
        Ok(())
    }
}
