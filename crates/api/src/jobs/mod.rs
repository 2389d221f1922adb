//! Background job scheduler and job implementations.

mod checkin_counters;
mod hold_expiry;
mod payment_reconciliation;
mod pool_metrics;
mod scheduler;

pub use checkin_counters::CheckinCounterReconciliationJob;
pub use hold_expiry::HoldExpirySweepJob;
pub use payment_reconciliation::PaymentReconciliationJob;
pub use pool_metrics::PoolMetricsJob;
pub use scheduler::{Job, JobError, JobFrequency, JobScheduler};
