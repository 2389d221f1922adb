//! Connection pool gauges and saturation warnings.

use persistence::metrics::record_pool_metrics;
use sqlx::PgPool;

use super::scheduler::{Job, JobError, JobFrequency};

pub struct PoolMetricsJob {
    pool: PgPool,
    max_connections: u32,
}

impl PoolMetricsJob {
    pub fn new(pool: PgPool, max_connections: u32) -> Self {
        Self {
            pool,
            max_connections,
        }
    }
}

#[async_trait::async_trait]
impl Job for PoolMetricsJob {
    fn name(&self) -> &'static str {
        "pool_metrics"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::Seconds(10)
    }

    async fn execute(&self) -> Result<(), JobError> {
        let snapshot = record_pool_metrics(&self.pool);
        if snapshot.is_saturated(self.max_connections) {
            tracing::warn!(
                active = snapshot.active,
                max_connections = self.max_connections,
                "Database pool saturated"
            );
        }
        Ok(())
    }
}
