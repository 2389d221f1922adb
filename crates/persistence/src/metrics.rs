//! Database metrics collection.

use metrics::{counter, gauge, histogram};
use sqlx::PgPool;
use std::time::Instant;

/// Record database query duration.
pub fn record_query_duration(query_name: &str, duration_secs: f64) {
    histogram!(
        "database_query_duration_seconds",
        "query" => query_name.to_string()
    )
    .record(duration_secs);
}

/// Count a failed query, labelled with the PostgreSQL error code when there is one.
pub fn record_query_error(query_name: &str, error: &sqlx::Error) {
    let code = match error {
        sqlx::Error::Database(db) => db.code().map(|c| c.into_owned()),
        _ => None,
    };
    counter!(
        "database_query_errors_total",
        "query" => query_name.to_string(),
        "code" => code.unwrap_or_else(|| "none".to_string())
    )
    .increment(1);
}

/// Point-in-time view of the connection pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSnapshot {
    pub size: u32,
    pub idle: usize,
    pub active: usize,
}

impl PoolSnapshot {
    pub fn of(pool: &PgPool) -> Self {
        let size = pool.size();
        let idle = pool.num_idle();
        Self {
            size,
            idle,
            active: (size as usize).saturating_sub(idle),
        }
    }

    /// Every connection is open and none is idle.
    pub fn is_saturated(&self, max_connections: u32) -> bool {
        self.idle == 0 && self.size >= max_connections
    }
}

/// Publishes pool gauges and returns the snapshot they were taken from.
pub fn record_pool_metrics(pool: &PgPool) -> PoolSnapshot {
    let snapshot = PoolSnapshot::of(pool);
    gauge!("database_connections_active").set(snapshot.active as f64);
    gauge!("database_connections_idle").set(snapshot.idle as f64);
    gauge!("database_connections_total").set(snapshot.size as f64);
    snapshot
}

/// Times one repository operation.
///
/// ```ignore
/// let timer = QueryTimer::new("find_registration_by_token");
/// let result = sqlx::query_as::<_, RegistrationEntity>(...).fetch_optional(&pool).await;
/// timer.finish(&result);
/// ```
pub struct QueryTimer {
    query_name: &'static str,
    start: Instant,
}

impl QueryTimer {
    pub fn new(query_name: &'static str) -> Self {
        Self {
            query_name,
            start: Instant::now(),
        }
    }

    /// Record the elapsed duration to metrics.
    pub fn record(self) {
        record_query_duration(self.query_name, self.start.elapsed().as_secs_f64());
    }

    /// Record the elapsed duration and count the error, if any.
    pub fn finish<T>(self, result: &Result<T, sqlx::Error>) {
        if let Err(e) = result {
            record_query_error(self.query_name, e);
        }
        self.record();
    }
}
