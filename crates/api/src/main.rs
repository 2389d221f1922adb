use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use domain::services::{MockPaymentProcessor, MockRegistrationNotifier, PaymentProcessor};
use domain::store::InMemoryStore;
use tracing::{info, warn};

use race_registration_api::app::{create_app, AppServices};
use race_registration_api::config::{Config, PaymentProvider, StorageBackend};
use race_registration_api::jobs::{
    CheckinCounterReconciliationJob, HoldExpirySweepJob, JobScheduler, PaymentReconciliationJob,
    PoolMetricsJob,
};
use race_registration_api::middleware::init_metrics;
use race_registration_api::middleware::logging::init_logging;
use race_registration_api::services::HttpPaymentProcessor;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let config = Config::load()?;

    init_logging(&config.logging)?;
    init_metrics()?;

    info!(
        "Starting race registration API v{}",
        env!("CARGO_PKG_VERSION")
    );

    let processor: Arc<dyn PaymentProcessor> = match config.payments.provider {
        PaymentProvider::Mock => {
            warn!("Using the mock payment processor; no real charges will be made");
            Arc::new(MockPaymentProcessor::new())
        }
        PaymentProvider::Http => Arc::new(HttpPaymentProcessor::new((&config.payments).into())?),
    };
    let notifier = Arc::new(MockRegistrationNotifier::new());

    let (pool, services) = match config.storage.backend {
        StorageBackend::Postgres => {
            let pool = persistence::create_pool(&config.database).await?;

            info!("Running database migrations...");
            persistence::run_migrations(&pool).await?;
            info!("Migrations completed");

            let services = AppServices::postgres(pool.clone(), processor, notifier, &config);
            (Some(pool), services)
        }
        StorageBackend::Memory => {
            warn!("Using in-memory storage; data is lost on restart");
            let store = Arc::new(InMemoryStore::new());
            (None, AppServices::in_memory(store, processor, notifier, &config))
        }
    };

    let mut scheduler = JobScheduler::new();
    scheduler.register(HoldExpirySweepJob::new(
        services.capacity.clone(),
        config.holds.sweep_interval_secs,
    ));
    scheduler.register(PaymentReconciliationJob::new(
        services.payments.clone(),
        config.jobs.payment_reconciliation_interval_secs,
    ));
    scheduler.register(CheckinCounterReconciliationJob::new(
        services.checkin.clone(),
        config.jobs.counter_reconciliation_interval_secs,
    ));
    if let Some(pool) = &pool {
        scheduler.register(PoolMetricsJob::new(
            pool.clone(),
            config.database.max_connections,
        ));
    }
    scheduler.start();

    let addr = config.socket_addr();
    let app = create_app(config, pool, services);

    info!("Server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    scheduler.shutdown();
    scheduler.wait_for_shutdown(Duration::from_secs(10)).await;
    info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
