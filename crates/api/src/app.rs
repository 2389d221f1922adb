use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use domain::services::{
    CapacityAllocator, CheckInService, DocumentApprovalGate, PaymentIntentCoordinator,
    PaymentProcessor, RegistrationLedger, RegistrationNotifier,
};
use domain::store::{
    CapacityStore, CatalogStore, InMemoryStore, PaymentIntentStore, RegistrationStore,
};
use persistence::repositories::{
    CapacityRepository, CatalogRepository, PaymentIntentRepository, RegistrationRepository,
};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::Config;
use crate::middleware::{
    checkin_rate_limit, metrics_handler, metrics_middleware, security_headers_middleware,
    trace_id, RateLimiterState,
};
use crate::routes::{checkin, health, payment_intents, payment_webhooks, registrations};

/// The registration core wired over one set of stores.
#[derive(Clone)]
pub struct AppServices {
    pub capacity: CapacityAllocator,
    pub ledger: RegistrationLedger,
    pub payments: PaymentIntentCoordinator,
    pub documents: DocumentApprovalGate,
    pub checkin: CheckInService,
}

impl AppServices {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        capacity_store: Arc<dyn CapacityStore>,
        intents: Arc<dyn PaymentIntentStore>,
        registrations: Arc<dyn RegistrationStore>,
        processor: Arc<dyn PaymentProcessor>,
        notifier: Arc<dyn RegistrationNotifier>,
        config: &Config,
    ) -> Self {
        let capacity = CapacityAllocator::new(capacity_store, config.holds.ttl_secs);
        let ledger = RegistrationLedger::new(registrations.clone(), catalog.clone(), notifier);
        let payments = PaymentIntentCoordinator::new(
            catalog.clone(),
            intents,
            capacity.clone(),
            ledger.clone(),
            processor,
            config.payments.settings(),
        );
        let documents = DocumentApprovalGate::new(ledger.clone(), catalog);
        let checkin = CheckInService::new(ledger.clone(), registrations);

        Self {
            capacity,
            ledger,
            payments,
            documents,
            checkin,
        }
    }

    /// Services backed by the PostgreSQL repositories.
    pub fn postgres(
        pool: PgPool,
        processor: Arc<dyn PaymentProcessor>,
        notifier: Arc<dyn RegistrationNotifier>,
        config: &Config,
    ) -> Self {
        Self::new(
            Arc::new(CatalogRepository::new(pool.clone())),
            Arc::new(CapacityRepository::new(pool.clone())),
            Arc::new(PaymentIntentRepository::new(pool.clone())),
            Arc::new(RegistrationRepository::new(pool)),
            processor,
            notifier,
            config,
        )
    }

    /// Services backed by a single in-memory store.
    pub fn in_memory(
        store: Arc<InMemoryStore>,
        processor: Arc<dyn PaymentProcessor>,
        notifier: Arc<dyn RegistrationNotifier>,
        config: &Config,
    ) -> Self {
        Self::new(
            store.clone(),
            store.clone(),
            store.clone(),
            store,
            processor,
            notifier,
            config,
        )
    }
}

#[derive(Clone)]
pub struct AppState {
    /// Present when running on PostgreSQL; used by readiness probes.
    pub pool: Option<PgPool>,
    pub config: Arc<Config>,
    pub services: AppServices,
    pub checkin_limiter: Option<Arc<RateLimiterState>>,
}

pub fn create_app(config: Config, pool: Option<PgPool>, services: AppServices) -> Router {
    let config = Arc::new(config);

    let checkin_limiter =
        RateLimiterState::new(config.security.checkin_rate_limit_per_minute).map(Arc::new);

    let state = AppState {
        pool,
        config: config.clone(),
        services,
        checkin_limiter,
    };

    let cors = if config.security.cors_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = config
            .security
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    };

    // Scans are rate limited per client; the operator overview is not.
    let checkin_routes = get(checkin::event_overview).merge(
        post(checkin::check_in).route_layer(middleware::from_fn_with_state(
            state.clone(),
            checkin_rate_limit,
        )),
    );

    let api_routes = Router::new()
        .route(
            "/api/v1/payment-intents",
            post(payment_intents::create_payment_intent),
        )
        .route(
            "/api/v1/webhooks/payments",
            post(payment_webhooks::receive_payment_webhook),
        )
        .route(
            "/api/v1/registrations",
            post(registrations::create_registration),
        )
        .route(
            "/api/v1/registrations/:registration_id",
            get(registrations::get_registration),
        )
        .route(
            "/api/v1/registrations/:registration_id/document",
            put(registrations::upload_document),
        )
        .route(
            "/api/v1/registrations/:registration_id/approval",
            put(registrations::review_registration),
        )
        .route("/api/v1/checkin", checkin_routes);

    let public_routes = Router::new()
        .route("/api/health", get(health::health_check))
        .route("/api/health/ready", get(health::ready))
        .route("/api/health/live", get(health::live))
        .route("/metrics", get(metrics_handler));

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        // Global middleware (order matters: bottom layers run first)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            security_headers_middleware,
        ))
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(trace_id))
        .layer(cors)
        .with_state(state)
}
