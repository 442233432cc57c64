//! API Server Entry Point
//!
//! Application entry point and server initialization.
//! Uses `anyhow` for startup errors; request-path errors flow through the
//! quota/cache error types and `kernel::error::AppError`.

mod handlers;

use axum::{
    Router, http,
    http::{Method, header},
    routing::{get, post, put},
};
use handlers::{AppState, EnvPolicySource, ReportProducer};
use platform::clock::Clock;
use quota::application::admission::AdmissionController;
use quota::application::config::QuotaConfig;
use quota::application::tier_resolver::TierPolicyResolver;
use quota::application::violations::{TracingAlertSink, ViolationMonitor};
use quota::infra::redis::RedisQuotaStore;
use quota::presentation::middleware::{QuotaMiddlewareState, enforce_quota};
use rescache::application::config::CacheConfig;
use rescache::application::invalidate::InvalidationUseCase;
use rescache::application::lookup::LookupUseCase;
use rescache::application::revalidate::RevalidationScheduler;
use rescache::application::store_response::StoreResponseUseCase;
use rescache::infra::redis::RedisCacheStore;
use std::env;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "api=info,quota=info,rescache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Shared store connection (one managed connection, cloned per store)
    let redis_url =
        env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
    let redis_client = redis::Client::open(redis_url.as_str())?;
    let redis_conn = redis_client.get_connection_manager().await?;
    tracing::info!("Connected to shared store");

    let clock = Clock::system();
    let quota_config = Arc::new(QuotaConfig::default());
    let cache_config = Arc::new(CacheConfig::default());

    // Admission control wiring
    let quota_store = Arc::new(RedisQuotaStore::new(redis_conn.clone()));
    // Startup probe: failure should not prevent startup, the per-request
    // fail-open/fail-closed policy takes over
    if let Err(e) = quota_store.ping().await {
        tracing::warn!(error = %e, "Shared store unreachable at startup, continuing anyway");
    }

    let policy_source = Arc::new(EnvPolicySource::from_env(Arc::clone(&quota_config)));
    let resolver = Arc::new(TierPolicyResolver::new(
        Arc::clone(&policy_source),
        Arc::clone(&quota_store),
        Arc::clone(&quota_config),
        clock.clone(),
    ));
    let monitor = Arc::new(ViolationMonitor::from_config(&quota_config));
    let alert_sink = Arc::new(TracingAlertSink);
    let controller = Arc::new(AdmissionController::new(
        Arc::clone(&quota_store),
        resolver,
        monitor,
        alert_sink,
        Arc::clone(&quota_config),
        clock.clone(),
    ));

    // Response cache wiring
    let cache_store = Arc::new(RedisCacheStore::new(redis_conn.clone()));
    let producer = Arc::new(ReportProducer::new(clock.clone()));
    let lookup = Arc::new(LookupUseCase::new(
        Arc::clone(&cache_store),
        Arc::clone(&cache_config),
        clock.clone(),
    ));
    let store_response = Arc::new(StoreResponseUseCase::new(
        Arc::clone(&cache_store),
        Arc::clone(&cache_config),
        clock.clone(),
    ));
    let invalidation = Arc::new(InvalidationUseCase::new(
        Arc::clone(&cache_store),
        Arc::clone(&cache_config),
    ));
    let scheduler = Arc::new(RevalidationScheduler::new(
        Arc::clone(&cache_store),
        Arc::clone(&producer),
        Arc::clone(&cache_config),
        clock.clone(),
    ));

    let state = AppState {
        controller: Arc::clone(&controller),
        quota_store,
        cache_config,
        lookup,
        store_response,
        invalidation,
        scheduler,
        producer,
        clock,
    };

    let quota_state = QuotaMiddlewareState {
        controller: Arc::clone(&controller),
    };

    // CORS configuration
    let frontend_origins = env::var("FRONTEND_ORIGINS")
        .unwrap_or_else(|_| "http://localhost:3000,http://127.0.0.1:3000".to_string());
    let allowed_origins: Vec<http::HeaderValue> = frontend_origins
        .split(',')
        .filter_map(|origin| origin.trim().parse().ok())
        .collect();
    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods(AllowMethods::list([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::OPTIONS,
        ]))
        .allow_headers(AllowHeaders::list([
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::IF_NONE_MATCH,
            header::IF_MODIFIED_SINCE,
        ]))
        .allow_credentials(true);

    // Build router: tenant-facing routes sit behind the quota middleware,
    // admin hooks and health do not
    let guarded = Router::new()
        .route("/api/reports/summary", get(handlers::report_summary))
        .route("/api/connections/disconnect", post(handlers::disconnect))
        .layer(axum::middleware::from_fn_with_state(
            quota_state,
            enforce_quota::<RedisQuotaStore, EnvPolicySource, TracingAlertSink>,
        ))
        .with_state(state.clone());

    let unguarded = Router::new()
        .route("/api/admin/tenants/{tenant_id}/bypass", put(handlers::set_bypass))
        .route(
            "/api/admin/tenants/{tenant_id}/tier-changed",
            post(handlers::tier_changed),
        )
        .route("/api/admin/data-change", post(handlers::data_change))
        .route("/health", get(handlers::health))
        .with_state(state);

    let app = Router::new()
        .merge(guarded)
        .merge(unguarded)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], 8088));
    tracing::info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
