//! HTTP Handlers
//!
//! Demo surface for the admission + caching core: a cached report endpoint
//! behind the quota middleware, connection disconnect, and the admin hooks
//! (bypass, tier change, data-change invalidation).

use axum::Json;
use axum::extract::{Extension, Path, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use kernel::id::TenantId;
use platform::clock::Clock;
use platform::context::RequestContext;
use platform::httpdate::parse_http_date;
use quota::application::admission::AdmissionController;
use quota::application::config::QuotaConfig;
use quota::application::violations::TracingAlertSink;
use quota::domain::entities::TenantLimitProfile;
use quota::domain::repository::TenantPolicySource;
use quota::domain::value_objects::Tier;
use quota::error::QuotaResult;
use quota::infra::redis::RedisQuotaStore;
use quota::presentation::dto::BypassRequest;
use rescache::application::config::CacheConfig;
use rescache::application::invalidate::InvalidationUseCase;
use rescache::application::lookup::{LookupOutcome, LookupUseCase};
use rescache::application::revalidate::RevalidationScheduler;
use rescache::application::store_response::{StoreRequest, StoreResponseUseCase};
use rescache::domain::entities::CacheEntry;
use rescache::domain::repository::{ProduceRequest, ProducedResponse, ResponseProducer};
use rescache::domain::services as cache_services;
use rescache::domain::value_objects::CacheOutcome;
use rescache::error::CacheResult;
use rescache::infra::redis::RedisCacheStore;
use rescache::presentation::headers::{apply_cache_headers, apply_not_modified_headers};
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;

/// Concrete admission controller for this binary
pub type Controller = AdmissionController<RedisQuotaStore, EnvPolicySource, TracingAlertSink>;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<Controller>,
    pub quota_store: Arc<RedisQuotaStore>,
    pub cache_config: Arc<CacheConfig>,
    pub lookup: Arc<LookupUseCase<RedisCacheStore>>,
    pub store_response: Arc<StoreResponseUseCase<RedisCacheStore>>,
    pub invalidation: Arc<InvalidationUseCase<RedisCacheStore>>,
    pub scheduler: Arc<RevalidationScheduler<RedisCacheStore, ReportProducer>>,
    pub producer: Arc<ReportProducer>,
    pub clock: Clock,
}

// ============================================================================
// Tenant policy source (env-configured tiers)
// ============================================================================

/// Tenant policy source mapping env-listed tenants to tiers.
///
/// Stands in for the subscription service; the resolver caches its answers
/// either way.
pub struct EnvPolicySource {
    config: Arc<QuotaConfig>,
    pro: HashSet<String>,
    enterprise: HashSet<String>,
}

impl EnvPolicySource {
    /// Read `PRO_TENANTS` / `ENTERPRISE_TENANTS` (comma-separated) from the
    /// environment; everyone else is free tier
    pub fn from_env(config: Arc<QuotaConfig>) -> Self {
        Self {
            config,
            pro: parse_env_list("PRO_TENANTS"),
            enterprise: parse_env_list("ENTERPRISE_TENANTS"),
        }
    }
}

fn parse_env_list(name: &str) -> HashSet<String> {
    std::env::var(name)
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl TenantPolicySource for EnvPolicySource {
    async fn get_tenant_policy(
        &self,
        tenant_id: &TenantId,
    ) -> QuotaResult<Option<TenantLimitProfile>> {
        let tier = if self.enterprise.contains(tenant_id.as_str()) {
            Tier::Enterprise
        } else if self.pro.contains(tenant_id.as_str()) {
            Tier::Pro
        } else {
            Tier::Free
        };
        let limits = self.config.tier_limits(tier);
        Ok(Some(TenantLimitProfile {
            tenant_id: tenant_id.clone(),
            tier,
            per_minute: limits.per_minute,
            per_hour: limits.per_hour,
            per_day: limits.per_day,
            max_concurrent: limits.max_concurrent,
            overrides: None,
            bypass: false,
        }))
    }
}

// ============================================================================
// Response producer
// ============================================================================

/// Stand-in for the downstream aggregation this layer shields
pub struct ReportProducer {
    clock: Clock,
}

impl ReportProducer {
    pub fn new(clock: Clock) -> Self {
        Self { clock }
    }
}

impl ResponseProducer for ReportProducer {
    async fn produce(&self, request: &ProduceRequest) -> CacheResult<ProducedResponse> {
        let body = serde_json::to_vec(&serde_json::json!({
            "report": "summary",
            "route": request.route,
            "query": request.query,
            "generatedAtMs": self.clock.now_ms(),
        }))?;
        Ok(ProducedResponse {
            status: 200,
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body,
        })
    }
}

// ============================================================================
// Guarded endpoints
// ============================================================================

/// GET /api/reports/summary
///
/// Admission is already enforced by the middleware; this handler walks the
/// cache path: conditional check, Fresh/Stale/Miss, background refresh on
/// Stale, compute + store on Miss.
pub async fn report_summary(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    headers: HeaderMap,
) -> Response {
    let vary = vec![(
        platform::identity::TENANT_HEADER.to_string(),
        ctx.identity.tenant_id.as_str().to_string(),
    )];
    let fingerprint = cache_services::compute_fingerprint(&ctx.route, &ctx.query, &vary);

    let if_none_match = headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok());
    let if_modified_since = headers
        .get(header::IF_MODIFIED_SINCE)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_http_date);
    if let Some(validators) = state
        .lookup
        .conditional_check(&fingerprint, if_none_match, if_modified_since)
        .await
    {
        let mut response = StatusCode::NOT_MODIFIED.into_response();
        apply_not_modified_headers(response.headers_mut(), &validators);
        return response;
    }

    match state.lookup.classified(&fingerprint).await {
        LookupOutcome::Fresh(entry) => serve_entry(&state, &entry, CacheOutcome::Hit),
        LookupOutcome::Stale(entry) => {
            state.scheduler.schedule(&entry);
            serve_entry(&state, &entry, CacheOutcome::Stale)
        }
        LookupOutcome::Miss => {
            let request = ProduceRequest {
                fingerprint: fingerprint.clone(),
                route: ctx.route.clone(),
                query: ctx.query.clone(),
                vary: vary.clone(),
            };
            let produced = match state.producer.produce(&request).await {
                Ok(produced) => produced,
                Err(e) => {
                    // An expired copy still serves within stale-if-error
                    if let Some(entry) = state.lookup.lookup(&fingerprint).await {
                        let cutoff_ms = entry.ttl_ms + state.cache_config.stale_if_error_ms();
                        if entry.age_ms(state.clock.now_ms()) < cutoff_ms {
                            tracing::warn!(error = %e, "Producer failed, serving stale copy");
                            return serve_entry(&state, &entry, CacheOutcome::Stale);
                        }
                    }
                    tracing::error!(error = %e, "Producer failed with no cached fallback");
                    return StatusCode::BAD_GATEWAY.into_response();
                }
            };

            let stored = state
                .store_response
                .execute(StoreRequest {
                    route: ctx.route.clone(),
                    query: ctx.query.clone(),
                    vary,
                    status: produced.status,
                    headers: produced.headers.clone(),
                    body: produced.body.clone(),
                    ttl: None,
                    tags: vec!["reports".to_string(), "dashboard".to_string()],
                })
                .await;
            match stored {
                Ok(entry) => serve_entry(&state, &entry, CacheOutcome::Miss),
                Err(e) => {
                    tracing::warn!(error = %e, "Response caching failed, serving uncached");
                    plain_response(produced.status, produced.headers, produced.body)
                }
            }
        }
    }
}

/// POST /api/connections/disconnect
pub async fn disconnect(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> Response {
    let Some(connection_id) = ctx.identity.connection_id.clone() else {
        return (StatusCode::BAD_REQUEST, "missing x-connection-id header").into_response();
    };
    match state
        .controller
        .remove_connection(
            &ctx.identity.tenant_id,
            ctx.identity.user_id.as_ref(),
            &connection_id,
        )
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => e.into_response(),
    }
}

// ============================================================================
// Admin endpoints
// ============================================================================

/// PUT /api/admin/tenants/{tenant_id}/bypass
pub async fn set_bypass(
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
    Json(request): Json<BypassRequest>,
) -> Response {
    let Some(tenant_id) = TenantId::parse(tenant_id) else {
        return (StatusCode::BAD_REQUEST, "invalid tenant id").into_response();
    };
    match state.controller.set_bypass(&tenant_id, request.enabled).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => e.into_response(),
    }
}

/// POST /api/admin/tenants/{tenant_id}/tier-changed
pub async fn tier_changed(
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
) -> Response {
    let Some(tenant_id) = TenantId::parse(tenant_id) else {
        return (StatusCode::BAD_REQUEST, "invalid tenant id").into_response();
    };
    state.controller.invalidate_tenant(&tenant_id);
    StatusCode::NO_CONTENT.into_response()
}

/// Request body for POST /api/admin/data-change
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataChangeRequest {
    pub entity_type: String,
    pub entity_id: String,
}

/// POST /api/admin/data-change
///
/// Write-side invalidation hook called by the business services after a
/// mutation commits.
pub async fn data_change(
    State(state): State<AppState>,
    Json(request): Json<DataChangeRequest>,
) -> StatusCode {
    state
        .invalidation
        .handle_data_change(&request.entity_type, &request.entity_id)
        .await;
    StatusCode::ACCEPTED
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Response {
    match state.quota_store.ping().await {
        Ok(()) => Json(serde_json::json!({"status": "ok"})).into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "Health check failed against shared store");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({"status": "degraded"})),
            )
                .into_response()
        }
    }
}

// ============================================================================
// Response building
// ============================================================================

fn serve_entry(state: &AppState, entry: &CacheEntry, outcome: CacheOutcome) -> Response {
    let mut response = plain_response(entry.status, entry.headers.clone(), entry.body.clone());
    apply_cache_headers(
        response.headers_mut(),
        entry,
        outcome,
        state.clock.now_ms(),
        state.cache_config.stale_if_error_secs(),
    );
    response
}

fn plain_response(status: u16, headers: Vec<(String, String)>, body: Vec<u8>) -> Response {
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::OK);
    let mut response = (status, body).into_response();
    for (name, value) in headers {
        if let (Ok(name), Ok(value)) = (
            name.parse::<HeaderName>(),
            HeaderValue::from_str(&value),
        ) {
            response.headers_mut().insert(name, value);
        }
    }
    response
}
