//! Quota Middleware
//!
//! Enforces progressive rate limits and connection admission per request.
//! Builds the typed request context once and passes it downstream via
//! request extensions.

use crate::application::admission::AdmissionController;
use crate::domain::repository::{AlertSink, QuotaStore, TenantPolicySource};
use crate::domain::value_objects::ScopeKey;
use crate::error::QuotaError;
use crate::presentation::dto::ThrottleResponse;
use crate::presentation::headers::{apply_admission_headers, apply_retry_after};
use axum::Json;
use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use platform::context::RequestContext;
use std::sync::Arc;

/// Middleware state
pub struct QuotaMiddlewareState<S, P, A>
where
    S: QuotaStore,
    P: TenantPolicySource,
    A: AlertSink,
{
    pub controller: Arc<AdmissionController<S, P, A>>,
}

impl<S, P, A> Clone for QuotaMiddlewareState<S, P, A>
where
    S: QuotaStore,
    P: TenantPolicySource,
    A: AlertSink,
{
    fn clone(&self) -> Self {
        Self {
            controller: Arc::clone(&self.controller),
        }
    }
}

/// Middleware enforcing the tenant's progressive quota and, when the
/// request carries a connection id, its concurrency budget.
pub async fn enforce_quota<S, P, A>(
    State(state): State<QuotaMiddlewareState<S, P, A>>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, Response>
where
    S: QuotaStore + Send + Sync + 'static,
    P: TenantPolicySource + Send + Sync + 'static,
    A: AlertSink + Send + Sync + 'static,
{
    let controller = &state.controller;
    let fail_open = controller.config().fail_open;

    let direct_ip = req
        .extensions()
        .get::<axum::extract::ConnectInfo<std::net::SocketAddr>>()
        .map(|info| info.0.ip());

    let ctx = match RequestContext::from_parts(
        req.headers(),
        req.method().clone(),
        req.uri().path(),
        req.uri().query(),
        direct_ip,
        controller.now_ms(),
    ) {
        Ok(ctx) => ctx,
        Err(e) => {
            return Err((StatusCode::BAD_REQUEST, e.to_string()).into_response());
        }
    };

    let tenant_id = ctx.identity.tenant_id.clone();
    let user_id = ctx.identity.user_id.clone();
    let scope = ScopeKey::for_route(&tenant_id, &ctx.route);

    let decision = match controller
        .check_progressive(&scope, &tenant_id, user_id.as_ref())
        .await
    {
        Ok(decision) => decision,
        Err(QuotaError::StoreUnavailable(msg)) => {
            return if fail_open {
                tracing::warn!(
                    tenant_id = %tenant_id,
                    message = %msg,
                    "Quota store unavailable, failing open"
                );
                req.extensions_mut().insert(ctx);
                Ok(next.run(req).await)
            } else {
                tracing::error!(
                    tenant_id = %tenant_id,
                    message = %msg,
                    "Quota store unavailable, failing closed"
                );
                Err(StatusCode::SERVICE_UNAVAILABLE.into_response())
            };
        }
        Err(e) => return Err(e.into_response()),
    };

    if !decision.allowed {
        let representative = decision.representative();
        let retry_after = decision.retry_after_secs().unwrap_or(1);
        let body = ThrottleResponse::quota_exceeded(
            retry_after,
            representative.limit,
            representative.reset_at_ms,
        );
        let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
        apply_admission_headers(response.headers_mut(), representative);
        apply_retry_after(response.headers_mut(), retry_after);
        return Err(response);
    }

    if let Some(connection_id) = ctx.identity.connection_id.clone() {
        match controller
            .check_concurrent_connections(&tenant_id, user_id.as_ref(), &connection_id)
            .await
        {
            Ok(conn) if !conn.allowed => {
                let retry_after = conn.retry_after_secs.unwrap_or(1);
                let body = ThrottleResponse::connection_limit_exceeded(retry_after, conn.limit);
                let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
                apply_retry_after(response.headers_mut(), retry_after);
                return Err(response);
            }
            Ok(_) => {}
            Err(QuotaError::StoreUnavailable(msg)) if fail_open => {
                tracing::warn!(
                    tenant_id = %tenant_id,
                    message = %msg,
                    "Quota store unavailable for connection check, failing open"
                );
            }
            Err(QuotaError::StoreUnavailable(_)) => {
                return Err(StatusCode::SERVICE_UNAVAILABLE.into_response());
            }
            Err(e) => return Err(e.into_response()),
        }
    }

    let representative = decision.representative().clone();
    req.extensions_mut().insert(ctx);
    let mut response = next.run(req).await;
    apply_admission_headers(response.headers_mut(), &representative);
    Ok(response)
}
