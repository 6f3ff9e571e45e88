use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{
    body::Body,
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
    Router,
};
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};

use crate::{
    error::AppError,
    models::principal::Principal,
    state::AppState,
};

/// Per-IP bucket refill interval: 50 requests per second sustained.
pub const PER_IP_REPLENISH_MS: u64 = 20;
/// Per-IP burst. A classroom behind one NAT address scans and polls through one bucket.
pub const PER_IP_BURST: u32 = 200;

/// Window of the attendance confirmation limit.
const CONFIRM_WINDOW: Duration = Duration::from_secs(60);

/// A middleware that rate limits attendance confirmations per student.
///
/// Must run after `require_student`, which provides the `Principal`.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `req` - The incoming request.
/// * `next` - The next middleware in the chain.
///
/// # Returns
///
/// A `Response`, or `429` once the student exceeds the limit.
pub async fn rate_limit_confirm(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let Some(student_id) = req.extensions().get::<Principal>().map(|p| p.user_id) else {
        return AppError::Unauthorized.into_response();
    };

    let key = format!("rate_limit:confirm:{}", student_id);

    let attempts = match state.attempts.hit(&key, CONFIRM_WINDOW).await {
        Ok(attempts) => attempts,
        Err(e) => {
            // Fails open.
            tracing::warn!("⚠️  Rate limit counter unavailable: {}", e);
            return next.run(req).await;
        }
    };

    if attempts > state.config.confirm_rate_limit {
        return AppError::RateLimitExceeded(format!(
            "Too many attendance attempts. Try again in {} seconds",
            CONFIRM_WINDOW.as_secs()
        ))
        .into_response();
    }

    next.run(req).await
}

/// Wraps the router in the per-IP limiter.
///
/// The service must be served with `into_make_service_with_connect_info::<SocketAddr>()`.
pub fn per_ip_limit(router: Router) -> anyhow::Result<Router> {
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_millisecond(PER_IP_REPLENISH_MS)
            .burst_size(PER_IP_BURST)
            .use_headers()
            .finish()
            .context("Invalid rate limiter configuration")?,
    );

    Ok(router.layer(GovernorLayer::new(governor_conf)))
}
