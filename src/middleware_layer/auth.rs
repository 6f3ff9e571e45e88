use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Request, StatusCode},
    middleware::Next,
    response::Response,
};

use crate::{
    models::principal::{Principal, Role},
    state::AppState,
};

/// Extracts the bearer token from the `Authorization` header.
///
/// # Arguments
///
/// * `headers` - The request headers.
///
/// # Returns
///
/// An `Option` containing the token if present.
fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Resolves the caller and checks it has `role`.
///
/// Only the token is carried across the store lookup; the request body is not `Sync`.
async fn authenticate(
    state: &AppState,
    headers: &HeaderMap,
    role: Role,
) -> Result<Principal, StatusCode> {
    let token = extract_bearer_token(headers)
        .map(str::to_owned)
        .ok_or_else(|| {
            tracing::warn!("❌ No bearer token found");
            StatusCode::UNAUTHORIZED
        })?;

    let principal = state
        .principals
        .resolve(&token)
        .await
        .map_err(|e| {
            tracing::error!("❌ Principal lookup failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or_else(|| {
            tracing::warn!("❌ Unknown bearer token");
            StatusCode::UNAUTHORIZED
        })?;

    if principal.is_expired() {
        tracing::warn!("❌ Bearer token expired for user: {}", principal.user_id);
        return Err(StatusCode::UNAUTHORIZED);
    }

    if principal.role != role {
        tracing::warn!(
            "❌ User {} is {:?}, route requires {:?}",
            principal.user_id,
            principal.role,
            role
        );
        return Err(StatusCode::FORBIDDEN);
    }

    tracing::debug!("✅ User authenticated: {} ({:?})", principal.user_id, principal.role);
    Ok(principal)
}

/// A middleware that requires an authenticated teacher.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `request` - The incoming request.
/// * `next` - The next middleware in the chain.
///
/// # Returns
///
/// A `Response` or an error `StatusCode`.
pub async fn require_teacher(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let principal = authenticate(&state, request.headers(), Role::Teacher).await?;
    request.extensions_mut().insert(principal);
    Ok(next.run(request).await)
}

/// A middleware that requires an authenticated student.
pub async fn require_student(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let principal = authenticate(&state, request.headers(), Role::Student).await?;
    request.extensions_mut().insert(principal);
    Ok(next.run(request).await)
}
