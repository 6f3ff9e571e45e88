use axum::{
    extract::State,
    http::StatusCode,
    response::Response,
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use crate::{
    error::Result,
    handlers::response::json_response,
    models::principal::Principal,
    services::session as session_service,
    state::AppState,
};

/// The request payload for checking a session key.
#[derive(Deserialize)]
pub struct SessionKeyCheckRequest {
    pub session_key: String,
}

/// The response payload for a newly issued session key.
#[derive(Serialize)]
pub struct SessionKeyResponse<'a> {
    pub session_key: &'a str,
    pub ttl_seconds: u64,
}

/// The response payload for a successful session key check.
#[derive(Serialize)]
pub struct SessionKeyCheckResponse {
    pub valid: bool,
    pub teacher_id: i64,
}

/// Creates or refreshes the session key of the calling teacher.
#[axum::debug_handler]
pub async fn create_session_key(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<Response> {
    let secret = session_service::issue_session_secret(&state, principal.user_id).await?;

    json_response(
        StatusCode::CREATED,
        &SessionKeyResponse {
            session_key: secret.expose(),
            ttl_seconds: secret.ttl_seconds(),
        },
    )
}

/// Checks whether a session key is still live.
#[axum::debug_handler]
pub async fn check_session_key(
    State(state): State<AppState>,
    Json(payload): Json<SessionKeyCheckRequest>,
) -> Result<Response> {
    let teacher_id = session_service::check_session_secret(&state, &payload.session_key).await?;

    json_response(
        StatusCode::OK,
        &SessionKeyCheckResponse {
            valid: true,
            teacher_id,
        },
    )
}

/// Revokes the session key of the calling teacher.
#[axum::debug_handler]
pub async fn revoke_session_key(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<StatusCode> {
    session_service::revoke_session_secret(&state, principal.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
