use axum::{
    middleware::from_fn_with_state,
    routing::{delete, get, post},
    Router,
};

use crate::{handlers, middleware_layer, state::AppState};

/// Builds the API router.
///
/// Transport layers (tracing, CORS, global rate limiting) are added by the binary.
pub fn router(state: AppState) -> Router {
    let teacher_routes = Router::new()
        .route("/api/session/create", post(handlers::session::create_session_key))
        .route("/api/session", delete(handlers::session::revoke_session_key))
        .route(
            "/api/attendance/day",
            get(handlers::attendance::attendance_for_day),
        )
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware_layer::auth::require_teacher,
        ))
        .with_state(state.clone());

    let student_routes = Router::new()
        .route(
            "/api/attendance/confirm",
            post(handlers::attendance::confirm_attendance),
        )
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware_layer::rate_limit::rate_limit_confirm,
        ))
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware_layer::auth::require_student,
        ))
        .with_state(state.clone());

    let public_routes = Router::new()
        .route("/api/session/check", post(handlers::session::check_session_key))
        .with_state(state);

    Router::new()
        .merge(teacher_routes)
        .merge(student_routes)
        .merge(public_routes)
}
