use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Response,
    Extension, Json,
};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::{
    error::Result,
    handlers::response::json_response,
    models::principal::Principal,
    models::token::TokenEnvelope,
    services::attendance as attendance_service,
    state::AppState,
};

/// The query parameters for listing a day's attendance.
#[derive(Deserialize)]
pub struct AttendanceDayQuery {
    pub lesson_id: i64,
    pub lesson_date: NaiveDate,
}

/// Confirms attendance from a scanned QR envelope.
#[axum::debug_handler]
pub async fn confirm_attendance(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(envelope): Json<TokenEnvelope>,
) -> Result<Response> {
    let grant = attendance_service::confirm_attendance(&state, &envelope, principal.user_id).await?;

    json_response(
        StatusCode::CREATED,
        &sonic_rs::json!({
            "detail": "Attendance confirmed successfully",
            "lesson_id": grant.lesson_id,
            "student_id": grant.student_id,
            "lesson_date": grant.lesson_date().to_string(),
        }),
    )
}

/// Lists attendance recorded for a lesson on a day.
#[axum::debug_handler]
pub async fn attendance_for_day(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<AttendanceDayQuery>,
) -> Result<Response> {
    tracing::debug!(
        "📋 Teacher {} listing attendance for lesson {} on {}",
        principal.user_id,
        query.lesson_id,
        query.lesson_date
    );

    let records = attendance_service::attendance_for_day(
        &state,
        principal.user_id,
        query.lesson_id,
        query.lesson_date,
    )
    .await?;

    json_response(StatusCode::OK, &records)
}
