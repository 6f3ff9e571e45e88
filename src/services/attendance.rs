use chrono::NaiveDate;

use crate::error::{AppError, Result};
use crate::models::attendance::{AttendanceGrant, AttendanceRecord};
use crate::models::token::TokenEnvelope;
use crate::state::AppState;
use crate::validation::envelope::{validate_envelope, validate_lesson_id};

/// Validates a scanned envelope and records the student's attendance.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `envelope` - The envelope read from the QR code.
/// * `student_id` - The authenticated student who scanned it.
///
/// # Returns
///
/// A `Result` containing the recorded `AttendanceGrant`. A second scan of the
/// same lesson on the same day is a `Conflict`.
pub async fn confirm_attendance(
    state: &AppState,
    envelope: &TokenEnvelope,
    student_id: i64,
) -> Result<AttendanceGrant> {
    validate_envelope(envelope)?;

    let grant = state.validator().validate(envelope, student_id).await?;
    ensure_owner(state, grant.lesson_id, grant.teacher_id).await?;

    if !state.attendance.record(&grant).await? {
        return Err(AppError::Conflict("Attendance already confirmed".to_string()));
    }

    tracing::info!(
        "✅ Attendance confirmed: student={} lesson={} date={}",
        grant.student_id,
        grant.lesson_id,
        grant.lesson_date()
    );
    Ok(grant)
}

/// Lists the scans recorded for a lesson on a day.
///
/// Only the teacher who owns the lesson may list it. A lesson with no recorded
/// attendance yet has no owner and lists empty.
pub async fn attendance_for_day(
    state: &AppState,
    teacher_id: i64,
    lesson_id: i64,
    lesson_date: NaiveDate,
) -> Result<Vec<AttendanceRecord>> {
    validate_lesson_id(lesson_id)?;
    ensure_owner(state, lesson_id, teacher_id).await?;
    state.attendance.list(lesson_id, lesson_date).await
}

/// Rejects a teacher acting on a lesson another teacher already owns.
async fn ensure_owner(state: &AppState, lesson_id: i64, teacher_id: i64) -> Result<()> {
    match state.attendance.lesson_owner(lesson_id).await? {
        Some(owner) if owner != teacher_id => {
            tracing::warn!(
                "❌ Teacher {} is not the owner of lesson {} (owner {})",
                teacher_id,
                lesson_id,
                owner
            );
            Err(AppError::Unauthorized)
        }
        _ => Ok(()),
    }
}
