use crate::crypto::secret::SessionSecret;
use crate::error::{AppError, Result};
use crate::state::AppState;
use crate::validation::envelope::validate_session_key;

/// Issues a fresh session secret for a teacher, replacing any previous one.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `teacher_id` - The authenticated teacher.
///
/// # Returns
///
/// A `Result` containing the new `SessionSecret`.
pub async fn issue_session_secret(state: &AppState, teacher_id: i64) -> Result<SessionSecret> {
    tracing::debug!("🔐 Issuing session key for teacher: {}", teacher_id);

    let secret = SessionSecret::generate(state.config.session_ttl_seconds);
    state.secrets.replace(teacher_id, &secret).await?;

    tracing::info!(
        "✅ Session key issued for teacher {} (ttl {}s)",
        teacher_id,
        secret.ttl_seconds()
    );
    Ok(secret)
}

/// Resolves a presented session key to the teacher that owns it.
///
/// # Returns
///
/// A `Result` containing the teacher id, or `NotFound` when the key is unknown or expired.
pub async fn check_session_secret(state: &AppState, session_key: &str) -> Result<i64> {
    validate_session_key(session_key)?;

    let teacher_id = state
        .secrets
        .teacher_for(session_key)
        .await?
        .ok_or_else(|| AppError::NotFound("Session key not found or expired".to_string()))?;

    tracing::debug!("✅ Session key valid for teacher {}", teacher_id);
    Ok(teacher_id)
}

/// Revokes the teacher's live session key, if any.
pub async fn revoke_session_secret(state: &AppState, teacher_id: i64) -> Result<()> {
    if state.secrets.revoke(teacher_id).await? {
        tracing::info!("🗑️  Session key revoked for teacher {}", teacher_id);
        Ok(())
    } else {
        Err(AppError::NotFound("No active session key".to_string()))
    }
}
