use garde::Validate;

use crate::error::{AppError, Result};
use crate::models::token::TokenEnvelope;

/// Validates the shape of a scanned envelope before any lookup or decryption.
///
/// # Arguments
///
/// * `envelope` - The envelope posted by the scanning client.
///
/// # Returns
///
/// A `Result<()>` indicating whether the envelope is well formed.
pub fn validate_envelope(envelope: &TokenEnvelope) -> Result<()> {
    envelope
        .validate()
        .map_err(|report| AppError::Validation(format!("Invalid QR data: {}", report)))
}

/// Validates a lesson (schedule) identifier.
pub fn validate_lesson_id(lesson_id: i64) -> Result<()> {
    if lesson_id <= 0 {
        return Err(AppError::Validation(
            "lesson_id must be a positive integer".to_string(),
        ));
    }

    Ok(())
}

/// Validates a session key presented for a liveness check.
pub fn validate_session_key(session_key: &str) -> Result<()> {
    if session_key.is_empty() || session_key.len() > 256 {
        return Err(AppError::Validation(
            "session_key must be between 1 and 256 characters".to_string(),
        ));
    }

    Ok(())
}
