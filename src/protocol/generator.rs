use chrono::Utc;

use crate::crypto::aes;
use crate::crypto::secret::SessionSecret;
use crate::error::CipherError;
use crate::models::token::{PresenceToken, TokenPayload};

/// Generates the current presence token for a lesson, stamped with the wall clock.
///
/// # Arguments
///
/// * `secret` - The rotation session's secret.
/// * `teacher_id` - Sent in the clear so the validator can find the secret.
/// * `lesson_id` - The schedule entry being attended.
///
/// # Returns
///
/// A `Result` containing the sealed token. Nothing is retained between calls.
pub fn generate(
    secret: &SessionSecret,
    teacher_id: i64,
    lesson_id: i64,
) -> Result<PresenceToken, CipherError> {
    generate_at(secret, teacher_id, lesson_id, Utc::now().timestamp())
}

/// [`generate`] with an explicit Unix timestamp.
pub fn generate_at(
    secret: &SessionSecret,
    teacher_id: i64,
    lesson_id: i64,
    issued_at: i64,
) -> Result<PresenceToken, CipherError> {
    let payload = TokenPayload {
        lesson_id,
        issued_at,
    };

    let key = aes::derive_key(secret);
    let sealed = aes::encrypt_json(&key, &payload)?;

    Ok(PresenceToken {
        teacher_id,
        lesson_id,
        issued_at,
        sealed,
    })
}
