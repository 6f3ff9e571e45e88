use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::crypto::aes::{self, SealedPayload};
use crate::crypto::secret::SessionSecret;
use crate::error::Rejection;
use crate::models::attendance::AttendanceGrant;
use crate::models::token::{TokenEnvelope, TokenPayload};
use crate::repositories::secret::SecretStore;

/// Server-side check of presented tokens.
///
/// Stateless per token: it looks up the teacher's live secret, authenticates the
/// payload and enforces the freshness window. Deduplication of repeated scans is
/// left to the caller.
#[derive(Clone)]
pub struct TokenValidator {
    secrets: Arc<dyn SecretStore>,
    freshness_window: Duration,
}

impl TokenValidator {
    pub fn new(secrets: Arc<dyn SecretStore>, freshness_window: Duration) -> Self {
        Self {
            secrets,
            freshness_window,
        }
    }

    /// Validates an envelope scanned by `student_id` against the current time.
    pub async fn validate(
        &self,
        envelope: &TokenEnvelope,
        student_id: i64,
    ) -> Result<AttendanceGrant, Rejection> {
        self.validate_at(envelope, student_id, Utc::now().timestamp()).await
    }

    /// [`TokenValidator::validate`] with an explicit Unix timestamp for "now".
    pub async fn validate_at(
        &self,
        envelope: &TokenEnvelope,
        student_id: i64,
        now: i64,
    ) -> Result<AttendanceGrant, Rejection> {
        let secret = self
            .secrets
            .active_for_teacher(envelope.teacher_id)
            .await
            .map_err(|e| Rejection::Unavailable(e.to_string()))?
            .ok_or(Rejection::NoActiveSecret)?;

        let payload = open_token(&secret, &envelope.payload, now, self.freshness_window)?;

        tracing::debug!(
            "✅ Token accepted: teacher={} lesson={} student={}",
            envelope.teacher_id,
            payload.lesson_id,
            student_id
        );

        Ok(AttendanceGrant {
            lesson_id: payload.lesson_id,
            student_id,
            teacher_id: envelope.teacher_id,
            token_issued_at: payload.issued_at,
            granted_at: DateTime::from_timestamp(now, 0).unwrap_or_else(Utc::now),
        })
    }
}

/// Decrypts a token body under `secret` and checks its age.
///
/// The age check is symmetric: tokens stamped too far in the future are
/// rejected like stale ones.
pub fn open_token(
    secret: &SessionSecret,
    encoded: &str,
    now: i64,
    freshness_window: Duration,
) -> Result<TokenPayload, Rejection> {
    let sealed = SealedPayload::decode(encoded).map_err(|e| Rejection::Malformed(e.to_string()))?;

    let key = aes::derive_key(secret);
    let plaintext = aes::decrypt(&key, &sealed).map_err(|_| Rejection::Undecryptable)?;

    let payload: TokenPayload = sonic_rs::from_slice(&plaintext)
        .map_err(|e| Rejection::Malformed(format!("payload: {}", e)))?;

    if payload.lesson_id <= 0 || payload.issued_at <= 0 {
        return Err(Rejection::Malformed("missing schedule_id or timestamp".to_string()));
    }

    let window_seconds = i64::try_from(freshness_window.as_secs()).unwrap_or(i64::MAX);
    let age_seconds = now
        .checked_sub(payload.issued_at)
        .ok_or_else(|| Rejection::Malformed("timestamp out of range".to_string()))?;
    if age_seconds.unsigned_abs() > window_seconds.unsigned_abs() {
        return Err(Rejection::Stale {
            age_seconds,
            window_seconds,
        });
    }

    Ok(payload)
}
