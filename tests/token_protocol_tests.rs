use std::sync::Arc;
use std::time::Duration;

use presence::crypto::secret::SessionSecret;
use presence::error::Rejection;
use presence::models::token::TokenEnvelope;
use presence::protocol::generator;
use presence::protocol::validator::TokenValidator;
use presence::repositories::secret::{MemorySecretStore, SecretStore};

const TEACHER_ID: i64 = 11;
const LESSON_ID: i64 = 305;
const T0: i64 = 1_700_000_000;

struct TestContext {
    store: Arc<MemorySecretStore>,
    validator: TokenValidator,
}

impl TestContext {
    fn new() -> Self {
        let store = Arc::new(MemorySecretStore::new());
        let validator = TokenValidator::new(store.clone(), Duration::from_secs(5));
        Self { store, validator }
    }

    async fn install(&self, teacher_id: i64) -> SessionSecret {
        let secret = SessionSecret::generate(3600);
        self.store.replace(teacher_id, &secret).await.unwrap();
        secret
    }
}

fn envelope_at(secret: &SessionSecret, teacher_id: i64, lesson_id: i64, ts: i64) -> TokenEnvelope {
    generator::generate_at(secret, teacher_id, lesson_id, ts)
        .unwrap()
        .envelope()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_consecutive_ticks_are_accepted_within_window() {
        let context = TestContext::new();
        let secret = context.install(TEACHER_ID).await;

        for ts in [T0, T0 + 1, T0 + 2] {
            let envelope = envelope_at(&secret, TEACHER_ID, LESSON_ID, ts);
            let grant = context
                .validator
                .validate_at(&envelope, 77, T0 + 3)
                .await
                .unwrap();

            assert_eq!(grant.lesson_id, LESSON_ID);
            assert_eq!(grant.teacher_id, TEACHER_ID);
            assert_eq!(grant.student_id, 77);
            assert_eq!(grant.token_issued_at, ts);
        }
    }

    #[tokio::test]
    async fn test_window_edge_is_inclusive() {
        let context = TestContext::new();
        let secret = context.install(TEACHER_ID).await;
        let envelope = envelope_at(&secret, TEACHER_ID, LESSON_ID, T0);

        assert!(context.validator.validate_at(&envelope, 1, T0 + 5).await.is_ok());
        assert_eq!(
            context.validator.validate_at(&envelope, 1, T0 + 6).await.unwrap_err(),
            Rejection::Stale {
                age_seconds: 6,
                window_seconds: 5
            }
        );
    }

    #[tokio::test]
    async fn test_replayed_old_token_is_stale() {
        let context = TestContext::new();
        let secret = context.install(TEACHER_ID).await;
        let envelope = envelope_at(&secret, TEACHER_ID, LESSON_ID, T0);

        let err = context
            .validator
            .validate_at(&envelope, 1, T0 + 60)
            .await
            .unwrap_err();
        assert!(matches!(err, Rejection::Stale { .. }));
    }

    #[tokio::test]
    async fn test_future_timestamp_is_rejected() {
        let context = TestContext::new();
        let secret = context.install(TEACHER_ID).await;
        let envelope = envelope_at(&secret, TEACHER_ID, LESSON_ID, T0 + 30);

        let err = context.validator.validate_at(&envelope, 1, T0).await.unwrap_err();
        assert_eq!(
            err,
            Rejection::Stale {
                age_seconds: -30,
                window_seconds: 5
            }
        );
    }

    #[tokio::test]
    async fn test_token_from_rotated_secret_is_undecryptable() {
        let context = TestContext::new();
        let old = context.install(TEACHER_ID).await;
        let envelope = envelope_at(&old, TEACHER_ID, LESSON_ID, T0);

        // Teacher restarts the session
        let new = context.install(TEACHER_ID).await;

        assert_eq!(
            context.validator.validate_at(&envelope, 1, T0).await.unwrap_err(),
            Rejection::Undecryptable
        );
        let fresh = envelope_at(&new, TEACHER_ID, LESSON_ID, T0);
        assert!(context.validator.validate_at(&fresh, 1, T0).await.is_ok());
    }

    #[tokio::test]
    async fn test_unknown_teacher_has_no_secret() {
        let context = TestContext::new();
        let orphan = SessionSecret::generate(3600);
        let envelope = envelope_at(&orphan, TEACHER_ID, LESSON_ID, T0);

        assert_eq!(
            context.validator.validate_at(&envelope, 1, T0).await.unwrap_err(),
            Rejection::NoActiveSecret
        );
    }

    #[tokio::test]
    async fn test_revoked_secret_rejects_tokens() {
        let context = TestContext::new();
        let secret = context.install(TEACHER_ID).await;
        let envelope = envelope_at(&secret, TEACHER_ID, LESSON_ID, T0);

        assert!(context.store.revoke(TEACHER_ID).await.unwrap());
        assert_eq!(
            context.validator.validate_at(&envelope, 1, T0).await.unwrap_err(),
            Rejection::NoActiveSecret
        );
    }

    #[tokio::test]
    async fn test_swapped_teacher_id_is_undecryptable() {
        let context = TestContext::new();
        let secret = context.install(TEACHER_ID).await;
        context.install(TEACHER_ID + 1).await;

        let mut envelope = envelope_at(&secret, TEACHER_ID, LESSON_ID, T0);
        envelope.teacher_id = TEACHER_ID + 1;

        assert_eq!(
            context.validator.validate_at(&envelope, 1, T0).await.unwrap_err(),
            Rejection::Undecryptable
        );
    }

    #[tokio::test]
    async fn test_tampered_body_is_rejected() {
        let context = TestContext::new();
        let secret = context.install(TEACHER_ID).await;
        let mut envelope = envelope_at(&secret, TEACHER_ID, LESSON_ID, T0);

        // Change one base64 character in the middle of the ciphertext
        let mut chars: Vec<char> = envelope.payload.chars().collect();
        let mid = chars.len() / 2;
        chars[mid] = if chars[mid] == 'A' { 'B' } else { 'A' };
        envelope.payload = chars.into_iter().collect();

        assert_eq!(
            context.validator.validate_at(&envelope, 1, T0).await.unwrap_err(),
            Rejection::Undecryptable
        );
    }

    #[tokio::test]
    async fn test_garbage_body_is_malformed() {
        let context = TestContext::new();
        context.install(TEACHER_ID).await;
        let envelope = TokenEnvelope {
            teacher_id: TEACHER_ID,
            payload: "%%%% definitely not base64 %%%%".to_string(),
        };

        assert!(matches!(
            context.validator.validate_at(&envelope, 1, T0).await.unwrap_err(),
            Rejection::Malformed(_)
        ));
    }

    #[tokio::test]
    async fn test_qr_string_uses_wire_field_names() {
        let secret = SessionSecret::generate(3600);
        let qr = generator::generate_at(&secret, TEACHER_ID, LESSON_ID, T0)
            .unwrap()
            .qr_string()
            .unwrap();

        assert!(qr.contains("\"teacher_id\":11"));
        assert!(qr.contains("\"data\":"));

        let parsed = TokenEnvelope::from_qr_string(&qr).unwrap();
        assert_eq!(parsed.teacher_id, TEACHER_ID);
    }
}
