use async_trait::async_trait;

use crate::crypto::secret::SessionSecret;
use crate::error::ProtocolError;

/// The session key service as seen from the presentation side.
#[async_trait]
pub trait SessionKeyApi: Send + Sync {
    /// Exchanges a teacher credential for a fresh session secret.
    ///
    /// # Errors
    ///
    /// * `IssuanceUnauthorized` - the credential is invalid or expired.
    /// * `IssuanceUnavailable` - network or server failure.
    async fn issue(&self, teacher_credential: &str) -> Result<SessionSecret, ProtocolError>;

    /// Confirms the secret is still live and returns the teacher it belongs to.
    ///
    /// # Errors
    ///
    /// * `SecretRejected` - the server no longer knows the secret.
    /// * `CheckUnavailable` - the check could not be completed.
    async fn check(&self, secret: &SessionSecret) -> Result<i64, ProtocolError>;
}
