use std::time::Duration;

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// The server's error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// A Redis error.
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// An authentication error.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// An authorization error.
    #[error("Authorization failed")]
    Unauthorized,

    /// A resource not found error.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A validation error.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The request conflicts with an existing record.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A presented token was rejected by the validator.
    #[error(transparent)]
    Rejected(#[from] Rejection),

    /// An encryption error.
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// An internal server error.
    #[error("Internal server error: {0}")]
    Internal(String),

    /// A rate limit exceeded error.
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),
}

/// A `Result` type that uses `AppError` as the error type.
pub type Result<T> = std::result::Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Redis(ref e) => {
                tracing::error!("Redis error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Cache error".to_string())
            }

            AppError::Authentication(ref msg) => {
                tracing::warn!("Authentication failed: {}", msg);
                (StatusCode::UNAUTHORIZED, msg.clone())
            }

            AppError::Unauthorized => {
                tracing::warn!("Authorization failed");
                (StatusCode::FORBIDDEN, "Forbidden".to_string())
            }

            AppError::NotFound(ref msg) => {
                tracing::debug!("Resource not found: {}", msg);
                (StatusCode::NOT_FOUND, msg.clone())
            }

            AppError::Validation(ref msg) => {
                tracing::debug!("Validation error: {}", msg);
                (StatusCode::BAD_REQUEST, msg.clone())
            }

            AppError::Conflict(ref msg) => {
                tracing::debug!("Conflict: {}", msg);
                (StatusCode::CONFLICT, msg.clone())
            }

            AppError::Rejected(ref rejection) => {
                tracing::info!("Token rejected: {}", rejection);
                (rejection.status_code(), rejection.public_message().to_string())
            }

            AppError::Encryption(ref msg) => {
                tracing::error!("Encryption error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Encryption error".to_string())
            }

            AppError::Internal(ref msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }

            AppError::RateLimitExceeded(ref msg) => {
                tracing::warn!("Rate limit exceeded: {}", msg);
                (StatusCode::TOO_MANY_REQUESTS, msg.clone())
            }
        };

        let body = sonic_rs::to_string(&sonic_rs::json!({
            "error": message
        }))
        .unwrap_or_else(|_| r#"{"error":"Internal server error"}"#.to_string());

        (status, [(header::CONTENT_TYPE, "application/json")], body).into_response()
    }
}

/// Failures of the AES-GCM payload cipher.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CipherError {
    #[error("AES-GCM encryption failed")]
    Seal,

    #[error("AES-GCM authentication failed")]
    Open,

    #[error("Invalid base64 payload: {0}")]
    Encoding(String),

    #[error("Sealed payload too short: {0} bytes")]
    Truncated(usize),

    #[error("Payload serialization failed: {0}")]
    Serialization(String),
}

/// Why the validator refused a presented token.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// The teacher has no live session secret (never issued, expired or revoked).
    #[error("No active session key for teacher")]
    NoActiveSecret,

    #[error("Malformed token: {0}")]
    Malformed(String),

    /// Authentication tag did not verify under the teacher's current secret.
    #[error("Token could not be decrypted")]
    Undecryptable,

    #[error("Token is stale ({age_seconds}s old, window {window_seconds}s)")]
    Stale { age_seconds: i64, window_seconds: i64 },

    #[error("Secret store unavailable: {0}")]
    Unavailable(String),
}

impl Rejection {
    /// HTTP status reported to the scanning client.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Rejection::NoActiveSecret => StatusCode::NOT_FOUND,
            Rejection::Malformed(_) | Rejection::Undecryptable | Rejection::Stale { .. } => {
                StatusCode::BAD_REQUEST
            }
            Rejection::Unavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show the scanning client.
    pub fn public_message(&self) -> &'static str {
        match self {
            Rejection::NoActiveSecret => "Session key not found for this teacher",
            Rejection::Malformed(_) => "Invalid QR data",
            Rejection::Undecryptable => "Failed to decrypt QR data",
            Rejection::Stale { .. } => "QR code expired",
            Rejection::Unavailable(_) => "Internal server error",
        }
    }
}

/// Which collaborator call exceeded its deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Issue,
    Check,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Issue => f.write_str("session key issuance"),
            Operation::Check => f.write_str("session key check"),
        }
    }
}

/// Errors surfaced by the rotation controller and its session key API.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Teacher credential invalid or expired. Rotation never starts.
    #[error("Teacher credential rejected by the session key service")]
    IssuanceUnauthorized,

    #[error("Session key service unavailable: {0}")]
    IssuanceUnavailable(String),

    /// The secret failed a liveness check or expired mid-session.
    #[error("Session key rejected: {0}")]
    SecretRejected(String),

    /// The liveness check could not be completed.
    #[error("Session key check unavailable: {0}")]
    CheckUnavailable(String),

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("{operation} timed out after {after:?}")]
    Timeout { operation: Operation, after: Duration },
}

/// The three error signals the presentation surface distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Issuance,
    SecretRejected,
    Encryption,
}

impl ProtocolError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProtocolError::IssuanceUnauthorized
            | ProtocolError::IssuanceUnavailable(_)
            | ProtocolError::Timeout { operation: Operation::Issue, .. } => ErrorKind::Issuance,
            ProtocolError::SecretRejected(_)
            | ProtocolError::CheckUnavailable(_)
            | ProtocolError::Timeout { operation: Operation::Check, .. } => {
                ErrorKind::SecretRejected
            }
            ProtocolError::EncryptionFailed(_) => ErrorKind::Encryption,
        }
    }

    /// Only transient issuance failures may be retried, and only by the caller.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProtocolError::IssuanceUnavailable(_)
                | ProtocolError::Timeout { operation: Operation::Issue, .. }
        )
    }
}

impl From<CipherError> for ProtocolError {
    fn from(e: CipherError) -> Self {
        ProtocolError::EncryptionFailed(e.to_string())
    }
}

impl ErrorKind {
    /// Message shown in place of the QR code.
    pub fn user_message(&self) -> &'static str {
        match self {
            ErrorKind::Issuance => "Failed to fetch session key.",
            ErrorKind::SecretRejected => "Invalid session key. Please reopen the QR code.",
            ErrorKind::Encryption => "Could not generate a QR code.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeouts_map_to_the_failing_operation() {
        let issue = ProtocolError::Timeout {
            operation: Operation::Issue,
            after: Duration::from_secs(5),
        };
        let check = ProtocolError::Timeout {
            operation: Operation::Check,
            after: Duration::from_secs(5),
        };

        assert_eq!(issue.kind(), ErrorKind::Issuance);
        assert!(issue.is_retryable());
        assert_eq!(check.kind(), ErrorKind::SecretRejected);
        assert!(!check.is_retryable());
    }

    #[test]
    fn unauthorized_is_fatal() {
        assert_eq!(ProtocolError::IssuanceUnauthorized.kind(), ErrorKind::Issuance);
        assert!(!ProtocolError::IssuanceUnauthorized.is_retryable());
    }

    #[test]
    fn rejections_map_to_http_status() {
        assert_eq!(Rejection::NoActiveSecret.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            Rejection::Stale { age_seconds: 30, window_seconds: 5 }.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(Rejection::Undecryptable.public_message(), "Failed to decrypt QR data");
    }
}
