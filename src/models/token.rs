use garde::Validate;
use serde::{Deserialize, Serialize};

use crate::crypto::aes::SealedPayload;

/// Shortest base64 body that can hold a nonce, a tag and a minimal payload.
/// Mirrored by the `garde` length rule on [`TokenEnvelope::payload`].
pub const MIN_ENVELOPE_DATA_LEN: usize = 40;
/// Upper bound on the base64 body, well above any real payload.
pub const MAX_ENVELOPE_DATA_LEN: usize = 512;

/// The plaintext sealed inside every presence token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPayload {
    /// The schedule entry (lesson) the token is bound to.
    #[serde(rename = "schedule_id")]
    pub lesson_id: i64,
    /// Unix seconds at generation time.
    #[serde(rename = "timestamp")]
    pub issued_at: i64,
}

/// The transport envelope encoded in the QR code and posted by the scanning client.
///
/// `teacher_id` travels in the clear so the validator knows whose secret to try.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct TokenEnvelope {
    #[garde(range(min = 1))]
    pub teacher_id: i64,
    /// base64(nonce || ciphertext || tag)
    #[serde(rename = "data")]
    #[garde(length(min = 40, max = 512))]
    pub payload: String,
}

impl TokenEnvelope {
    /// The opaque string rendered as a QR code.
    pub fn to_qr_string(&self) -> Result<String, sonic_rs::Error> {
        sonic_rs::to_string(self)
    }

    pub fn from_qr_string(qr: &str) -> Result<Self, sonic_rs::Error> {
        sonic_rs::from_str(qr)
    }
}

/// One rotation's token. It is superseded by the next tick and never stored.
#[derive(Debug, Clone)]
pub struct PresenceToken {
    pub teacher_id: i64,
    pub lesson_id: i64,
    pub issued_at: i64,
    pub sealed: SealedPayload,
}

impl PresenceToken {
    pub fn envelope(&self) -> TokenEnvelope {
        TokenEnvelope {
            teacher_id: self.teacher_id,
            payload: self.sealed.encode(),
        }
    }

    pub fn qr_string(&self) -> Result<String, sonic_rs::Error> {
        self.envelope().to_qr_string()
    }
}
