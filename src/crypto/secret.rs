use std::fmt;
use std::time::Duration;

use base64::{Engine as _, engine::general_purpose};
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tokio::time::Instant;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// The number of random bytes in a session secret.
const SECRET_SIZE: usize = 32;

/// Short-lived key material tied to one teacher's rotation session.
///
/// The value is wiped from memory when the secret is dropped, whichever path
/// drops it. `Debug` never prints the value.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SessionSecret {
    value: String,
    #[zeroize(skip)]
    issued_at: Instant,
    #[zeroize(skip)]
    ttl_seconds: u64,
}

impl SessionSecret {
    /// Wraps a secret received from (or stored by) the issuer. The lifetime starts now.
    pub fn new(value: String, ttl_seconds: u64) -> Self {
        Self {
            value,
            issued_at: Instant::now(),
            ttl_seconds,
        }
    }

    /// Generates a fresh secret: 32 bytes from the OS RNG, URL-safe base64 without padding.
    pub fn generate(ttl_seconds: u64) -> Self {
        let mut bytes = [0u8; SECRET_SIZE];
        OsRng.fill_bytes(&mut bytes);
        let value = general_purpose::URL_SAFE_NO_PAD.encode(bytes);
        bytes.zeroize();

        Self::new(value, ttl_seconds)
    }

    /// The raw secret value. Callers must not log or persist it.
    pub fn expose(&self) -> &str {
        &self.value
    }

    pub fn issued_at(&self) -> Instant {
        self.issued_at
    }

    pub fn ttl_seconds(&self) -> u64 {
        self.ttl_seconds
    }

    pub fn expires_at(&self) -> Instant {
        self.issued_at + Duration::from_secs(self.ttl_seconds)
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at()
    }

    /// Constant-time comparison against a presented secret value.
    pub fn matches(&self, candidate: &str) -> bool {
        self.value.as_bytes().ct_eq(candidate.as_bytes()).into()
    }
}

impl fmt::Debug for SessionSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionSecret")
            .field("value", &"<redacted>")
            .field("ttl_seconds", &self.ttl_seconds)
            .finish()
    }
}

/// SHA-256 hex digest of a secret value, used as a non-secret lookup key.
pub fn fingerprint(value: &str) -> String {
    hex::encode(Sha256::digest(value.as_bytes()))
}
