use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The kind of account behind a bearer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Teacher,
    Student,
}

/// An authenticated caller, as recorded by the identity service.
///
/// Stored as JSON under `auth:{bearer_token}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
    /// Teacher or student id, depending on `role`.
    pub user_id: i64,
    pub role: Role,
    /// The timestamp when the bearer token stops being valid.
    pub expires_at: DateTime<Utc>,
}

impl Principal {
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}
