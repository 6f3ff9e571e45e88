use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Proof that a student scanned a fresh token for a lesson.
///
/// Produced by the validator and persisted by the attendance store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceGrant {
    pub lesson_id: i64,
    pub student_id: i64,
    pub teacher_id: i64,
    /// Unix seconds carried inside the token.
    pub token_issued_at: i64,
    pub granted_at: DateTime<Utc>,
}

impl AttendanceGrant {
    /// The UTC day attendance is recorded for.
    pub fn lesson_date(&self) -> NaiveDate {
        self.granted_at.date_naive()
    }
}

/// A stored scan, as listed for a lesson and day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub student_id: i64,
    pub scanned_at: DateTime<Utc>,
}
