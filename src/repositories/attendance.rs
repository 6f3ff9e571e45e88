use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::models::attendance::{AttendanceGrant, AttendanceRecord};

/// Persists attendance grants. One record per student, lesson and day.
#[async_trait]
pub trait AttendanceStore: Send + Sync {
    /// Records the grant. Returns `false` if the student was already recorded
    /// for that lesson on that day.
    async fn record(&self, grant: &AttendanceGrant) -> Result<bool>;

    /// All scans recorded for a lesson on a day, oldest first.
    async fn list(&self, lesson_id: i64, lesson_date: NaiveDate) -> Result<Vec<AttendanceRecord>>;

    /// The teacher whose tokens first recorded attendance for the lesson.
    async fn lesson_owner(&self, lesson_id: i64) -> Result<Option<i64>>;
}

fn attendance_key(lesson_id: i64, lesson_date: NaiveDate) -> String {
    format!("attendance:{}:{}", lesson_id, lesson_date)
}

fn owner_key(lesson_id: i64) -> String {
    format!("attendance:owner:{}", lesson_id)
}

fn sort_records(mut records: Vec<AttendanceRecord>) -> Vec<AttendanceRecord> {
    records.sort_by(|a, b| {
        a.scanned_at
            .cmp(&b.scanned_at)
            .then(a.student_id.cmp(&b.student_id))
    });
    records
}

/// Redis-backed attendance store: one hash per lesson and day, field = student id.
/// `attendance:owner:{lesson}` holds the owning teacher.
#[derive(Clone)]
pub struct RedisAttendanceStore {
    redis: ConnectionManager,
}

impl RedisAttendanceStore {
    pub fn new(redis: ConnectionManager) -> Self {
        Self { redis }
    }
}

#[async_trait]
impl AttendanceStore for RedisAttendanceStore {
    async fn record(&self, grant: &AttendanceGrant) -> Result<bool> {
        let mut conn = self.redis.clone();

        let (_, inserted): (bool, bool) = redis::pipe()
            .atomic()
            .set_nx(owner_key(grant.lesson_id), grant.teacher_id)
            .hset_nx(
                attendance_key(grant.lesson_id, grant.lesson_date()),
                grant.student_id,
                grant.granted_at.to_rfc3339(),
            )
            .query_async(&mut conn)
            .await?;

        Ok(inserted)
    }

    async fn lesson_owner(&self, lesson_id: i64) -> Result<Option<i64>> {
        let mut conn = self.redis.clone();
        let owner: Option<i64> = conn.get(owner_key(lesson_id)).await?;
        Ok(owner)
    }

    async fn list(&self, lesson_id: i64, lesson_date: NaiveDate) -> Result<Vec<AttendanceRecord>> {
        let mut conn = self.redis.clone();

        let entries: HashMap<i64, String> = conn.hgetall(attendance_key(lesson_id, lesson_date)).await?;

        let records = entries
            .into_iter()
            .filter_map(|(student_id, scanned_at)| {
                match DateTime::parse_from_rfc3339(&scanned_at) {
                    Ok(ts) => Some(AttendanceRecord {
                        student_id,
                        scanned_at: ts.with_timezone(&Utc),
                    }),
                    Err(e) => {
                        tracing::warn!("⚠️  Skipping unreadable attendance entry for student {}: {}", student_id, e);
                        None
                    }
                }
            })
            .collect();

        Ok(sort_records(records))
    }
}

/// In-process attendance store.
#[derive(Clone, Default)]
pub struct MemoryAttendanceStore {
    records: Arc<RwLock<HashMap<(i64, NaiveDate), HashMap<i64, DateTime<Utc>>>>>,
    owners: Arc<RwLock<HashMap<i64, i64>>>,
}

impl MemoryAttendanceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AttendanceStore for MemoryAttendanceStore {
    async fn record(&self, grant: &AttendanceGrant) -> Result<bool> {
        self.owners
            .write()
            .await
            .entry(grant.lesson_id)
            .or_insert(grant.teacher_id);

        let mut records = self.records.write().await;
        let day = records
            .entry((grant.lesson_id, grant.lesson_date()))
            .or_default();

        if day.contains_key(&grant.student_id) {
            return Ok(false);
        }
        day.insert(grant.student_id, grant.granted_at);
        Ok(true)
    }

    async fn list(&self, lesson_id: i64, lesson_date: NaiveDate) -> Result<Vec<AttendanceRecord>> {
        let records = self.records.read().await;
        let day = records
            .get(&(lesson_id, lesson_date))
            .map(|day| {
                day.iter()
                    .map(|(student_id, scanned_at)| AttendanceRecord {
                        student_id: *student_id,
                        scanned_at: *scanned_at,
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(sort_records(day))
    }

    async fn lesson_owner(&self, lesson_id: i64) -> Result<Option<i64>> {
        Ok(self.owners.read().await.get(&lesson_id).copied())
    }
}
