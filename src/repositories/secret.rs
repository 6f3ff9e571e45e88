use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tokio::sync::RwLock;
use zeroize::Zeroize;

use crate::crypto::secret::{fingerprint, SessionSecret};
use crate::error::Result;

/// Where live session secrets are kept, at most one per teacher.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Installs `secret` for the teacher, invalidating any previous one.
    async fn replace(&self, teacher_id: i64, secret: &SessionSecret) -> Result<()>;

    /// The teacher's current secret, if it has not expired.
    async fn active_for_teacher(&self, teacher_id: i64) -> Result<Option<SessionSecret>>;

    /// The teacher that owns a presented secret value, if it is still live.
    async fn teacher_for(&self, secret_value: &str) -> Result<Option<i64>>;

    /// Drops the teacher's secret. Returns whether one existed.
    async fn revoke(&self, teacher_id: i64) -> Result<bool>;
}

fn teacher_key(teacher_id: i64) -> String {
    format!("session_key:teacher:{}", teacher_id)
}

fn lookup_key(secret_value: &str) -> String {
    format!("session_key:lookup:{}", fingerprint(secret_value))
}

/// Redis-backed secret store.
///
/// `session_key:teacher:{id}` holds the secret, `session_key:lookup:{sha256}`
/// maps back to the teacher. Both carry the secret's TTL.
#[derive(Clone)]
pub struct RedisSecretStore {
    redis: ConnectionManager,
}

impl RedisSecretStore {
    pub fn new(redis: ConnectionManager) -> Self {
        Self { redis }
    }
}

#[async_trait]
impl SecretStore for RedisSecretStore {
    async fn replace(&self, teacher_id: i64, secret: &SessionSecret) -> Result<()> {
        let mut conn = self.redis.clone();

        let previous: Option<String> = conn.get(teacher_key(teacher_id)).await?;
        if let Some(mut previous) = previous {
            let _: () = conn.del(lookup_key(&previous)).await?;
            previous.zeroize();
            tracing::debug!("🔁 Previous session key dropped for teacher {}", teacher_id);
        }

        let _: () = redis::pipe()
            .atomic()
            .set_ex(lookup_key(secret.expose()), teacher_id, secret.ttl_seconds())
            .ignore()
            .set_ex(teacher_key(teacher_id), secret.expose(), secret.ttl_seconds())
            .ignore()
            .query_async(&mut conn)
            .await?;

        Ok(())
    }

    async fn active_for_teacher(&self, teacher_id: i64) -> Result<Option<SessionSecret>> {
        let mut conn = self.redis.clone();
        let key = teacher_key(teacher_id);

        let (value, ttl): (Option<String>, i64) = redis::pipe()
            .get(&key)
            .ttl(&key)
            .query_async(&mut conn)
            .await?;

        Ok(value.and_then(|value| {
            if ttl > 0 {
                Some(SessionSecret::new(value, ttl as u64))
            } else {
                let mut value = value;
                value.zeroize();
                None
            }
        }))
    }

    async fn teacher_for(&self, secret_value: &str) -> Result<Option<i64>> {
        let mut conn = self.redis.clone();

        let teacher_id: Option<i64> = conn.get(lookup_key(secret_value)).await?;
        let Some(teacher_id) = teacher_id else {
            return Ok(None);
        };

        // The lookup entry can outlive a replaced secret by a few ms; confirm against the forward key.
        let current = self.active_for_teacher(teacher_id).await?;
        Ok(current
            .filter(|secret| secret.matches(secret_value))
            .map(|_| teacher_id))
    }

    async fn revoke(&self, teacher_id: i64) -> Result<bool> {
        let mut conn = self.redis.clone();

        let previous: Option<String> = conn.get(teacher_key(teacher_id)).await?;
        let Some(mut previous) = previous else {
            return Ok(false);
        };

        let _: () = redis::pipe()
            .del(lookup_key(&previous))
            .ignore()
            .del(teacher_key(teacher_id))
            .ignore()
            .query_async(&mut conn)
            .await?;
        previous.zeroize();

        Ok(true)
    }
}

/// In-process secret store, used by tests and single-node deployments without redis.
#[derive(Clone, Default)]
pub struct MemorySecretStore {
    secrets: Arc<RwLock<HashMap<i64, SessionSecret>>>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SecretStore for MemorySecretStore {
    async fn replace(&self, teacher_id: i64, secret: &SessionSecret) -> Result<()> {
        let mut secrets = self.secrets.write().await;
        secrets.insert(teacher_id, secret.clone());
        Ok(())
    }

    async fn active_for_teacher(&self, teacher_id: i64) -> Result<Option<SessionSecret>> {
        let mut secrets = self.secrets.write().await;
        match secrets.get(&teacher_id) {
            Some(secret) if secret.is_expired() => {
                secrets.remove(&teacher_id);
                Ok(None)
            }
            Some(secret) => Ok(Some(secret.clone())),
            None => Ok(None),
        }
    }

    async fn teacher_for(&self, secret_value: &str) -> Result<Option<i64>> {
        let secrets = self.secrets.read().await;
        Ok(secrets
            .iter()
            .find(|(_, secret)| !secret.is_expired() && secret.matches(secret_value))
            .map(|(teacher_id, _)| *teacher_id))
    }

    async fn revoke(&self, teacher_id: i64) -> Result<bool> {
        let mut secrets = self.secrets.write().await;
        Ok(secrets.remove(&teacher_id).is_some())
    }
}
