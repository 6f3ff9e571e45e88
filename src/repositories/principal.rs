use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::models::principal::Principal;

/// Resolves bearer tokens issued by the identity service.
#[async_trait]
pub trait PrincipalStore: Send + Sync {
    async fn resolve(&self, bearer_token: &str) -> Result<Option<Principal>>;
}

/// Reads principals written by the identity service under `auth:{token}`.
#[derive(Clone)]
pub struct RedisPrincipalStore {
    redis: ConnectionManager,
}

impl RedisPrincipalStore {
    pub fn new(redis: ConnectionManager) -> Self {
        Self { redis }
    }
}

#[async_trait]
impl PrincipalStore for RedisPrincipalStore {
    async fn resolve(&self, bearer_token: &str) -> Result<Option<Principal>> {
        let mut conn = self.redis.clone();

        let principal_json: Option<String> = conn.get(format!("auth:{}", bearer_token)).await?;

        Ok(principal_json.and_then(|json| match sonic_rs::from_str::<Principal>(&json) {
            Ok(principal) => Some(principal),
            Err(e) => {
                tracing::warn!("❌ Invalid principal JSON: {}", e);
                None
            }
        }))
    }
}

/// In-process principal table.
#[derive(Clone, Default)]
pub struct MemoryPrincipalStore {
    principals: Arc<RwLock<HashMap<String, Principal>>>,
}

impl MemoryPrincipalStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, bearer_token: impl Into<String>, principal: Principal) {
        let mut principals = self.principals.write().await;
        principals.insert(bearer_token.into(), principal);
    }
}

#[async_trait]
impl PrincipalStore for MemoryPrincipalStore {
    async fn resolve(&self, bearer_token: &str) -> Result<Option<Principal>> {
        let principals = self.principals.read().await;
        Ok(principals.get(bearer_token).cloned())
    }
}
