use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error::Result;

/// Fixed-window counters backing the rate limiter.
#[async_trait]
pub trait AttemptCounter: Send + Sync {
    /// Counts one attempt under `key` and returns the total within the current window.
    async fn hit(&self, key: &str, window: Duration) -> Result<u64>;
}

/// `INCR` + `EXPIRE` counters in redis.
#[derive(Clone)]
pub struct RedisAttemptCounter {
    redis: ConnectionManager,
}

impl RedisAttemptCounter {
    pub fn new(redis: ConnectionManager) -> Self {
        Self { redis }
    }
}

#[async_trait]
impl AttemptCounter for RedisAttemptCounter {
    async fn hit(&self, key: &str, window: Duration) -> Result<u64> {
        let mut conn = self.redis.clone();

        let count: u64 = redis::cmd("INCR")
            .arg(key)
            .query_async(&mut conn)
            .await?;

        if count == 1 {
            let _: () = redis::cmd("EXPIRE")
                .arg(key)
                .arg(window.as_secs().max(1))
                .query_async(&mut conn)
                .await?;
        }

        Ok(count)
    }
}

/// In-process counters.
#[derive(Clone, Default)]
pub struct MemoryAttemptCounter {
    counters: Arc<Mutex<HashMap<String, (u64, Instant)>>>,
}

impl MemoryAttemptCounter {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AttemptCounter for MemoryAttemptCounter {
    async fn hit(&self, key: &str, window: Duration) -> Result<u64> {
        let mut counters = self.counters.lock().await;
        let now = Instant::now();
        counters.retain(|_, (_, resets_at)| now < *resets_at);

        let entry = counters.entry(key.to_string()).or_insert((0, now + window));
        entry.0 += 1;

        Ok(entry.0)
    }
}
