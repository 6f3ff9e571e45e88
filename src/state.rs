use std::sync::Arc;

use redis::aio::ConnectionManager;

use crate::config::Config;
use crate::error::Result;
use crate::protocol::validator::TokenValidator;
use crate::repositories::attempts::{AttemptCounter, RedisAttemptCounter};
use crate::repositories::attendance::{AttendanceStore, RedisAttendanceStore};
use crate::repositories::principal::{PrincipalStore, RedisPrincipalStore};
use crate::repositories::secret::{RedisSecretStore, SecretStore};

/// The application's state.
#[derive(Clone)]
pub struct AppState {
    /// The application's configuration.
    pub config: Config,
    /// Live session secrets, one per teacher.
    pub secrets: Arc<dyn SecretStore>,
    /// Recorded attendance.
    pub attendance: Arc<dyn AttendanceStore>,
    /// Bearer token lookup.
    pub principals: Arc<dyn PrincipalStore>,
    /// Rate limiter counters.
    pub attempts: Arc<dyn AttemptCounter>,
}

impl AppState {
    /// Creates a new redis-backed `AppState`.
    ///
    /// # Arguments
    ///
    /// * `config` - The application's configuration.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `AppState`.
    pub async fn new(config: &Config) -> Result<Self> {
        let redis_client = redis::Client::open(config.redis_url.as_str())?;
        let redis = ConnectionManager::new(redis_client).await?;
        tracing::info!("✅ Redis Connection Manager initialized (pooled)");

        Ok(Self::with_stores(
            config.clone(),
            Arc::new(RedisSecretStore::new(redis.clone())),
            Arc::new(RedisAttendanceStore::new(redis.clone())),
            Arc::new(RedisPrincipalStore::new(redis.clone())),
            Arc::new(RedisAttemptCounter::new(redis)),
        ))
    }

    /// Builds the state from explicit stores.
    pub fn with_stores(
        config: Config,
        secrets: Arc<dyn SecretStore>,
        attendance: Arc<dyn AttendanceStore>,
        principals: Arc<dyn PrincipalStore>,
        attempts: Arc<dyn AttemptCounter>,
    ) -> Self {
        Self {
            config,
            secrets,
            attendance,
            principals,
            attempts,
        }
    }

    /// A validator over this state's secret store and freshness window.
    pub fn validator(&self) -> TokenValidator {
        TokenValidator::new(self.secrets.clone(), self.config.freshness_window)
    }
}
