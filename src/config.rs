use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use zeroize::Zeroizing;

use crate::rotation::controller::RotationConfig;

/// Reads an environment variable, falling back to `default` when unset.
fn env_or<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid {}", name)),
        Err(_) => Ok(default),
    }
}

/// The server's configuration.
#[derive(Clone, Debug)]
pub struct Config {
    /// The URL of the Redis server.
    pub redis_url: String,
    /// The address the HTTP server listens on.
    pub bind_addr: SocketAddr,
    /// Lifetime of an issued session key.
    pub session_ttl_seconds: u64,
    /// Maximum age of a presented token.
    pub freshness_window: Duration,
    /// The cadence presenters are expected to rotate at.
    pub rotation_interval: Duration,
    /// Attendance confirmations allowed per student per minute.
    pub confirm_rate_limit: u64,
    /// Allowed browser origin for CORS.
    pub cors_origin: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            redis_url: "redis://127.0.0.1:6379".to_string(),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            session_ttl_seconds: 3600,
            freshness_window: Duration::from_secs(5),
            rotation_interval: Duration::from_secs(1),
            confirm_rate_limit: 30,
            cors_origin: "http://localhost:3000".to_string(),
        }
    }
}

impl Config {
    /// Creates a new `Config` from environment variables.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `Config`.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let config = Self {
            redis_url: env::var("REDIS_URL").unwrap_or(defaults.redis_url),
            bind_addr: env_or("BIND_ADDR", defaults.bind_addr)?,
            session_ttl_seconds: env_or("SESSION_TTL_SECONDS", defaults.session_ttl_seconds)?,
            freshness_window: Duration::from_secs(env_or(
                "FRESHNESS_WINDOW_SECONDS",
                defaults.freshness_window.as_secs(),
            )?),
            rotation_interval: Duration::from_secs(env_or(
                "ROTATION_INTERVAL_SECONDS",
                defaults.rotation_interval.as_secs(),
            )?),
            confirm_rate_limit: env_or("CONFIRM_RATE_LIMIT", defaults.confirm_rate_limit)?,
            cors_origin: env::var("CORS_ORIGIN").unwrap_or(defaults.cors_origin),
        };

        config.validate()?;
        Ok(config)
    }

    /// Rejects settings that would break the freshness guarantee.
    pub fn validate(&self) -> Result<()> {
        if self.session_ttl_seconds == 0 {
            anyhow::bail!("SESSION_TTL_SECONDS must be greater than zero");
        }
        if self.rotation_interval.is_zero() {
            anyhow::bail!("ROTATION_INTERVAL_SECONDS must be greater than zero");
        }
        if self.freshness_window <= self.rotation_interval {
            anyhow::bail!(
                "FRESHNESS_WINDOW_SECONDS ({}) must be greater than ROTATION_INTERVAL_SECONDS ({})",
                self.freshness_window.as_secs(),
                self.rotation_interval.as_secs()
            );
        }
        Ok(())
    }
}

/// Configuration of the terminal presenter.
#[derive(Clone)]
pub struct PresenterConfig {
    /// Base URL of the presence server.
    pub api_url: String,
    /// The teacher's bearer token.
    pub teacher_token: Zeroizing<String>,
    /// The lesson whose attendance is being taken.
    pub lesson_id: i64,
    pub rotation: RotationConfig,
}

impl PresenterConfig {
    /// Creates a new `PresenterConfig` from environment variables.
    pub fn from_env() -> Result<Self> {
        let defaults = RotationConfig::default();

        let teacher_token = Zeroizing::new(
            env::var("PRESENCE_TEACHER_TOKEN").context("PRESENCE_TEACHER_TOKEN must be set")?,
        );

        let lesson_id: i64 = env::var("PRESENCE_LESSON_ID")
            .context("PRESENCE_LESSON_ID must be set")?
            .trim()
            .parse()
            .context("Invalid PRESENCE_LESSON_ID")?;
        if lesson_id <= 0 {
            anyhow::bail!("PRESENCE_LESSON_ID must be positive");
        }

        let rotation = RotationConfig {
            tick_interval: Duration::from_secs(env_or(
                "ROTATION_INTERVAL_SECONDS",
                defaults.tick_interval.as_secs(),
            )?),
            request_timeout: Duration::from_secs(env_or(
                "PRESENCE_REQUEST_TIMEOUT_SECONDS",
                defaults.request_timeout.as_secs(),
            )?),
            liveness_every: env_or("PRESENCE_LIVENESS_EVERY", defaults.liveness_every)?,
            check_tolerance: env_or("PRESENCE_CHECK_TOLERANCE", defaults.check_tolerance)?,
        };
        if rotation.tick_interval.is_zero() {
            anyhow::bail!("ROTATION_INTERVAL_SECONDS must be greater than zero");
        }

        Ok(Self {
            api_url: env::var("PRESENCE_API_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:3000".to_string()),
            teacher_token,
            lesson_id,
            rotation,
        })
    }
}
