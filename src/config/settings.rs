//! Application settings and configuration structures.

use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Root configuration structure containing all application settings.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Server configuration (host, port)
    pub server: ServerSettings,

    /// Redis configuration
    pub redis: RedisSettings,

    /// Session state store selection
    pub store: StoreSettings,

    /// Session lifecycle timings
    pub session: SessionSettings,

    /// Shutdown and readiness timings
    pub shutdown: ShutdownSettings,

    /// Current environment (development, staging, production)
    pub environment: String,
}

/// Server binding configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    /// Host address to bind to (e.g., "0.0.0.0")
    pub host: String,

    /// Port number to listen on
    pub port: u16,
}

/// Redis configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RedisSettings {
    /// Redis connection URL
    pub url: String,

    /// Namespace prepended to every key written by the server
    pub key_prefix: String,

    /// Upper bound on establishing the initial connection
    pub connect_timeout_ms: u64,

    /// Upper bound on any single command round trip
    pub operation_timeout_ms: u64,

    /// Period of the availability probe
    pub health_check_interval_secs: u64,
}

/// Which backend holds persisted session records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Redis,
    Memory,
}

/// Session state store configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreSettings {
    pub backend: StoreBackend,
}

/// Session lifecycle configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionSettings {
    /// How long a persisted record stays resumable after its last refresh (default: 900)
    pub reconnection_window_secs: u64,

    /// Heartbeat period in milliseconds (default: 30000)
    pub heartbeat_interval_ms: u64,

    /// Flush delay between the shutdown notice and the forced close (default: 100)
    pub close_grace_ms: u64,
}

/// Shutdown configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ShutdownSettings {
    /// Overall window between the termination signal and process exit (default: 10)
    pub grace_window_secs: u64,

    /// Delay after startup before the server reports ready (default: 2000)
    pub readiness_delay_ms: u64,
}

impl Settings {
    /// Load settings from environment variables and configuration files.
    ///
    /// The loading order is:
    /// 1. config/default.toml (base configuration)
    /// 2. config/{RUN_ENV}.toml (environment-specific overrides)
    /// 3. Environment variables (highest priority)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if configuration cannot be loaded or parsed,
    /// or if any lifecycle period is zero.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let environment = std::env::var("RUN_ENV").unwrap_or_else(|_| "development".into());

        Config::builder()
            .set_default("environment", environment.clone())?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("redis.url", "redis://127.0.0.1:6379")?
            .set_default("redis.key_prefix", "session_server:")?
            .set_default("redis.connect_timeout_ms", 5000_i64)?
            .set_default("redis.operation_timeout_ms", 2000_i64)?
            .set_default("redis.health_check_interval_secs", 5_i64)?
            .set_default("store.backend", "redis")?
            .set_default("session.reconnection_window_secs", 900_i64)?
            .set_default("session.heartbeat_interval_ms", 30000_i64)?
            .set_default("session.close_grace_ms", 100_i64)?
            .set_default("shutdown.grace_window_secs", 10_i64)?
            .set_default("shutdown.readiness_delay_ms", 2000_i64)?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // APP__SESSION__HEARTBEAT_INTERVAL_MS=5000 -> session.heartbeat_interval_ms = 5000
            .add_source(
                Environment::default()
                    .prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("server.host", std::env::var("SERVER_HOST").ok())?
            .set_override_option("server.port", std::env::var("SERVER_PORT").ok())?
            .set_override_option("redis.url", std::env::var("REDIS_URL").ok())?
            .build()?
            .try_deserialize()
            .and_then(|settings: Self| {
                settings.validate()?;
                Ok(settings)
            })
    }

    /// Reject configurations that would spin timers or never expire records.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks = [
            ("session.reconnection_window_secs", self.session.reconnection_window_secs),
            ("session.heartbeat_interval_ms", self.session.heartbeat_interval_ms),
            ("redis.operation_timeout_ms", self.redis.operation_timeout_ms),
            ("redis.health_check_interval_secs", self.redis.health_check_interval_secs),
        ];
        for (name, value) in checks {
            if value == 0 {
                return Err(ConfigError::Message(format!("{} must be greater than zero", name)));
            }
        }
        Ok(())
    }

    /// Get the full server address as a string.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl RedisSettings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }

    pub fn health_check_interval(&self) -> Duration {
        Duration::from_secs(self.health_check_interval_secs)
    }
}

impl SessionSettings {
    pub fn reconnection_window(&self) -> Duration {
        Duration::from_secs(self.reconnection_window_secs)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn close_grace(&self) -> Duration {
        Duration::from_millis(self.close_grace_ms)
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            reconnection_window_secs: 900,
            heartbeat_interval_ms: 30_000,
            close_grace_ms: 100,
        }
    }
}

impl ShutdownSettings {
    pub fn grace_window(&self) -> Duration {
        Duration::from_secs(self.grace_window_secs)
    }

    pub fn readiness_delay(&self) -> Duration {
        Duration::from_millis(self.readiness_delay_ms)
    }
}

impl Default for ShutdownSettings {
    fn default() -> Self {
        Self {
            grace_window_secs: 10,
            readiness_delay_ms: 2000,
        }
    }
}
