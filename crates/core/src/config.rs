use std::env;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_num<T: FromStr>(profile: &str, key: &str, default: T) -> T {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub storage: StorageConfig,
    pub postgres: PostgresConfig,
    pub scheduler: SchedulerSettings,
    pub broker: BrokerConfig,
    pub logger: LoggerConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `AGENDA_PROFILE`. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env::var("AGENDA_PROFILE").unwrap_or_default();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            storage: StorageConfig::from_env_profiled(p),
            postgres: PostgresConfig::from_env_profiled(p),
            scheduler: SchedulerSettings::from_env_profiled(p),
            broker: BrokerConfig::from_env_profiled(p),
            logger: LoggerConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Reject values the services cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.storage.mode()?;
        if self.storage.query_timeout_secs == 0 {
            return Err(ConfigError::NotPositive {
                key: "QUERY_TIMEOUT_SECS",
                value: 0,
            });
        }
        self.scheduler.validate()?;
        if self.broker.queue.trim().is_empty() {
            return Err(ConfigError::Empty { key: "BROKER_QUEUE" });
        }
        if self.broker.endpoint.trim().is_empty() {
            return Err(ConfigError::Empty { key: "BROKER_ENDPOINT" });
        }
        Ok(())
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  storage:     mode={}, query_timeout={}s, notify_lead={}m",
            self.storage.mode,
            self.storage.query_timeout_secs,
            self.storage.notify_lead_minutes
        );
        tracing::info!("  postgres:    host={}, db={}", self.postgres.host, self.postgres.database);
        tracing::info!(
            "  scheduler:   poll={}s, outdated_after={}d",
            self.scheduler.poll_time_seconds,
            self.scheduler.outdated_event_days
        );
        tracing::info!("  broker:      endpoint={}, queue={}", self.broker.endpoint, self.broker.queue);
    }
}

// ── Storage ───────────────────────────────────────────────────

/// Which event store backend to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageMode {
    Memory,
    Sql,
}

impl FromStr for StorageMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "in-memory" | "memory" => Ok(StorageMode::Memory),
            "sql" | "postgres" => Ok(StorageMode::Sql),
            other => Err(ConfigError::UnknownStorageMode(other.to_string())),
        }
    }
}

impl fmt::Display for StorageMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageMode::Memory => write!(f, "in-memory"),
            StorageMode::Sql => write!(f, "sql"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Raw mode string; see [`StorageConfig::mode`].
    pub mode: String,
    /// Per-query deadline for the SQL backend.
    pub query_timeout_secs: u64,
    /// How long before `date_start` an event becomes due for notification.
    pub notify_lead_minutes: u32,
}

impl StorageConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            mode: profiled_env_or(p, "STORAGE_MODE", "in-memory"),
            query_timeout_secs: profiled_env_num(p, "QUERY_TIMEOUT_SECS", 3),
            notify_lead_minutes: profiled_env_num(p, "NOTIFY_LEAD_MINUTES", 15),
        }
    }

    pub fn mode(&self) -> Result<StorageMode, ConfigError> {
        self.mode.parse()
    }
}

// ── PostgreSQL ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub ssl_mode: String,
    pub max_connections: u32,
}

impl PostgresConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            host: profiled_env_or(p, "PG_HOST", "localhost"),
            port: profiled_env_num(p, "PG_PORT", 5432),
            database: profiled_env_or(p, "PG_DATABASE", "calendar"),
            username: profiled_env_opt(p, "PG_USERNAME"),
            password: profiled_env_opt(p, "PG_PASSWORD"),
            ssl_mode: profiled_env_or(p, "PG_SSL_MODE", "prefer"),
            max_connections: profiled_env_num(p, "PG_MAX_CONNECTIONS", 10),
        }
    }

    pub fn connection_string(&self) -> String {
        let user = self.username.as_deref().unwrap_or("postgres");
        let pass = self.password.as_deref().unwrap_or("");
        format!(
            "postgres://{}:{}@{}:{}/{}?sslmode={}",
            user, pass, self.host, self.port, self.database, self.ssl_mode
        )
    }
}

// ── Scheduler ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerSettings {
    pub poll_time_seconds: u64,
    /// Events whose start is older than this many days are removed.
    pub outdated_event_days: u32,
    /// Deadline shared by all publishes of one tick.
    pub publish_timeout_ms: u64,
}

impl SchedulerSettings {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            poll_time_seconds: profiled_env_num(p, "POLL_TIME_SECONDS", 60),
            outdated_event_days: profiled_env_num(p, "OUTDATED_EVENT_DAYS", 365),
            publish_timeout_ms: profiled_env_num(p, "PUBLISH_TIMEOUT_MS", 1000),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_time_seconds == 0 {
            return Err(ConfigError::NotPositive {
                key: "POLL_TIME_SECONDS",
                value: 0,
            });
        }
        if self.outdated_event_days == 0 {
            return Err(ConfigError::NotPositive {
                key: "OUTDATED_EVENT_DAYS",
                value: 0,
            });
        }
        if self.publish_timeout_ms == 0 {
            return Err(ConfigError::NotPositive {
                key: "PUBLISH_TIMEOUT_MS",
                value: 0,
            });
        }
        Ok(())
    }
}

// ── Broker ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// ZeroMQ endpoint, e.g. `tcp://127.0.0.1:5560`.
    pub endpoint: String,
    pub queue: String,
}

impl BrokerConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            endpoint: profiled_env_or(p, "BROKER_ENDPOINT", "tcp://127.0.0.1:5560"),
            queue: profiled_env_or(p, "BROKER_QUEUE", "notifications"),
        }
    }
}

// ── Logger ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggerConfig {
    /// `tracing` filter directive used when `RUST_LOG` is unset.
    pub level: String,
}

impl LoggerConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            level: profiled_env_or(p, "LOG_LEVEL", "info"),
        }
    }
}
