//! Configuration loading: TOML file with environment variable overrides.
//!
//! Looks for `smarthub.toml` in the working directory. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values.

use serde::Deserialize;
use smarthub_adapter_mqtt::MqttConfig;
use smarthub_app::retry::RetryPolicy;
use smarthub_domain::schema::{SchemaConfig, SchemaConfigError};

/// Daemon configuration, one table per concern.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server settings.
    pub server: ServerConfig,
    /// Database settings.
    pub database: DatabaseConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Broker connection and topic namespace.
    pub mqtt: MqttConfig,
    /// Parameter bounds of the device schemas.
    pub schema: SchemaConfig,
    /// Backoff used while the backing store is unavailable at startup.
    pub retry: RetryPolicy,
}

/// Where the REST API listens.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface address.
    pub host: String,
    /// TCP port.
    pub port: u16,
}

/// Device and usage store location.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// sqlx `SQLite` URL, e.g. `sqlite:smarthub.db?mode=rwc`.
    pub url: String,
}

/// Tracing output.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

/// Source of environment variables, swapped out in tests.
trait Env {
    fn var(&self, key: &str) -> Option<String>;
}

struct ProcessEnv;

impl Env for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl Config {
    /// Load configuration from `smarthub.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// resulting configuration is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("smarthub.toml")?;
        config.apply_env_overrides(&ProcessEnv);
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self, env: &impl Env) {
        if let Some(val) = env.var("SMARTHUB_HOST") {
            self.server.host = val;
        }
        if let Some(port) = env.var("SMARTHUB_PORT").and_then(|val| val.parse().ok()) {
            self.server.port = port;
        }
        if let Some(val) = env.var("SMARTHUB_BIND")
            && let Some((host, port)) = val.rsplit_once(':')
        {
            self.server.host = host.to_string();
            if let Ok(port) = port.parse() {
                self.server.port = port;
            }
        }
        if let Some(val) = env.var("SMARTHUB_DATABASE_URL") {
            self.database.url = val;
        }
        if let Some(val) = env.var("SMARTHUB_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = env.var("RUST_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = env.var("SMARTHUB_BROKER_HOST") {
            self.mqtt.broker_host = val;
        }
        if let Some(port) = env.var("SMARTHUB_BROKER_PORT").and_then(|val| val.parse().ok()) {
            self.mqtt.broker_port = port;
        }
        if let Some(val) = env.var("SMARTHUB_MQTT_TOPIC") {
            self.mqtt.base_topic = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Validation("port must be non-zero".to_string()));
        }
        if self.mqtt.broker_port == 0 {
            return Err(ConfigError::Validation(
                "broker port must be non-zero".to_string(),
            ));
        }
        let topic = self.mqtt.base_topic.as_str();
        if topic.is_empty() || topic.ends_with('/') || topic.contains(['+', '#']) {
            return Err(ConfigError::Validation(format!(
                "mqtt topic must be a non-empty topic name without wildcards, got '{topic}'"
            )));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Validation(
                "retry attempts must be non-zero".to_string(),
            ));
        }
        self.schema.validate()?;
        Ok(())
    }

    /// Return the `host:port` bind address.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Return the database URL in `sqlx`-compatible format.
    #[must_use]
    pub fn database_url(&self) -> &str {
        &self.database.url
    }

    /// Per-process bus identity, derived from `HOSTNAME` when set.
    #[must_use]
    pub fn sender_id(&self) -> String {
        self.mqtt.sender_id(ProcessEnv.var("HOSTNAME").as_deref())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5200,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:smarthub.db?mode=rwc".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "smarthubd=info,smarthub=info,tower_http=debug".to_string(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
    /// Unusable `[schema]` bounds.
    #[error("invalid schema configuration")]
    Schema(#[from] SchemaConfigError),
}
