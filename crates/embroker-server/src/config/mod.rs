//! Broker configuration and limits.
//!
//! Supports configuration from:
//! - TOML file (default: `embroker.toml`)
//! - Environment variables with `EMBROKER__` prefix (double underscore for nesting)
//! - In-file variable substitution: `${VAR}` or `${VAR:-default}`
//!
//! Environment variable examples:
//! - `EMBROKER__SERVER__BIND=0.0.0.0:1884`
//! - `EMBROKER__LIMITS__MAX_SESSIONS=4`
//!
//! In-file substitution examples:
//! ```toml
//! [server]
//! bind = "${MQTT_HOST:-0.0.0.0}:${MQTT_PORT:-1883}"
//! ```

mod limits;
mod log;
mod server;
mod session;

use std::path::Path;

use config::{Environment, File, FileFormat};
use regex::Regex;
use serde::Deserialize;

pub use limits::{
    LimitsConfig, DEFAULT_MAX_INFLIGHT, DEFAULT_MAX_PACKET_SIZE, DEFAULT_MAX_RETAINED_TOPICS,
    DEFAULT_MAX_SESSIONS, DEFAULT_MAX_SUBSCRIPTIONS, DEFAULT_MAX_SUBS_PER_REQ,
    DEFAULT_MAX_TOPICS_IN_SUBSCRIBE, DEFAULT_MAX_TOPIC_LENGTH,
};
pub use log::LogConfig;
pub use server::{ServerConfig, DEFAULT_PORT, DEFAULT_TICK_MS};
pub use session::{SessionConfig, DEFAULT_KEEP_ALIVE, DEFAULT_MAX_CLIENT_ID_LENGTH};

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "embroker.toml";

/// Substitute environment variables in a string.
/// Supports `${VAR}` and `${VAR:-default}` syntax.
fn substitute_env_vars(content: &str) -> Result<String, ConfigError> {
    let re = Regex::new(r"\$\{([^}:]+)(?::-([^}]*))?\}")
        .map_err(|e| ConfigError::Validation(format!("substitution pattern: {}", e)))?;
    Ok(re
        .replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            let default = caps.get(2).map(|m| m.as_str()).unwrap_or("");
            std::env::var(var_name).unwrap_or_else(|_| default.to_string())
        })
        .to_string())
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging configuration.
    pub log: LogConfig,
    /// Server configuration.
    pub server: ServerConfig,
    /// Limits configuration.
    pub limits: LimitsConfig,
    /// Session configuration.
    pub session: SessionConfig,
}

/// Configuration error.
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file.
    Io(std::io::Error),
    /// Config parsing/loading error.
    Config(config::ConfigError),
    /// Invalid configuration value.
    Validation(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Config(e) => write!(f, "Config error: {}", e),
            ConfigError::Validation(msg) => write!(f, "Validation error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<config::ConfigError> for ConfigError {
    fn from(e: config::ConfigError) -> Self {
        ConfigError::Config(e)
    }
}

impl Config {
    /// Load configuration from a TOML file with environment variable overrides.
    ///
    /// A missing file is not an error; defaults and environment apply.
    /// Overrides use the `EMBROKER__` prefix with double underscores for nesting:
    ///    - `EMBROKER__SERVER__BIND=0.0.0.0:1884`
    ///    - `EMBROKER__SESSION__DEFAULT_KEEP_ALIVE=30`
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder()
            .set_default("log.level", "info")?
            .set_default("server.bind", format!("0.0.0.0:{}", DEFAULT_PORT))?
            .set_default("server.tick_ms", DEFAULT_TICK_MS as i64)?
            .set_default("limits.max_packet_size", DEFAULT_MAX_PACKET_SIZE as i64)?
            .set_default("limits.max_topic_length", DEFAULT_MAX_TOPIC_LENGTH as i64)?
            .set_default("limits.max_sessions", DEFAULT_MAX_SESSIONS as i64)?
            .set_default("limits.max_subscriptions", DEFAULT_MAX_SUBSCRIPTIONS as i64)?
            .set_default(
                "limits.max_retained_topics",
                DEFAULT_MAX_RETAINED_TOPICS as i64,
            )?
            .set_default(
                "limits.max_topics_in_subscribe",
                DEFAULT_MAX_TOPICS_IN_SUBSCRIBE as i64,
            )?
            .set_default("limits.max_subs_per_req", DEFAULT_MAX_SUBS_PER_REQ as i64)?
            .set_default("limits.max_inflight", DEFAULT_MAX_INFLIGHT as i64)?
            .set_default("session.default_keep_alive", DEFAULT_KEEP_ALIVE as i64)?
            .set_default(
                "session.max_client_id_length",
                DEFAULT_MAX_CLIENT_ID_LENGTH as i64,
            )?;

        let path = path.as_ref();
        if path.is_file() {
            let content = std::fs::read_to_string(path)?;
            let substituted = substitute_env_vars(&content)?;
            builder = builder.add_source(File::from_str(&substituted, FileFormat::Toml));
        }

        let cfg = builder
            .add_source(
                Environment::with_prefix("EMBROKER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = cfg.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let substituted = substitute_env_vars(content)?;
        let config: Config = toml::from_str(&substituted)
            .map_err(|e| ConfigError::Validation(format!("TOML parse error: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.log.validate().map_err(ConfigError::Validation)?;
        self.server.validate().map_err(ConfigError::Validation)?;
        self.limits.validate().map_err(ConfigError::Validation)?;
        self.session.validate().map_err(ConfigError::Validation)?;
        Ok(())
    }
}
