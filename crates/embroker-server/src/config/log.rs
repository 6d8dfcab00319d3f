//! Logging configuration.

use std::str::FromStr;

use ::log::LevelFilter;
use serde::Deserialize;

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default filter for env_logger: off, error, warn, info, debug, trace.
    /// `RUST_LOG` takes precedence when set.
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl LogConfig {
    pub fn level_filter(&self) -> Result<LevelFilter, String> {
        LevelFilter::from_str(&self.level).map_err(|_| format!("unknown log level: {}", self.level))
    }

    pub fn validate(&self) -> Result<(), String> {
        self.level_filter().map(|_| ())
    }
}
