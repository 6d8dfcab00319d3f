//! Session configuration.

use serde::Deserialize;

/// Default keep alive in seconds.
pub const DEFAULT_KEEP_ALIVE: u16 = 10;

/// Default maximum client identifier length in bytes.
pub const DEFAULT_MAX_CLIENT_ID_LENGTH: usize = 23;

/// Session configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Default keep alive in seconds (used when client sends 0).
    #[serde(default = "default_keep_alive")]
    pub default_keep_alive: u16,

    /// Longest client identifier accepted in CONNECT.
    #[serde(default = "default_max_client_id_length")]
    pub max_client_id_length: usize,
}

fn default_keep_alive() -> u16 {
    DEFAULT_KEEP_ALIVE
}
fn default_max_client_id_length() -> usize {
    DEFAULT_MAX_CLIENT_ID_LENGTH
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_keep_alive: DEFAULT_KEEP_ALIVE,
            max_client_id_length: DEFAULT_MAX_CLIENT_ID_LENGTH,
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.default_keep_alive == 0 {
            return Err("default_keep_alive must be at least 1".into());
        }
        if self.max_client_id_length == 0 || self.max_client_id_length > 65535 {
            return Err("max_client_id_length must be between 1 and 65535".into());
        }
        Ok(())
    }
}
