//! Server configuration.

use std::net::SocketAddr;

use serde::Deserialize;

/// Default MQTT listener port.
pub const DEFAULT_PORT: u16 = 1883;

/// Default keep-alive tick interval in milliseconds.
pub const DEFAULT_TICK_MS: u64 = 1000;

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// TCP bind address.
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,
    /// Interval between keep-alive ticks in milliseconds.
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
}

fn default_bind() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT))
}

fn default_tick_ms() -> u64 {
    DEFAULT_TICK_MS
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            tick_ms: DEFAULT_TICK_MS,
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.tick_ms == 0 {
            return Err("tick_ms must be at least 1".into());
        }
        Ok(())
    }
}
