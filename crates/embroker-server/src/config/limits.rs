//! Limits configuration.

use serde::Deserialize;

/// Default maximum packet size, also the per-connection receive buffer.
pub const DEFAULT_MAX_PACKET_SIZE: u32 = 2048;

/// Default maximum topic length in bytes.
pub const DEFAULT_MAX_TOPIC_LENGTH: usize = embroker_core::topic::DEFAULT_MAX_TOPIC_LENGTH;

/// Default number of concurrent sessions.
pub const DEFAULT_MAX_SESSIONS: usize = 10;

/// Default number of subscriptions across all sessions.
pub const DEFAULT_MAX_SUBSCRIPTIONS: usize = 30;

/// Default number of retained topics.
pub const DEFAULT_MAX_RETAINED_TOPICS: usize = 30;

/// Default number of filters per outbound SUBSCRIBE/UNSUBSCRIBE.
pub const DEFAULT_MAX_TOPICS_IN_SUBSCRIBE: usize =
    embroker_core::builder::DEFAULT_MAX_TOPICS_IN_SUBSCRIBE;

/// Default number of filters granted per inbound SUBSCRIBE.
pub const DEFAULT_MAX_SUBS_PER_REQ: usize = 16;

/// Default max inflight QoS 1/2 deliveries per session (broker -> client).
pub const DEFAULT_MAX_INFLIGHT: u16 = 32;

/// Limits configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum MQTT packet size in bytes; larger frames close the connection.
    #[serde(default = "default_max_packet_size")]
    pub max_packet_size: u32,

    /// Maximum topic name or filter length in bytes.
    #[serde(default = "default_max_topic_length")]
    pub max_topic_length: usize,

    /// Size of the session table.
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,

    /// Subscription registry capacity.
    #[serde(default = "default_max_subscriptions")]
    pub max_subscriptions: usize,

    /// Retained store capacity.
    #[serde(default = "default_max_retained_topics")]
    pub max_retained_topics: usize,

    /// Filters per SUBSCRIBE/UNSUBSCRIBE the builder will encode.
    #[serde(default = "default_max_topics_in_subscribe")]
    pub max_topics_in_subscribe: usize,

    /// Filters per inbound SUBSCRIBE that may be granted.
    /// The rest are answered with a failure code.
    #[serde(default = "default_max_subs_per_req")]
    pub max_subs_per_req: usize,

    /// Maximum unacknowledged QoS 1/2 deliveries per session (broker -> client).
    /// Deliveries past the limit go out at QoS 0.
    #[serde(default = "default_max_inflight")]
    pub max_inflight: u16,
}

fn default_max_packet_size() -> u32 {
    DEFAULT_MAX_PACKET_SIZE
}
fn default_max_topic_length() -> usize {
    DEFAULT_MAX_TOPIC_LENGTH
}
fn default_max_sessions() -> usize {
    DEFAULT_MAX_SESSIONS
}
fn default_max_subscriptions() -> usize {
    DEFAULT_MAX_SUBSCRIPTIONS
}
fn default_max_retained_topics() -> usize {
    DEFAULT_MAX_RETAINED_TOPICS
}
fn default_max_topics_in_subscribe() -> usize {
    DEFAULT_MAX_TOPICS_IN_SUBSCRIBE
}
fn default_max_subs_per_req() -> usize {
    DEFAULT_MAX_SUBS_PER_REQ
}
fn default_max_inflight() -> u16 {
    DEFAULT_MAX_INFLIGHT
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_packet_size: DEFAULT_MAX_PACKET_SIZE,
            max_topic_length: DEFAULT_MAX_TOPIC_LENGTH,
            max_sessions: DEFAULT_MAX_SESSIONS,
            max_subscriptions: DEFAULT_MAX_SUBSCRIPTIONS,
            max_retained_topics: DEFAULT_MAX_RETAINED_TOPICS,
            max_topics_in_subscribe: DEFAULT_MAX_TOPICS_IN_SUBSCRIBE,
            max_subs_per_req: DEFAULT_MAX_SUBS_PER_REQ,
            max_inflight: DEFAULT_MAX_INFLIGHT,
        }
    }
}

impl LimitsConfig {
    /// Validate the limits configuration.
    pub fn validate(&self) -> Result<(), String> {
        // MQTT protocol maximum is 268,435,455 bytes of body
        if self.max_packet_size > 268_435_455 {
            return Err("max_packet_size cannot exceed MQTT protocol maximum (268,435,455)".into());
        }
        // Smallest legal packet is PINGREQ
        if self.max_packet_size < 2 {
            return Err("max_packet_size must be at least 2".into());
        }

        if self.max_topic_length == 0 || self.max_topic_length > 65535 {
            return Err("max_topic_length must be between 1 and 65535".into());
        }

        if self.max_sessions == 0 {
            return Err("max_sessions must be at least 1".into());
        }
        if u32::try_from(self.max_sessions).is_err() {
            return Err("max_sessions is too large".into());
        }

        if self.max_topics_in_subscribe == 0 {
            return Err("max_topics_in_subscribe must be at least 1".into());
        }
        if self.max_subs_per_req == 0 {
            return Err("max_subs_per_req must be at least 1".into());
        }

        // Note: max_subscriptions = 0 or max_retained_topics = 0 disables the feature
        // Note: max_inflight = 0 means unbounded (uses 65535)

        Ok(())
    }
}
