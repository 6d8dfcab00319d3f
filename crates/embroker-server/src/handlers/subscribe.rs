//! SUBSCRIBE and UNSUBSCRIBE packet handling.
//!
//! The session validates filters; the broker registers them and composes the
//! acknowledgment from the per-entry results.

use embroker_core::packet::reason_code;
use embroker_core::{QoS, Subscribe, Topic};

use crate::session::SessionLimits;

/// Why one SUBSCRIBE entry was not granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionError {
    /// Filter fails validation or the length limit
    TopicInvalid,
    /// Subscription registry is full
    QuotaExceeded,
    /// Entry beyond the per-request limit
    TooManyFilters,
}

impl SubscriptionError {
    /// Get the MQTT v5 reason code for this error.
    #[inline]
    pub fn to_reason_code_v5(self) -> u8 {
        match self {
            Self::TopicInvalid => reason_code::TOPIC_FILTER_INVALID,
            Self::QuotaExceeded => reason_code::QUOTA_EXCEEDED,
            Self::TooManyFilters => reason_code::UNSPECIFIED_ERROR,
        }
    }

    /// Get the return code for this error (0x80 for v3.1.1).
    #[inline]
    pub fn to_return_code(self, is_v5: bool) -> u8 {
        if is_v5 {
            self.to_reason_code_v5()
        } else {
            reason_code::SUBACK_FAILURE
        }
    }
}

/// One validated SUBSCRIBE entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribeRequest {
    pub filter: Result<Topic, SubscriptionError>,
    pub qos: QoS,
}

/// Validate every entry of a SUBSCRIBE.
///
/// Entries past `max_subs_per_req` are refused without looking at them.
pub fn subscribe_requests(subscribe: &Subscribe, limits: &SessionLimits) -> Vec<SubscribeRequest> {
    subscribe
        .topics
        .iter()
        .enumerate()
        .map(|(index, (filter, options))| {
            let filter = if index >= limits.max_subs_per_req {
                Err(SubscriptionError::TooManyFilters)
            } else {
                Topic::with_max_length(filter, limits.max_topic_length)
                    .map_err(|_| SubscriptionError::TopicInvalid)
            };
            SubscribeRequest {
                filter,
                qos: options.qos,
            }
        })
        .collect()
}

/// SUBACK code for a granted subscription.
#[inline]
pub fn granted_code(qos: QoS) -> u8 {
    qos as u8
}

/// UNSUBACK reason code for one filter (MQTT v5).
#[inline]
pub fn unsubscribe_code(removed: bool) -> u8 {
    if removed {
        reason_code::SUCCESS
    } else {
        reason_code::NO_SUBSCRIPTION_EXISTED
    }
}
