//! PUBLISH packet handling.

use embroker_core::packet::reason_code;
use embroker_core::{Publish, QoS, Topic};

use crate::session::Message;

/// Why an inbound PUBLISH is refused. All of these close the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishValidationError {
    /// Topic fails validation or the length limit
    TopicInvalid,
    /// Topic names must not contain wildcards (MQTT-3.3.2-2)
    TopicContainsWildcard,
    /// QoS > 0 without a packet identifier
    MissingPacketId,
}

impl PublishValidationError {
    /// MQTT v5 DISCONNECT reason code for this error.
    #[inline]
    pub fn to_reason_code_v5(self) -> u8 {
        match self {
            Self::TopicInvalid | Self::TopicContainsWildcard => reason_code::TOPIC_NAME_INVALID,
            Self::MissingPacketId => reason_code::PROTOCOL_ERROR,
        }
    }
}

/// Acknowledgment owed to the publishing client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublisherAck {
    None,
    Puback(u16),
    Pubrec(u16),
}

/// Validate a PUBLISH and turn it into a routable message.
#[inline]
pub fn validate_publish(
    publish: &Publish,
    max_topic_length: usize,
) -> Result<(Message, PublisherAck), PublishValidationError> {
    let topic = Topic::with_max_length(&publish.topic, max_topic_length)
        .map_err(|_| PublishValidationError::TopicInvalid)?;
    if topic.has_wildcards() {
        return Err(PublishValidationError::TopicContainsWildcard);
    }

    let ack = match (publish.qos, publish.packet_id) {
        (QoS::AtMostOnce, _) => PublisherAck::None,
        (QoS::AtLeastOnce, Some(packet_id)) => PublisherAck::Puback(packet_id),
        (QoS::ExactlyOnce, Some(packet_id)) => PublisherAck::Pubrec(packet_id),
        (_, None) => return Err(PublishValidationError::MissingPacketId),
    };

    let message = Message {
        topic,
        payload: publish.payload.clone(),
        qos: publish.qos,
        retain: publish.retain,
    };
    Ok((message, ack))
}
