//! CONNECT packet handling.
//!
//! Checks the protocol level, client identifier and will, and builds the
//! CONNACK that answers them.

use std::net::SocketAddr;

use embroker_core::property::{self, Property, PropertyId, PropertyValue};
use embroker_core::{Connack, ConnackReasonCode, Connect, ProtocolVersion, Topic};

use crate::session::{Message, SessionLimits};

/// A CONNECT that passed validation, normalised for the session.
#[derive(Debug, Clone)]
pub struct Accepted {
    pub version: ProtocolVersion,
    pub client_id: String,
    /// The client sent an empty identifier and got one from us.
    pub assigned_client_id: bool,
    pub clean_session: bool,
    pub keep_alive: u16,
    /// The client asked for keep-alive 0 and got the default instead.
    pub keep_alive_overridden: bool,
    pub session_expiry: u32,
    pub will: Option<Message>,
}

/// Validate a CONNECT.
///
/// MQTT-3.1.3-7: a zero-length client id requires a clean session. Will
/// topics must be concrete and outside the `$` namespace.
pub fn validate_connect(
    connect: &Connect,
    peer: SocketAddr,
    limits: &SessionLimits,
) -> Result<Accepted, ConnackReasonCode> {
    let version = connect
        .version()
        .ok_or(ConnackReasonCode::UnsupportedProtocolVersion)?;

    if connect.client_id.len() > limits.max_client_id_length {
        return Err(ConnackReasonCode::ClientIdentifierNotValid);
    }
    if connect.client_id.is_empty() && !connect.clean_session {
        return Err(ConnackReasonCode::ClientIdentifierNotValid);
    }

    let will = match &connect.will {
        Some(will) => {
            let topic = Topic::with_max_length(&will.topic, limits.max_topic_length)
                .map_err(|_| ConnackReasonCode::TopicNameInvalid)?;
            if topic.has_wildcards() || topic.is_system() {
                return Err(ConnackReasonCode::TopicNameInvalid);
            }
            Some(Message {
                topic,
                payload: will.payload.clone(),
                qos: will.qos,
                retain: will.retain,
            })
        }
        None => None,
    };

    let (client_id, assigned_client_id) = if connect.client_id.is_empty() {
        (format!("auto-{}", peer), true)
    } else {
        (connect.client_id.clone(), false)
    };

    let keep_alive_overridden = connect.keep_alive == 0;
    let keep_alive = if keep_alive_overridden {
        limits.default_keep_alive
    } else {
        connect.keep_alive
    };

    let session_expiry = property::find(&connect.properties, PropertyId::SessionExpiryInterval)
        .and_then(|value| value.as_u32())
        .unwrap_or(0);

    Ok(Accepted {
        version,
        client_id,
        assigned_client_id,
        clean_session: connect.clean_session,
        keep_alive,
        keep_alive_overridden,
        session_expiry,
        will,
    })
}

/// CONNACK for an accepted connection.
///
/// Sessions are never resumed, so session-present is always 0. MQTT v5
/// clients are told about a server-assigned id, a substituted keep-alive
/// and the packet size limit.
pub fn build_connack(accepted: &Accepted, limits: &SessionLimits) -> Connack {
    let mut connack = Connack::new(false, ConnackReasonCode::Success);
    if !accepted.version.is_v5() {
        return connack;
    }

    if accepted.assigned_client_id {
        connack.properties.extend(Property::new(
            PropertyId::AssignedClientIdentifier,
            PropertyValue::Utf8String(accepted.client_id.clone()),
        ));
    }
    if accepted.keep_alive_overridden {
        connack.properties.extend(Property::new(
            PropertyId::ServerKeepAlive,
            PropertyValue::TwoByteInteger(accepted.keep_alive),
        ));
    }
    connack.properties.extend(Property::new(
        PropertyId::MaximumPacketSize,
        PropertyValue::FourByteInteger(limits.max_packet_size),
    ));
    connack
}

/// CONNACK refusing a connection.
#[inline]
pub fn build_rejection_connack(code: ConnackReasonCode) -> Connack {
    Connack::new(false, code)
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use embroker_core::{QoS, Will};

    use super::*;

    fn peer() -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], 50000))
    }

    fn will(topic: &str) -> Will {
        Will {
            topic: topic.into(),
            payload: Bytes::from_static(b"offline"),
            qos: QoS::AtLeastOnce,
            retain: true,
            properties: Vec::new(),
        }
    }

    #[test]
    fn test_accepts_plain_connect() {
        let connect = Connect::new("sensor", ProtocolVersion::V3_1_1, 30);
        let accepted = validate_connect(&connect, peer(), &SessionLimits::default()).unwrap();
        assert_eq!(accepted.client_id, "sensor");
        assert_eq!(accepted.keep_alive, 30);
        assert!(!accepted.assigned_client_id);
        assert!(accepted.will.is_none());
    }

    #[test]
    fn test_unknown_protocol_level() {
        let mut connect = Connect::new("sensor", ProtocolVersion::V3_1_1, 30);
        connect.protocol_version = 7;
        assert_eq!(
            validate_connect(&connect, peer(), &SessionLimits::default()).unwrap_err(),
            ConnackReasonCode::UnsupportedProtocolVersion
        );
    }

    #[test]
    fn test_client_id_rules() {
        let limits = SessionLimits::default();
        let long = Connect::new("x".repeat(24), ProtocolVersion::V3_1_1, 30);
        assert_eq!(
            validate_connect(&long, peer(), &limits).unwrap_err(),
            ConnackReasonCode::ClientIdentifierNotValid
        );

        let mut empty = Connect::new("", ProtocolVersion::V3_1_1, 30);
        empty.clean_session = false;
        assert_eq!(
            validate_connect(&empty, peer(), &limits).unwrap_err(),
            ConnackReasonCode::ClientIdentifierNotValid
        );

        empty.clean_session = true;
        let accepted = validate_connect(&empty, peer(), &limits).unwrap();
        assert!(accepted.assigned_client_id);
        assert_eq!(accepted.client_id, "auto-127.0.0.1:50000");
    }

    #[test]
    fn test_will_topic_rules() {
        let limits = SessionLimits::default();
        for topic in ["house/+/status", "$SYS/will", "", "a//b"] {
            let mut connect = Connect::new("c", ProtocolVersion::V3_1_1, 30);
            connect.will = Some(will(topic));
            assert_eq!(
                validate_connect(&connect, peer(), &limits).unwrap_err(),
                ConnackReasonCode::TopicNameInvalid,
                "{topic:?}"
            );
        }

        let mut connect = Connect::new("c", ProtocolVersion::V3_1_1, 30);
        connect.will = Some(will("house/c/status"));
        let accepted = validate_connect(&connect, peer(), &limits).unwrap();
        let message = accepted.will.unwrap();
        assert_eq!(message.topic.as_str(), "house/c/status");
        assert!(message.retain);
    }

    #[test]
    fn test_zero_keep_alive_uses_default() {
        let limits = SessionLimits::default();
        let connect = Connect::new("c", ProtocolVersion::V5, 0);
        let accepted = validate_connect(&connect, peer(), &limits).unwrap();
        assert_eq!(accepted.keep_alive, limits.default_keep_alive);

        let connack = build_connack(&accepted, &limits);
        assert_eq!(
            property::find(&connack.properties, PropertyId::ServerKeepAlive),
            Some(&PropertyValue::TwoByteInteger(limits.default_keep_alive))
        );
    }

    #[test]
    fn test_session_expiry_from_properties() {
        let mut connect = Connect::new("c", ProtocolVersion::V5, 30);
        connect.properties.extend(Property::new(
            PropertyId::SessionExpiryInterval,
            PropertyValue::FourByteInteger(300),
        ));
        let accepted = validate_connect(&connect, peer(), &SessionLimits::default()).unwrap();
        assert_eq!(accepted.session_expiry, 300);
    }

    #[test]
    fn test_v3_connack_has_no_properties() {
        let limits = SessionLimits::default();
        let connect = Connect::new("", ProtocolVersion::V3_1_1, 0);
        let accepted = validate_connect(&connect, peer(), &limits).unwrap();
        let connack = build_connack(&accepted, &limits);
        assert!(connack.properties.is_empty());
        assert!(!connack.session_present);
    }
}
