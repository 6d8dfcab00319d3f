//! MQTT packet types for MQTT 3.1.1 and MQTT 5.0.

use bytes::Bytes;

use crate::error::ParseError;
use crate::property::Property;

/// MQTT Control Packet Types (4 bits).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PacketType {
    Connect = 1,
    Connack = 2,
    Publish = 3,
    Puback = 4,
    Pubrec = 5,
    Pubrel = 6,
    Pubcomp = 7,
    Subscribe = 8,
    Suback = 9,
    Unsubscribe = 10,
    Unsuback = 11,
    Pingreq = 12,
    Pingresp = 13,
    Disconnect = 14,
}

impl TryFrom<u8> for PacketType {
    type Error = ParseError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(PacketType::Connect),
            2 => Ok(PacketType::Connack),
            3 => Ok(PacketType::Publish),
            4 => Ok(PacketType::Puback),
            5 => Ok(PacketType::Pubrec),
            6 => Ok(PacketType::Pubrel),
            7 => Ok(PacketType::Pubcomp),
            8 => Ok(PacketType::Subscribe),
            9 => Ok(PacketType::Suback),
            10 => Ok(PacketType::Unsubscribe),
            11 => Ok(PacketType::Unsuback),
            12 => Ok(PacketType::Pingreq),
            13 => Ok(PacketType::Pingresp),
            14 => Ok(PacketType::Disconnect),
            _ => Err(ParseError::InvalidPacketType),
        }
    }
}

/// Quality of Service levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(u8)]
#[allow(clippy::enum_variant_names)] // MQTT names
pub enum QoS {
    #[default]
    AtMostOnce = 0,
    AtLeastOnce = 1,
    ExactlyOnce = 2,
}

impl TryFrom<u8> for QoS {
    type Error = ParseError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(QoS::AtMostOnce),
            1 => Ok(QoS::AtLeastOnce),
            2 => Ok(QoS::ExactlyOnce),
            _ => Err(ParseError::InvalidMessageStructure),
        }
    }
}

/// Protocol level carried in CONNECT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum ProtocolVersion {
    /// MQTT 3.1 ("MQIsdp")
    V3_1 = 3,
    #[default]
    V3_1_1 = 4,
    V5 = 5,
}

impl ProtocolVersion {
    /// Look up a CONNECT protocol level.
    pub fn from_level(level: u8) -> Option<Self> {
        match level {
            3 => Some(ProtocolVersion::V3_1),
            4 => Some(ProtocolVersion::V3_1_1),
            5 => Some(ProtocolVersion::V5),
            _ => None,
        }
    }

    pub fn is_v5(self) -> bool {
        self == ProtocolVersion::V5
    }

    /// Protocol name that goes with this level.
    pub fn protocol_name(self) -> &'static str {
        match self {
            ProtocolVersion::V3_1 => "MQIsdp",
            _ => "MQTT",
        }
    }
}

/// MQTT 5 CONNACK reason codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnackReasonCode {
    Success = 0x00,
    UnspecifiedError = 0x80,
    MalformedPacket = 0x81,
    ProtocolError = 0x82,
    ImplementationSpecificError = 0x83,
    UnsupportedProtocolVersion = 0x84,
    ClientIdentifierNotValid = 0x85,
    BadUserNameOrPassword = 0x86,
    NotAuthorized = 0x87,
    ServerUnavailable = 0x88,
    ServerBusy = 0x89,
    Banned = 0x8A,
    BadAuthenticationMethod = 0x8C,
    TopicNameInvalid = 0x90,
    PacketTooLarge = 0x95,
    QuotaExceeded = 0x97,
    PayloadFormatInvalid = 0x99,
    RetainNotSupported = 0x9A,
    QoSNotSupported = 0x9B,
    UseAnotherServer = 0x9C,
    ServerMoved = 0x9D,
    ConnectionRateExceeded = 0x9F,
}

impl TryFrom<u8> for ConnackReasonCode {
    type Error = ParseError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        use ConnackReasonCode::*;
        Ok(match value {
            0x00 => Success,
            0x80 => UnspecifiedError,
            0x81 => MalformedPacket,
            0x82 => ProtocolError,
            0x83 => ImplementationSpecificError,
            0x84 => UnsupportedProtocolVersion,
            0x85 => ClientIdentifierNotValid,
            0x86 => BadUserNameOrPassword,
            0x87 => NotAuthorized,
            0x88 => ServerUnavailable,
            0x89 => ServerBusy,
            0x8A => Banned,
            0x8C => BadAuthenticationMethod,
            0x90 => TopicNameInvalid,
            0x95 => PacketTooLarge,
            0x97 => QuotaExceeded,
            0x99 => PayloadFormatInvalid,
            0x9A => RetainNotSupported,
            0x9B => QoSNotSupported,
            0x9C => UseAnotherServer,
            0x9D => ServerMoved,
            0x9F => ConnectionRateExceeded,
            _ => return Err(ParseError::InvalidReturnCode),
        })
    }
}

impl ConnackReasonCode {
    /// Closest MQTT 3.1.1 CONNACK return code.
    ///
    /// The mapping only runs outbound. `decode_connack` reads MQTT 5 reason
    /// codes, so a 3.1.1 refusal such as return code 2 fails to decode with
    /// `InvalidReturnCode`.
    pub fn to_v3_return_code(self) -> u8 {
        use ConnackReasonCode::*;
        match self {
            Success => 0,
            UnsupportedProtocolVersion => 1,
            ClientIdentifierNotValid => 2,
            BadUserNameOrPassword => 4,
            NotAuthorized | Banned | BadAuthenticationMethod => 5,
            _ => 3,
        }
    }
}

/// MQTT 5 reason codes used outside CONNACK.
/// Some codes share a numeric value with different meanings per packet.
pub mod reason_code {
    pub const SUCCESS: u8 = 0x00;
    pub const NORMAL_DISCONNECTION: u8 = 0x00;
    pub const GRANTED_QOS_0: u8 = 0x00;
    pub const GRANTED_QOS_1: u8 = 0x01;
    pub const GRANTED_QOS_2: u8 = 0x02;
    pub const DISCONNECT_WITH_WILL: u8 = 0x04;
    pub const NO_SUBSCRIPTION_EXISTED: u8 = 0x11;
    pub const UNSPECIFIED_ERROR: u8 = 0x80;
    pub const MALFORMED_PACKET: u8 = 0x81;
    pub const PROTOCOL_ERROR: u8 = 0x82;
    pub const KEEP_ALIVE_TIMEOUT: u8 = 0x8D;
    pub const SESSION_TAKEN_OVER: u8 = 0x8E;
    pub const TOPIC_FILTER_INVALID: u8 = 0x8F;
    pub const TOPIC_NAME_INVALID: u8 = 0x90;
    pub const PACKET_IDENTIFIER_NOT_FOUND: u8 = 0x92;
    pub const PACKET_TOO_LARGE: u8 = 0x95;
    pub const QUOTA_EXCEEDED: u8 = 0x97;

    /// SUBACK failure code for MQTT 3.1.1.
    pub const SUBACK_FAILURE: u8 = 0x80;
}

/// Per-filter SUBSCRIBE options.
///
/// MQTT 3.1.1 only uses the QoS bits; the rest must be zero there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SubscriptionOptions {
    pub qos: QoS,
    pub no_local: bool,
    pub retain_as_published: bool,
    pub retain_handling: u8,
}

impl SubscriptionOptions {
    pub fn new(qos: QoS) -> Self {
        Self {
            qos,
            ..Default::default()
        }
    }

    /// Parse from the SUBSCRIBE options byte.
    pub fn from_byte(byte: u8, version: ProtocolVersion) -> Result<Self, ParseError> {
        // MQTT-3.8.3-4 (v3.1.1) / MQTT-3.8.3-5 (v5): reserved bits must be zero
        let reserved = if version.is_v5() { 0xC0 } else { 0xFC };
        if byte & reserved != 0 {
            return Err(ParseError::InvalidMessageStructure);
        }
        let retain_handling = (byte >> 4) & 0x03;
        if retain_handling == 3 {
            return Err(ParseError::InvalidMessageStructure);
        }
        Ok(Self {
            qos: QoS::try_from(byte & 0x03)?,
            no_local: byte & 0x04 != 0,
            retain_as_published: byte & 0x08 != 0,
            retain_handling,
        })
    }

    pub fn to_byte(self, version: ProtocolVersion) -> u8 {
        let mut byte = self.qos as u8;
        if version.is_v5() {
            if self.no_local {
                byte |= 0x04;
            }
            if self.retain_as_published {
                byte |= 0x08;
            }
            byte |= (self.retain_handling & 0x03) << 4;
        }
        byte
    }
}

/// MQTT Packets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    Connect(Connect),
    Connack(Connack),
    Publish(Publish),
    Puback { packet_id: u16 },
    Pubrec { packet_id: u16 },
    Pubrel { packet_id: u16 },
    Pubcomp { packet_id: u16 },
    Subscribe(Subscribe),
    Suback(Suback),
    Unsubscribe(Unsubscribe),
    Unsuback(Unsuback),
    Pingreq,
    Pingresp,
    Disconnect(Disconnect),
}

impl Packet {
    pub fn packet_type(&self) -> PacketType {
        match self {
            Packet::Connect(_) => PacketType::Connect,
            Packet::Connack(_) => PacketType::Connack,
            Packet::Publish(_) => PacketType::Publish,
            Packet::Puback { .. } => PacketType::Puback,
            Packet::Pubrec { .. } => PacketType::Pubrec,
            Packet::Pubrel { .. } => PacketType::Pubrel,
            Packet::Pubcomp { .. } => PacketType::Pubcomp,
            Packet::Subscribe(_) => PacketType::Subscribe,
            Packet::Suback(_) => PacketType::Suback,
            Packet::Unsubscribe(_) => PacketType::Unsubscribe,
            Packet::Unsuback(_) => PacketType::Unsuback,
            Packet::Pingreq => PacketType::Pingreq,
            Packet::Pingresp => PacketType::Pingresp,
            Packet::Disconnect(_) => PacketType::Disconnect,
        }
    }
}

/// CONNECT packet data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connect {
    pub protocol_name: String,
    /// Raw protocol level; levels this crate does not know are kept so the
    /// receiver can refuse them with the right reason code.
    pub protocol_version: u8,
    pub clean_session: bool,
    pub keep_alive: u16,
    pub client_id: String,
    pub will: Option<Will>,
    pub username: Option<String>,
    pub password: Option<Bytes>,
    /// MQTT v5 properties (empty for v3.1.1)
    pub properties: Vec<Property>,
}

impl Connect {
    /// A clean-session CONNECT with no will or credentials.
    pub fn new(client_id: impl Into<String>, version: ProtocolVersion, keep_alive: u16) -> Self {
        Self {
            protocol_name: version.protocol_name().to_string(),
            protocol_version: version as u8,
            clean_session: true,
            keep_alive,
            client_id: client_id.into(),
            will: None,
            username: None,
            password: None,
            properties: Vec::new(),
        }
    }

    pub fn version(&self) -> Option<ProtocolVersion> {
        ProtocolVersion::from_level(self.protocol_version)
    }
}

/// Will message configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Will {
    pub topic: String,
    pub payload: Bytes,
    pub qos: QoS,
    pub retain: bool,
    /// MQTT v5 will properties (empty for v3.1.1)
    pub properties: Vec<Property>,
}

/// CONNACK packet data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connack {
    pub session_present: bool,
    pub reason_code: ConnackReasonCode,
    pub properties: Vec<Property>,
}

impl Connack {
    pub fn new(session_present: bool, reason_code: ConnackReasonCode) -> Self {
        Self {
            session_present,
            reason_code,
            properties: Vec::new(),
        }
    }

    /// Check the session-present flag against what the client asked for.
    ///
    /// MQTT-3.2.2-4: a clean start always yields session-present 0, and a
    /// refused connection never reports a session.
    pub fn check_session_present(&self, clean_start: bool) -> Result<(), ParseError> {
        if self.session_present
            && (clean_start || self.reason_code != ConnackReasonCode::Success)
        {
            return Err(ParseError::InvalidSessionPresent);
        }
        Ok(())
    }
}

/// PUBLISH packet data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Publish {
    pub dup: bool,
    pub qos: QoS,
    pub retain: bool,
    pub topic: String,
    /// Present exactly when `qos` is above 0.
    pub packet_id: Option<u16>,
    /// MQTT v5 properties (empty for v3.1.1)
    pub properties: Vec<Property>,
    pub payload: Bytes,
}

impl Publish {
    pub fn new(topic: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            dup: false,
            qos: QoS::AtMostOnce,
            retain: false,
            topic: topic.into(),
            packet_id: None,
            properties: Vec::new(),
            payload: payload.into(),
        }
    }
}

/// SUBSCRIBE packet data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscribe {
    pub packet_id: u16,
    pub properties: Vec<Property>,
    /// Topic filters with their options.
    pub topics: Vec<(String, SubscriptionOptions)>,
}

/// SUBACK packet data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suback {
    pub packet_id: u16,
    pub properties: Vec<Property>,
    /// One granted QoS or failure code per requested filter.
    pub return_codes: Vec<u8>,
}

/// UNSUBSCRIBE packet data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unsubscribe {
    pub packet_id: u16,
    pub properties: Vec<Property>,
    pub topics: Vec<String>,
}

/// UNSUBACK packet data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unsuback {
    pub packet_id: u16,
    pub properties: Vec<Property>,
    /// One reason code per filter; MQTT v5 only, v3.1.1 has no payload.
    pub reason_codes: Vec<u8>,
}

/// DISCONNECT packet data.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Disconnect {
    /// 0x00 = normal, 0x04 = with will (MQTT v5; always 0 for v3.1.1)
    pub reason_code: u8,
    pub properties: Vec<Property>,
}
