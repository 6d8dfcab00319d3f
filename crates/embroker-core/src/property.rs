//! MQTT 5 properties.
//!
//! A property block is a Variable Byte Integer length followed by exactly that
//! many bytes of `(identifier, value)` pairs. The identifier fixes the wire
//! type of the value; an identifier outside the table below fails the whole
//! block.

use bytes::Bytes;

use crate::decoder::Decoder;
use crate::error::{BuildError, ParseError};
use crate::varint;

/// Encoding of a property value on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireType {
    Byte,
    TwoByteInteger,
    FourByteInteger,
    Utf8String,
    Utf8StringPair,
    BinaryData,
    VariableByteInteger,
}

/// Property identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PropertyId {
    PayloadFormatIndicator = 0x01,
    MessageExpiryInterval = 0x02,
    ContentType = 0x03,
    ResponseTopic = 0x08,
    CorrelationData = 0x09,
    SubscriptionIdentifier = 0x0B,
    SessionExpiryInterval = 0x11,
    AssignedClientIdentifier = 0x12,
    ServerKeepAlive = 0x13,
    AuthenticationMethod = 0x15,
    AuthenticationData = 0x16,
    RequestProblemInformation = 0x17,
    WillDelayInterval = 0x18,
    RequestResponseInformation = 0x19,
    ResponseInformation = 0x1A,
    ServerReference = 0x1C,
    ReasonString = 0x1F,
    ReceiveMaximum = 0x21,
    TopicAliasMaximum = 0x22,
    TopicAlias = 0x23,
    MaximumQoS = 0x24,
    RetainAvailable = 0x25,
    UserProperty = 0x26,
    MaximumPacketSize = 0x27,
    WildcardSubscriptionAvailable = 0x28,
    SubscriptionIdentifierAvailable = 0x29,
    SharedSubscriptionAvailable = 0x2A,
}

impl TryFrom<u32> for PropertyId {
    type Error = ParseError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        use PropertyId::*;
        Ok(match value {
            0x01 => PayloadFormatIndicator,
            0x02 => MessageExpiryInterval,
            0x03 => ContentType,
            0x08 => ResponseTopic,
            0x09 => CorrelationData,
            0x0B => SubscriptionIdentifier,
            0x11 => SessionExpiryInterval,
            0x12 => AssignedClientIdentifier,
            0x13 => ServerKeepAlive,
            0x15 => AuthenticationMethod,
            0x16 => AuthenticationData,
            0x17 => RequestProblemInformation,
            0x18 => WillDelayInterval,
            0x19 => RequestResponseInformation,
            0x1A => ResponseInformation,
            0x1C => ServerReference,
            0x1F => ReasonString,
            0x21 => ReceiveMaximum,
            0x22 => TopicAliasMaximum,
            0x23 => TopicAlias,
            0x24 => MaximumQoS,
            0x25 => RetainAvailable,
            0x26 => UserProperty,
            0x27 => MaximumPacketSize,
            0x28 => WildcardSubscriptionAvailable,
            0x29 => SubscriptionIdentifierAvailable,
            0x2A => SharedSubscriptionAvailable,
            _ => return Err(ParseError::InvalidMessageStructure),
        })
    }
}

impl PropertyId {
    pub fn wire_type(self) -> WireType {
        use PropertyId::*;
        match self {
            PayloadFormatIndicator
            | RequestProblemInformation
            | RequestResponseInformation
            | MaximumQoS
            | RetainAvailable
            | WildcardSubscriptionAvailable
            | SubscriptionIdentifierAvailable
            | SharedSubscriptionAvailable => WireType::Byte,
            ServerKeepAlive | ReceiveMaximum | TopicAliasMaximum | TopicAlias => {
                WireType::TwoByteInteger
            }
            MessageExpiryInterval
            | SessionExpiryInterval
            | WillDelayInterval
            | MaximumPacketSize => WireType::FourByteInteger,
            ContentType
            | ResponseTopic
            | AssignedClientIdentifier
            | AuthenticationMethod
            | ResponseInformation
            | ServerReference
            | ReasonString => WireType::Utf8String,
            UserProperty => WireType::Utf8StringPair,
            CorrelationData | AuthenticationData => WireType::BinaryData,
            SubscriptionIdentifier => WireType::VariableByteInteger,
        }
    }
}

/// Decoded property value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyValue {
    Byte(u8),
    TwoByteInteger(u16),
    FourByteInteger(u32),
    Utf8String(String),
    Utf8StringPair(String, String),
    BinaryData(Bytes),
    VariableByteInteger(u32),
}

impl PropertyValue {
    pub fn wire_type(&self) -> WireType {
        match self {
            PropertyValue::Byte(_) => WireType::Byte,
            PropertyValue::TwoByteInteger(_) => WireType::TwoByteInteger,
            PropertyValue::FourByteInteger(_) => WireType::FourByteInteger,
            PropertyValue::Utf8String(_) => WireType::Utf8String,
            PropertyValue::Utf8StringPair(..) => WireType::Utf8StringPair,
            PropertyValue::BinaryData(_) => WireType::BinaryData,
            PropertyValue::VariableByteInteger(_) => WireType::VariableByteInteger,
        }
    }

    /// Integer view of the numeric wire types.
    pub fn as_u32(&self) -> Option<u32> {
        match *self {
            PropertyValue::Byte(v) => Some(v.into()),
            PropertyValue::TwoByteInteger(v) => Some(v.into()),
            PropertyValue::FourByteInteger(v) | PropertyValue::VariableByteInteger(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::Utf8String(s) => Some(s),
            _ => None,
        }
    }

    fn encoded_len(&self) -> usize {
        match self {
            PropertyValue::Byte(_) => 1,
            PropertyValue::TwoByteInteger(_) => 2,
            PropertyValue::FourByteInteger(_) => 4,
            PropertyValue::Utf8String(s) => 2 + s.len(),
            PropertyValue::Utf8StringPair(k, v) => 4 + k.len() + v.len(),
            PropertyValue::BinaryData(b) => 2 + b.len(),
            PropertyValue::VariableByteInteger(v) => varint::encoded_len(*v),
        }
    }
}

/// One property. The value always has the wire type its identifier demands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    id: PropertyId,
    value: PropertyValue,
}

impl Property {
    /// Pair an identifier with a value, or `None` if the value has the wrong
    /// wire type for the identifier.
    pub fn new(id: PropertyId, value: PropertyValue) -> Option<Self> {
        (id.wire_type() == value.wire_type()).then_some(Self { id, value })
    }

    pub fn id(&self) -> PropertyId {
        self.id
    }

    pub fn value(&self) -> &PropertyValue {
        &self.value
    }
}

/// First value for `id` in a property list.
pub fn find(properties: &[Property], id: PropertyId) -> Option<&PropertyValue> {
    properties.iter().find(|p| p.id == id).map(|p| &p.value)
}

/// Decode a length-prefixed property block.
///
/// Any failure inside the block, including a value that runs past the
/// declared length, is reported as `InvalidMessageStructure`.
pub fn decode_properties(dec: &mut Decoder<'_>) -> Result<Vec<Property>, ParseError> {
    let len = dec
        .read_variable_byte_integer()
        .map_err(|_| ParseError::InvalidMessageStructure)? as usize;
    let region = dec
        .read_bytes(len)
        .map_err(|_| ParseError::InvalidMessageStructure)?;

    let mut block = Decoder::new(region);
    let mut properties = Vec::new();
    while !block.is_empty() {
        let property =
            decode_property(&mut block).map_err(|_| ParseError::InvalidMessageStructure)?;
        properties.push(property);
    }
    Ok(properties)
}

fn decode_property(dec: &mut Decoder<'_>) -> Result<Property, ParseError> {
    let id = PropertyId::try_from(dec.read_variable_byte_integer()?)?;
    let value = match id.wire_type() {
        WireType::Byte => PropertyValue::Byte(dec.read_u8()?),
        WireType::TwoByteInteger => PropertyValue::TwoByteInteger(dec.read_u16()?),
        WireType::FourByteInteger => PropertyValue::FourByteInteger(dec.read_u32()?),
        WireType::Utf8String => PropertyValue::Utf8String(dec.read_string()?),
        WireType::Utf8StringPair => {
            let key = dec.read_string()?;
            let value = dec.read_string()?;
            PropertyValue::Utf8StringPair(key, value)
        }
        WireType::BinaryData => PropertyValue::BinaryData(dec.read_binary()?),
        WireType::VariableByteInteger => {
            PropertyValue::VariableByteInteger(dec.read_variable_byte_integer()?)
        }
    };
    Ok(Property { id, value })
}

/// Size of the property block including its length prefix.
pub fn encoded_len(properties: &[Property]) -> usize {
    let body = body_len(properties);
    varint::encoded_len(body as u32) + body
}

fn body_len(properties: &[Property]) -> usize {
    properties.iter().map(|p| 1 + p.value.encoded_len()).sum()
}

/// Append a length-prefixed property block.
pub fn encode_properties(properties: &[Property], buf: &mut Vec<u8>) -> Result<(), BuildError> {
    let body = body_len(properties);
    let body_u32 = u32::try_from(body).map_err(|_| BuildError::PacketTooLarge { size: body })?;
    varint::encode_to_vec(body_u32, buf)?;

    for property in properties {
        // Every identifier is below 0x80, so its varint form is one byte.
        buf.push(property.id as u8);
        match &property.value {
            PropertyValue::Byte(v) => buf.push(*v),
            PropertyValue::TwoByteInteger(v) => buf.extend_from_slice(&v.to_be_bytes()),
            PropertyValue::FourByteInteger(v) => buf.extend_from_slice(&v.to_be_bytes()),
            PropertyValue::Utf8String(s) => put_prefixed(s.as_bytes(), buf)?,
            PropertyValue::Utf8StringPair(k, v) => {
                put_prefixed(k.as_bytes(), buf)?;
                put_prefixed(v.as_bytes(), buf)?;
            }
            PropertyValue::BinaryData(b) => put_prefixed(b, buf)?,
            PropertyValue::VariableByteInteger(v) => {
                varint::encode_to_vec(*v, buf)?;
            }
        }
    }
    Ok(())
}

/// Append a u16 length prefix and the bytes.
pub(crate) fn put_prefixed(bytes: &[u8], buf: &mut Vec<u8>) -> Result<(), BuildError> {
    let len = u16::try_from(bytes.len()).map_err(|_| BuildError::StringTooLong {
        len: bytes.len(),
    })?;
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(bytes);
    Ok(())
}
