//! Per-packet parsers.
//!
//! Each parser takes the bytes of exactly one framed packet. It checks the
//! fixed header against its own packet type, requires the Remaining Length to
//! cover the rest of the buffer exactly, then decodes the variable header,
//! the MQTT 5 properties where the layout has them, and the payload. The
//! buffer is only borrowed, so parsing the same bytes again gives the same
//! answer.

use bytes::Bytes;

use crate::decoder::{Decoder, FixedHeader};
use crate::error::ParseError;
use crate::packet::{
    Connack, ConnackReasonCode, Connect, Disconnect, Packet, PacketType, ProtocolVersion, Publish,
    QoS, Suback, Subscribe, SubscriptionOptions, Unsuback, Unsubscribe, Will,
};
use crate::property::decode_properties;
use crate::varint;

/// Total length of the packet at the start of `buf`.
///
/// Returns `Ok(None)` while the fixed header itself is still incomplete. The
/// returned length may exceed `buf.len()`; the caller waits for the rest.
pub fn frame_len(buf: &[u8]) -> Result<Option<usize>, ParseError> {
    if buf.is_empty() {
        return Ok(None);
    }
    match varint::decode(&buf[1..])? {
        Some((remaining_length, len_bytes)) => Ok(Some(1 + len_bytes + remaining_length as usize)),
        None => Ok(None),
    }
}

/// Parse one framed packet, choosing the parser from the type nibble.
///
/// `version` selects the layout for packets whose encoding differs between
/// MQTT 3.1.1 and 5; CONNECT carries its own level.
pub fn decode_packet(buf: &[u8], version: ProtocolVersion) -> Result<Packet, ParseError> {
    let first = *buf.first().ok_or(ParseError::IncompleteData)?;

    let packet = match PacketType::try_from(first >> 4)? {
        PacketType::Connect => Packet::Connect(decode_connect(buf)?),
        PacketType::Connack => Packet::Connack(decode_connack(buf)?),
        PacketType::Publish => Packet::Publish(decode_publish(buf, version)?),
        PacketType::Puback => Packet::Puback {
            packet_id: decode_puback(buf)?,
        },
        PacketType::Pubrec => Packet::Pubrec {
            packet_id: decode_pubrec(buf)?,
        },
        PacketType::Pubrel => Packet::Pubrel {
            packet_id: decode_pubrel(buf)?,
        },
        PacketType::Pubcomp => Packet::Pubcomp {
            packet_id: decode_pubcomp(buf)?,
        },
        PacketType::Subscribe => Packet::Subscribe(decode_subscribe(buf, version)?),
        PacketType::Suback => Packet::Suback(decode_suback(buf, version)?),
        PacketType::Unsubscribe => Packet::Unsubscribe(decode_unsubscribe(buf, version)?),
        PacketType::Unsuback => Packet::Unsuback(decode_unsuback(buf, version)?),
        PacketType::Pingreq => {
            decode_pingreq(buf)?;
            Packet::Pingreq
        }
        PacketType::Pingresp => {
            decode_pingresp(buf)?;
            Packet::Pingresp
        }
        PacketType::Disconnect => Packet::Disconnect(decode_disconnect(buf)?),
    };

    Ok(packet)
}

pub fn decode_connect(buf: &[u8]) -> Result<Connect, ParseError> {
    let mut dec = Decoder::new(buf);
    FixedHeader::read(&mut dec, PacketType::Connect)?;

    let protocol_name = dec.read_string()?;
    let protocol_version = dec.read_u8()?;
    let version = ProtocolVersion::from_level(protocol_version);
    let name_ok = match version {
        Some(v) => protocol_name == v.protocol_name(),
        // Unknown level: decode with the 3.1.1 layout and let the session refuse it.
        None => protocol_name == "MQTT" || protocol_name == "MQIsdp",
    };
    if !name_ok {
        return Err(ParseError::InvalidMessageStructure);
    }
    let is_v5 = version == Some(ProtocolVersion::V5);

    let flags = dec.read_u8()?;
    let clean_session = flags & 0x02 != 0;
    let will_flag = flags & 0x04 != 0;
    let will_qos = QoS::try_from((flags >> 3) & 0x03)?;
    let will_retain = flags & 0x20 != 0;
    let password_flag = flags & 0x40 != 0;
    let username_flag = flags & 0x80 != 0;

    // MQTT-3.1.2-3: reserved bit must be 0
    if flags & 0x01 != 0 {
        return Err(ParseError::InvalidMessageStructure);
    }

    // MQTT-3.1.2-11/13/15: without a will, will QoS and retain must be 0
    if !will_flag && (will_qos != QoS::AtMostOnce || will_retain) {
        return Err(ParseError::InvalidMessageStructure);
    }

    // MQTT-3.1.2-22: no password without a username (v3.1.1 only)
    if !is_v5 && !username_flag && password_flag {
        return Err(ParseError::InvalidMessageStructure);
    }

    let keep_alive = dec.read_u16()?;

    let properties = if is_v5 {
        decode_properties(&mut dec)?
    } else {
        Vec::new()
    };

    let client_id = dec.read_string()?;

    let will = if will_flag {
        let properties = if is_v5 {
            decode_properties(&mut dec)?
        } else {
            Vec::new()
        };
        let topic = dec.read_string()?;
        let payload = dec.read_binary()?;
        Some(Will {
            topic,
            payload,
            qos: will_qos,
            retain: will_retain,
            properties,
        })
    } else {
        None
    };

    let username = if username_flag {
        Some(dec.read_string()?)
    } else {
        None
    };

    let password = if password_flag {
        Some(dec.read_binary()?)
    } else {
        None
    };

    ensure_consumed(&dec)?;

    Ok(Connect {
        protocol_name,
        protocol_version,
        clean_session,
        keep_alive,
        client_id,
        will,
        username,
        password,
        properties,
    })
}

pub fn decode_connack(buf: &[u8]) -> Result<Connack, ParseError> {
    let mut dec = Decoder::new(buf);
    FixedHeader::read(&mut dec, PacketType::Connack)?;

    let ack_flags = dec.read_u8()?;
    // MQTT-3.2.2-1: bits 7-1 are reserved
    if ack_flags & 0xFE != 0 {
        return Err(ParseError::InvalidMessageStructure);
    }
    let reason_code = ConnackReasonCode::try_from(dec.read_u8()?)?;

    // A 3.1.1 CONNACK, or a v5 one without properties, ends here.
    let properties = if dec.is_empty() {
        Vec::new()
    } else {
        decode_properties(&mut dec)?
    };
    ensure_consumed(&dec)?;

    Ok(Connack {
        session_present: ack_flags & 0x01 != 0,
        reason_code,
        properties,
    })
}

pub fn decode_publish(buf: &[u8], version: ProtocolVersion) -> Result<Publish, ParseError> {
    let mut dec = Decoder::new(buf);
    let header = FixedHeader::read(&mut dec, PacketType::Publish)?;

    let dup = header.flags & 0x08 != 0;
    let qos = QoS::try_from((header.flags >> 1) & 0x03)?;
    let retain = header.flags & 0x01 != 0;

    // MQTT-3.3.1-2: DUP must be 0 for QoS 0
    if dup && qos == QoS::AtMostOnce {
        return Err(ParseError::InvalidMessageStructure);
    }

    let topic = dec.read_string()?;

    let packet_id = if qos != QoS::AtMostOnce {
        Some(read_packet_id(&mut dec)?)
    } else {
        None
    };

    let properties = if version.is_v5() {
        decode_properties(&mut dec)?
    } else {
        Vec::new()
    };

    let payload = Bytes::copy_from_slice(dec.read_rest());

    Ok(Publish {
        dup,
        qos,
        retain,
        topic,
        packet_id,
        properties,
        payload,
    })
}

pub fn decode_puback(buf: &[u8]) -> Result<u16, ParseError> {
    decode_ack(buf, PacketType::Puback)
}

pub fn decode_pubrec(buf: &[u8]) -> Result<u16, ParseError> {
    decode_ack(buf, PacketType::Pubrec)
}

pub fn decode_pubrel(buf: &[u8]) -> Result<u16, ParseError> {
    decode_ack(buf, PacketType::Pubrel)
}

pub fn decode_pubcomp(buf: &[u8]) -> Result<u16, ParseError> {
    decode_ack(buf, PacketType::Pubcomp)
}

/// Packet identifier of a PUBACK/PUBREC/PUBREL/PUBCOMP.
///
/// MQTT v5 may append a reason code and properties; they are validated and
/// dropped.
fn decode_ack(buf: &[u8], packet_type: PacketType) -> Result<u16, ParseError> {
    let mut dec = Decoder::new(buf);
    FixedHeader::read(&mut dec, packet_type)?;

    let packet_id = read_packet_id(&mut dec)?;
    if !dec.is_empty() {
        dec.read_u8()?;
        if !dec.is_empty() {
            decode_properties(&mut dec)?;
        }
    }
    ensure_consumed(&dec)?;

    Ok(packet_id)
}

pub fn decode_subscribe(buf: &[u8], version: ProtocolVersion) -> Result<Subscribe, ParseError> {
    let mut dec = Decoder::new(buf);
    FixedHeader::read(&mut dec, PacketType::Subscribe)?;

    let packet_id = read_packet_id(&mut dec)?;
    let properties = if version.is_v5() {
        decode_properties(&mut dec)?
    } else {
        Vec::new()
    };

    let mut topics = Vec::new();
    while !dec.is_empty() {
        let filter = read_topic_filter(&mut dec)?;
        let options = SubscriptionOptions::from_byte(dec.read_u8()?, version)?;
        topics.push((filter, options));
    }

    // MQTT-3.8.3-3: at least one filter
    if topics.is_empty() {
        return Err(ParseError::InvalidMessageStructure);
    }

    Ok(Subscribe {
        packet_id,
        properties,
        topics,
    })
}

pub fn decode_suback(buf: &[u8], version: ProtocolVersion) -> Result<Suback, ParseError> {
    let mut dec = Decoder::new(buf);
    FixedHeader::read(&mut dec, PacketType::Suback)?;

    let packet_id = read_packet_id(&mut dec)?;
    let properties = if version.is_v5() {
        decode_properties(&mut dec)?
    } else {
        Vec::new()
    };

    let return_codes = dec.read_rest().to_vec();
    if return_codes.is_empty() {
        return Err(ParseError::InvalidMessageStructure);
    }

    Ok(Suback {
        packet_id,
        properties,
        return_codes,
    })
}

pub fn decode_unsubscribe(
    buf: &[u8],
    version: ProtocolVersion,
) -> Result<Unsubscribe, ParseError> {
    let mut dec = Decoder::new(buf);
    FixedHeader::read(&mut dec, PacketType::Unsubscribe)?;

    let packet_id = read_packet_id(&mut dec)?;
    let properties = if version.is_v5() {
        decode_properties(&mut dec)?
    } else {
        Vec::new()
    };

    let mut topics = Vec::new();
    while !dec.is_empty() {
        topics.push(read_topic_filter(&mut dec)?);
    }

    // MQTT-3.10.3-2: at least one filter
    if topics.is_empty() {
        return Err(ParseError::InvalidMessageStructure);
    }

    Ok(Unsubscribe {
        packet_id,
        properties,
        topics,
    })
}

pub fn decode_unsuback(buf: &[u8], version: ProtocolVersion) -> Result<Unsuback, ParseError> {
    let mut dec = Decoder::new(buf);
    FixedHeader::read(&mut dec, PacketType::Unsuback)?;

    let packet_id = read_packet_id(&mut dec)?;
    if !version.is_v5() {
        ensure_consumed(&dec)?;
        return Ok(Unsuback {
            packet_id,
            properties: Vec::new(),
            reason_codes: Vec::new(),
        });
    }

    let properties = decode_properties(&mut dec)?;
    let reason_codes = dec.read_rest().to_vec();
    if reason_codes.is_empty() {
        return Err(ParseError::InvalidMessageStructure);
    }

    Ok(Unsuback {
        packet_id,
        properties,
        reason_codes,
    })
}

pub fn decode_pingreq(buf: &[u8]) -> Result<(), ParseError> {
    decode_empty(buf, PacketType::Pingreq)
}

pub fn decode_pingresp(buf: &[u8]) -> Result<(), ParseError> {
    decode_empty(buf, PacketType::Pingresp)
}

fn decode_empty(buf: &[u8], packet_type: PacketType) -> Result<(), ParseError> {
    let mut dec = Decoder::new(buf);
    let header = FixedHeader::read(&mut dec, packet_type)?;
    if header.remaining_length != 0 {
        return Err(ParseError::InvalidRemainingLength);
    }
    Ok(())
}

/// DISCONNECT; an MQTT v5 reason code and properties are read when present.
pub fn decode_disconnect(buf: &[u8]) -> Result<Disconnect, ParseError> {
    let mut dec = Decoder::new(buf);
    FixedHeader::read(&mut dec, PacketType::Disconnect)?;

    let mut disconnect = Disconnect::default();
    if !dec.is_empty() {
        disconnect.reason_code = dec.read_u8()?;
        if !dec.is_empty() {
            disconnect.properties = decode_properties(&mut dec)?;
        }
    }
    ensure_consumed(&dec)?;

    Ok(disconnect)
}

fn read_packet_id(dec: &mut Decoder<'_>) -> Result<u16, ParseError> {
    // MQTT-2.3.1-1: packet identifiers are non-zero
    match dec.read_u16()? {
        0 => Err(ParseError::InvalidMessageStructure),
        id => Ok(id),
    }
}

fn read_topic_filter(dec: &mut Decoder<'_>) -> Result<String, ParseError> {
    let filter = dec.read_string()?;
    // MQTT-4.7.3-1: topic filters are at least one character
    if filter.is_empty() {
        return Err(ParseError::InvalidMessageStructure);
    }
    Ok(filter)
}

fn ensure_consumed(dec: &Decoder<'_>) -> Result<(), ParseError> {
    if dec.is_empty() {
        Ok(())
    } else {
        Err(ParseError::InvalidMessageStructure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ParseResult;
    use crate::property::{find, PropertyId, PropertyValue};

    #[test]
    fn test_connack_success() {
        let connack = decode_connack(&[0x20, 0x02, 0x00, 0x00]).unwrap();
        assert_eq!(connack.reason_code, ConnackReasonCode::Success);
        assert!(!connack.session_present);
        assert!(connack.properties.is_empty());
    }

    #[test]
    fn test_connack_client_identifier_not_valid() {
        let connack = decode_connack(&[0x20, 0x02, 0x01, 0x85]).unwrap();
        assert_eq!(
            connack.reason_code,
            ConnackReasonCode::ClientIdentifierNotValid
        );
        assert!(connack.session_present);
    }

    #[test]
    fn test_connack_failures() {
        let cases: [(&[u8], ParseResult); 5] = [
            (&[0x20, 0x02, 0x00, 0xFE], ParseResult::InvalidReturnCode),
            (&[0x20, 0x49, 0x00, 0x00], ParseResult::InvalidRemainingLength),
            (&[0x20, 0x02, 0xE0, 0x00], ParseResult::InvalidMessageStructure),
            (&[0x30, 0x02, 0x00, 0x00], ParseResult::InvalidPacketType),
            (&[0x20, 0x01, 0x00], ParseResult::IncompleteData),
        ];
        for (bytes, expected) in cases {
            assert_eq!(ParseResult::from(&decode_connack(bytes)), expected, "{bytes:02x?}");
        }
    }

    #[test]
    fn test_connack_v3_refusal_codes_are_not_decoded() {
        // Identifier rejected, as a 3.1.1 broker would send it
        assert_eq!(
            decode_connack(&[0x20, 0x02, 0x00, 0x02]),
            Err(ParseError::InvalidReturnCode)
        );
        let code = ConnackReasonCode::ClientIdentifierNotValid.to_v3_return_code();
        assert_eq!(
            decode_connack(&[0x20, 0x02, 0x00, code]),
            Err(ParseError::InvalidReturnCode)
        );
    }

    #[test]
    fn test_connack_with_properties() {
        let bytes = [0x20, 0x06, 0x00, 0x00, 0x03, 0x21, 0x00, 0x14];
        let connack = decode_connack(&bytes).unwrap();
        assert_eq!(
            find(&connack.properties, PropertyId::ReceiveMaximum),
            Some(&PropertyValue::TwoByteInteger(20))
        );

        // Unknown property identifier
        let bytes = [0x20, 0x05, 0x00, 0x00, 0x02, 0x7F, 0x00];
        assert_eq!(
            decode_connack(&bytes),
            Err(ParseError::InvalidMessageStructure)
        );
    }

    #[test]
    fn test_reparse_is_idempotent() {
        let bytes = [0x20, 0x02, 0x01, 0x85];
        assert_eq!(decode_connack(&bytes), decode_connack(&bytes));
        let bad = [0x20, 0x02, 0x00, 0xFE];
        assert_eq!(decode_connack(&bad), decode_connack(&bad));
    }

    #[test]
    fn test_decode_connect_v311() {
        let bytes = [
            0x10, 0x1A, // fixed header
            0x00, 0x04, b'M', b'Q', b'T', b'T', 0x04, // protocol
            0xEE, // username, password, will retain, will QoS 1, will, clean session
            0x00, 0x0A, // keep alive
            0x00, 0x02, b'c', b'1', // client id
            0x00, 0x01, b'w', // will topic
            0x00, 0x01, b'x', // will payload
            0x00, 0x01, b'u', // username
            0x00, 0x01, b'p', // password
        ];
        let connect = decode_connect(&bytes).unwrap();
        assert_eq!(connect.protocol_version, 4);
        assert!(connect.clean_session);
        assert_eq!(connect.keep_alive, 10);
        assert_eq!(connect.client_id, "c1");
        let will = connect.will.unwrap();
        assert_eq!(will.topic, "w");
        assert_eq!(will.payload, Bytes::from_static(b"x"));
        assert_eq!(will.qos, QoS::AtLeastOnce);
        assert!(will.retain);
        assert_eq!(connect.username.as_deref(), Some("u"));
        assert_eq!(connect.password, Some(Bytes::from_static(b"p")));
    }

    #[test]
    fn test_decode_connect_rejects_bad_flags() {
        let base = [
            0x10, 0x0C, 0x00, 0x04, b'M', b'Q', b'T', b'T', 0x04, 0x02, 0x00, 0x0A, 0x00, 0x00,
        ];
        assert!(decode_connect(&base).is_ok());

        for flags in [0x03, 0x0A, 0x22, 0x42, 0x1E] {
            let mut bytes = base;
            bytes[9] = flags;
            assert_eq!(
                decode_connect(&bytes),
                Err(ParseError::InvalidMessageStructure),
                "flags {flags:#04x}"
            );
        }

        // Level 3 must use the "MQIsdp" name
        let mut bytes = base;
        bytes[8] = 3;
        assert_eq!(
            decode_connect(&bytes),
            Err(ParseError::InvalidMessageStructure)
        );
    }

    #[test]
    fn test_decode_connect_unknown_level_is_reported() {
        let bytes = [
            0x10, 0x0C, 0x00, 0x04, b'M', b'Q', b'T', b'T', 0x07, 0x02, 0x00, 0x0A, 0x00, 0x00,
        ];
        let connect = decode_connect(&bytes).unwrap();
        assert_eq!(connect.protocol_version, 7);
        assert_eq!(connect.version(), None);
    }

    #[test]
    fn test_decode_publish() {
        let bytes = [
            0x33, 0x0A, 0x00, 0x03, b'a', b'/', b'b', 0x00, 0x07, b'h', b'i', b'!',
        ];
        let publish = decode_publish(&bytes, ProtocolVersion::V3_1_1).unwrap();
        assert_eq!(publish.qos, QoS::AtLeastOnce);
        assert!(publish.retain);
        assert!(!publish.dup);
        assert_eq!(publish.topic, "a/b");
        assert_eq!(publish.packet_id, Some(7));
        assert_eq!(publish.payload, Bytes::from_static(b"hi!"));
    }

    #[test]
    fn test_decode_publish_rejects() {
        // QoS 1 with packet id 0
        let bytes = [0x32, 0x05, 0x00, 0x01, b'a', 0x00, 0x00];
        assert_eq!(
            decode_publish(&bytes, ProtocolVersion::V3_1_1),
            Err(ParseError::InvalidMessageStructure)
        );
        // DUP on QoS 0
        let bytes = [0x38, 0x03, 0x00, 0x01, b'a'];
        assert_eq!(
            decode_publish(&bytes, ProtocolVersion::V3_1_1),
            Err(ParseError::InvalidMessageStructure)
        );
        // Topic length runs past the packet
        let bytes = [0x30, 0x03, 0x00, 0x05, b'a'];
        assert_eq!(
            decode_publish(&bytes, ProtocolVersion::V3_1_1),
            Err(ParseError::IncompleteData)
        );
    }

    #[test]
    fn test_decode_acks() {
        assert_eq!(decode_puback(&[0x40, 0x02, 0x01, 0x23]), Ok(0x0123));
        assert_eq!(decode_pubrec(&[0x50, 0x02, 0x00, 0x09]), Ok(9));
        assert_eq!(decode_pubcomp(&[0x70, 0x02, 0x00, 0x09]), Ok(9));
        // v5 PUBREL with reason code and empty properties
        assert_eq!(decode_pubrel(&[0x62, 0x04, 0x00, 0x09, 0x00, 0x00]), Ok(9));
        // PUBREL must carry flags 0x2
        assert_eq!(
            decode_pubrel(&[0x60, 0x02, 0x00, 0x09]),
            Err(ParseError::InvalidMessageStructure)
        );
        assert_eq!(
            decode_puback(&[0x50, 0x02, 0x00, 0x09]),
            Err(ParseError::InvalidPacketType)
        );
    }

    #[test]
    fn test_decode_subscribe() {
        let bytes = [
            0x82, 0x0C, 0x00, 0x01, 0x00, 0x03, b'a', b'/', b'#', 0x01, 0x00, 0x01, b'b', 0x02,
        ];
        let subscribe = decode_subscribe(&bytes, ProtocolVersion::V3_1_1).unwrap();
        assert_eq!(subscribe.packet_id, 1);
        assert_eq!(subscribe.topics.len(), 2);
        assert_eq!(subscribe.topics[0].0, "a/#");
        assert_eq!(subscribe.topics[0].1.qos, QoS::AtLeastOnce);
        assert_eq!(subscribe.topics[1].1.qos, QoS::ExactlyOnce);

        // No filters
        assert_eq!(
            decode_subscribe(&[0x82, 0x02, 0x00, 0x01], ProtocolVersion::V3_1_1),
            Err(ParseError::InvalidMessageStructure)
        );
        // Missing options byte
        assert_eq!(
            decode_subscribe(&[0x82, 0x05, 0x00, 0x01, 0x00, 0x01, b'a'], ProtocolVersion::V3_1_1),
            Err(ParseError::IncompleteData)
        );
    }

    #[test]
    fn test_decode_unsuback_by_version() {
        let v3 = [0xB0, 0x02, 0x00, 0x05];
        assert_eq!(
            decode_unsuback(&v3, ProtocolVersion::V3_1_1).unwrap().packet_id,
            5
        );
        let v5 = [0xB0, 0x04, 0x00, 0x05, 0x00, 0x11];
        let unsuback = decode_unsuback(&v5, ProtocolVersion::V5).unwrap();
        assert_eq!(unsuback.reason_codes, vec![0x11]);
    }

    #[test]
    fn test_decode_ping_and_disconnect() {
        assert_eq!(decode_pingreq(&[0xC0, 0x00]), Ok(()));
        assert_eq!(decode_pingresp(&[0xD0, 0x00]), Ok(()));
        assert_eq!(
            decode_pingreq(&[0xC0, 0x01, 0x00]),
            Err(ParseError::InvalidRemainingLength)
        );
        assert_eq!(decode_disconnect(&[0xE0, 0x00]).unwrap().reason_code, 0);
        assert_eq!(decode_disconnect(&[0xE0, 0x01, 0x04]).unwrap().reason_code, 4);
    }

    #[test]
    fn test_decode_packet_dispatch() {
        assert_eq!(
            decode_packet(&[0xC0, 0x00], ProtocolVersion::V3_1_1),
            Ok(Packet::Pingreq)
        );
        assert_eq!(
            decode_packet(&[0x40, 0x02, 0x00, 0x01], ProtocolVersion::V3_1_1),
            Ok(Packet::Puback { packet_id: 1 })
        );
        assert_eq!(
            decode_packet(&[0xF0, 0x00], ProtocolVersion::V5),
            Err(ParseError::InvalidPacketType)
        );
        assert_eq!(
            decode_packet(&[], ProtocolVersion::V5),
            Err(ParseError::IncompleteData)
        );
    }

    #[test]
    fn test_frame_len() {
        assert_eq!(frame_len(&[]), Ok(None));
        assert_eq!(frame_len(&[0x30]), Ok(None));
        assert_eq!(frame_len(&[0x30, 0x80]), Ok(None));
        assert_eq!(frame_len(&[0x30, 0x80, 0x01]), Ok(Some(131)));
        assert_eq!(frame_len(&[0xC0, 0x00, 0xD0]), Ok(Some(2)));
        assert_eq!(
            frame_len(&[0x30, 0xFF, 0xFF, 0xFF, 0xFF]),
            Err(ParseError::InvalidRemainingLength)
        );
    }
}
