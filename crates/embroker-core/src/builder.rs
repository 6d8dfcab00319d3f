//! Outbound packet serialization.
//!
//! [`MessageBuilder`] appends complete packets to an internal buffer: the
//! fixed-header byte, the Remaining Length computed from the already encoded
//! body, then the body. It never reads back what it wrote. A method that
//! fails leaves the buffer untouched.

use bytes::Bytes;

use crate::error::{BuildError, EntryError};
use crate::packet::{
    Connack, Connect, Disconnect, ProtocolVersion, Publish, QoS, Suback, Subscribe, Unsuback,
    Unsubscribe,
};
use crate::property::{encode_properties, put_prefixed};
use crate::topic::DEFAULT_MAX_TOPIC_LENGTH;
use crate::varint;

/// Default cap on filters per outbound SUBSCRIBE/UNSUBSCRIBE.
pub const DEFAULT_MAX_TOPICS_IN_SUBSCRIBE: usize = 5;

/// Entries a SUBSCRIBE/UNSUBSCRIBE left out, by their index in the request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryReport {
    pub rejected: Vec<(usize, EntryError)>,
}

impl EntryReport {
    /// True when every requested entry was encoded.
    pub fn is_complete(&self) -> bool {
        self.rejected.is_empty()
    }
}

/// Serializer for outbound packets of one protocol version.
#[derive(Debug, Clone)]
pub struct MessageBuilder {
    buf: Vec<u8>,
    version: ProtocolVersion,
    max_topic_length: usize,
    max_topics: usize,
}

impl MessageBuilder {
    pub fn new(version: ProtocolVersion) -> Self {
        Self::with_limits(
            version,
            DEFAULT_MAX_TOPIC_LENGTH,
            DEFAULT_MAX_TOPICS_IN_SUBSCRIBE,
        )
    }

    pub fn with_limits(version: ProtocolVersion, max_topic_length: usize, max_topics: usize) -> Self {
        Self {
            buf: Vec::new(),
            version,
            max_topic_length,
            max_topics,
        }
    }

    pub fn version(&self) -> ProtocolVersion {
        self.version
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Hand out everything built so far and start over.
    pub fn take(&mut self) -> Bytes {
        Bytes::from(std::mem::take(&mut self.buf))
    }

    pub fn connect(&mut self, connect: &Connect) -> Result<(), BuildError> {
        let is_v5 = connect.protocol_version == ProtocolVersion::V5 as u8;
        let mut body = Vec::new();

        put_prefixed(connect.protocol_name.as_bytes(), &mut body)?;
        body.push(connect.protocol_version);

        let mut flags = 0u8;
        if connect.clean_session {
            flags |= 0x02;
        }
        if let Some(will) = &connect.will {
            flags |= 0x04 | ((will.qos as u8) << 3);
            if will.retain {
                flags |= 0x20;
            }
        }
        if connect.password.is_some() {
            flags |= 0x40;
        }
        if connect.username.is_some() {
            flags |= 0x80;
        }
        body.push(flags);
        body.extend_from_slice(&connect.keep_alive.to_be_bytes());

        if is_v5 {
            encode_properties(&connect.properties, &mut body)?;
        }

        put_prefixed(connect.client_id.as_bytes(), &mut body)?;

        if let Some(will) = &connect.will {
            if is_v5 {
                encode_properties(&will.properties, &mut body)?;
            }
            put_prefixed(will.topic.as_bytes(), &mut body)?;
            put_prefixed(&will.payload, &mut body)?;
        }
        if let Some(username) = &connect.username {
            put_prefixed(username.as_bytes(), &mut body)?;
        }
        if let Some(password) = &connect.password {
            put_prefixed(password, &mut body)?;
        }

        self.frame(0x10, &body)
    }

    /// CONNACK; MQTT 3.1.1 peers get the nearest 3.1.1 return code.
    pub fn connack(&mut self, connack: &Connack) -> Result<(), BuildError> {
        let mut body = vec![u8::from(connack.session_present)];
        if self.version.is_v5() {
            body.push(connack.reason_code as u8);
            encode_properties(&connack.properties, &mut body)?;
        } else {
            body.push(connack.reason_code.to_v3_return_code());
        }
        self.frame(0x20, &body)
    }

    pub fn publish(&mut self, publish: &Publish) -> Result<(), BuildError> {
        let mut flags = (publish.qos as u8) << 1;
        if publish.dup {
            flags |= 0x08;
        }
        if publish.retain {
            flags |= 0x01;
        }

        let mut body = Vec::with_capacity(2 + publish.topic.len() + 2 + publish.payload.len());
        put_prefixed(publish.topic.as_bytes(), &mut body)?;
        if publish.qos != QoS::AtMostOnce {
            let packet_id = publish.packet_id.ok_or(BuildError::MissingPacketId)?;
            body.extend_from_slice(&packet_id.to_be_bytes());
        }
        if self.version.is_v5() {
            encode_properties(&publish.properties, &mut body)?;
        }
        body.extend_from_slice(&publish.payload);

        self.frame(0x30 | flags, &body)
    }

    pub fn puback(&mut self, packet_id: u16) {
        self.simple_ack(0x40, packet_id);
    }

    pub fn pubrec(&mut self, packet_id: u16) {
        self.simple_ack(0x50, packet_id);
    }

    /// PUBREL; MQTT v5 spells out the success reason code and an empty
    /// property block.
    pub fn pubrel(&mut self, packet_id: u16) {
        let [hi, lo] = packet_id.to_be_bytes();
        if self.version.is_v5() {
            self.buf.extend_from_slice(&[0x62, 0x04, hi, lo, 0x00, 0x00]);
        } else {
            self.buf.extend_from_slice(&[0x62, 0x02, hi, lo]);
        }
    }

    pub fn pubcomp(&mut self, packet_id: u16) {
        self.simple_ack(0x70, packet_id);
    }

    fn simple_ack(&mut self, first: u8, packet_id: u16) {
        let [hi, lo] = packet_id.to_be_bytes();
        self.buf.extend_from_slice(&[first, 0x02, hi, lo]);
    }

    /// SUBSCRIBE with the entries that fit the limits.
    ///
    /// Entries whose filter is too long, or that come after the first
    /// `max_topics` accepted ones, are listed in the returned report instead
    /// of being encoded.
    pub fn subscribe(&mut self, subscribe: &Subscribe) -> Result<EntryReport, BuildError> {
        let (accepted, report) = self.select_entries(subscribe.topics.iter().map(|(t, _)| t));
        if accepted.is_empty() {
            return Err(BuildError::NoTopics);
        }

        let mut body = Vec::new();
        body.extend_from_slice(&subscribe.packet_id.to_be_bytes());
        if self.version.is_v5() {
            encode_properties(&subscribe.properties, &mut body)?;
        }
        for index in accepted {
            let (filter, options) = &subscribe.topics[index];
            put_prefixed(filter.as_bytes(), &mut body)?;
            body.push(options.to_byte(self.version));
        }

        self.frame(0x82, &body)?;
        Ok(report)
    }

    pub fn suback(&mut self, suback: &Suback) -> Result<(), BuildError> {
        let mut body = Vec::with_capacity(3 + suback.return_codes.len());
        body.extend_from_slice(&suback.packet_id.to_be_bytes());
        if self.version.is_v5() {
            encode_properties(&suback.properties, &mut body)?;
        }
        body.extend_from_slice(&suback.return_codes);
        self.frame(0x90, &body)
    }

    /// UNSUBSCRIBE with the same entry limits as [`subscribe`](Self::subscribe).
    pub fn unsubscribe(&mut self, unsubscribe: &Unsubscribe) -> Result<EntryReport, BuildError> {
        let (accepted, report) = self.select_entries(unsubscribe.topics.iter());
        if accepted.is_empty() {
            return Err(BuildError::NoTopics);
        }

        let mut body = Vec::new();
        body.extend_from_slice(&unsubscribe.packet_id.to_be_bytes());
        if self.version.is_v5() {
            encode_properties(&unsubscribe.properties, &mut body)?;
        }
        for index in accepted {
            put_prefixed(unsubscribe.topics[index].as_bytes(), &mut body)?;
        }

        self.frame(0xA2, &body)?;
        Ok(report)
    }

    pub fn unsuback(&mut self, unsuback: &Unsuback) -> Result<(), BuildError> {
        let mut body = Vec::new();
        body.extend_from_slice(&unsuback.packet_id.to_be_bytes());
        if self.version.is_v5() {
            encode_properties(&unsuback.properties, &mut body)?;
            body.extend_from_slice(&unsuback.reason_codes);
        }
        self.frame(0xB0, &body)
    }

    pub fn pingreq(&mut self) {
        self.buf.extend_from_slice(&[0xC0, 0x00]);
    }

    pub fn pingresp(&mut self) {
        self.buf.extend_from_slice(&[0xD0, 0x00]);
    }

    /// DISCONNECT; the short form is used whenever it says the same thing.
    pub fn disconnect(&mut self, disconnect: &Disconnect) -> Result<(), BuildError> {
        if !self.version.is_v5() || (disconnect.reason_code == 0 && disconnect.properties.is_empty())
        {
            self.buf.extend_from_slice(&[0xE0, 0x00]);
            return Ok(());
        }
        let mut body = vec![disconnect.reason_code];
        encode_properties(&disconnect.properties, &mut body)?;
        self.frame(0xE0, &body)
    }

    fn select_entries<'a, I>(&self, topics: I) -> (Vec<usize>, EntryReport)
    where
        I: Iterator<Item = &'a String>,
    {
        let mut accepted = Vec::new();
        let mut report = EntryReport::default();
        for (index, topic) in topics.enumerate() {
            if topic.len() > self.max_topic_length {
                report.rejected.push((
                    index,
                    EntryError::TopicTooLong {
                        len: topic.len(),
                        max: self.max_topic_length,
                    },
                ));
            } else if accepted.len() >= self.max_topics {
                report.rejected.push((
                    index,
                    EntryError::TooManyTopics {
                        max: self.max_topics,
                    },
                ));
            } else {
                accepted.push(index);
            }
        }
        (accepted, report)
    }

    fn frame(&mut self, first: u8, body: &[u8]) -> Result<(), BuildError> {
        let size = body.len();
        let remaining = u32::try_from(size)
            .ok()
            .filter(|&len| len <= varint::MAX_VALUE)
            .ok_or(BuildError::PacketTooLarge { size })?;

        self.buf.reserve(1 + varint::MAX_LEN + size);
        self.buf.push(first);
        varint::encode_to_vec(remaining, &mut self.buf)?;
        self.buf.extend_from_slice(body);
        Ok(())
    }
}
