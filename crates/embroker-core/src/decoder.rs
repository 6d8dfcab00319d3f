//! Cursor over one framed packet.
//!
//! Every parser reads through a [`Decoder`]; each read checks the bytes left
//! before touching the buffer and fails with `IncompleteData` instead of
//! indexing past the end.

use bytes::Bytes;

use crate::error::ParseError;
use crate::packet::{PacketType, QoS};
use crate::varint;

/// Read cursor over an immutable byte slice.
#[derive(Debug, Clone)]
pub struct Decoder<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes consumed so far.
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn read_u8(&mut self) -> Result<u8, ParseError> {
        let byte = *self.buf.get(self.pos).ok_or(ParseError::IncompleteData)?;
        self.pos += 1;
        Ok(byte)
    }

    pub fn read_u16(&mut self) -> Result<u16, ParseError> {
        let bytes = self.read_bytes(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_u32(&mut self) -> Result<u32, ParseError> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], ParseError> {
        if self.remaining() < len {
            return Err(ParseError::IncompleteData);
        }
        let bytes = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    /// Everything left in the buffer.
    pub fn read_rest(&mut self) -> &'a [u8] {
        let bytes = &self.buf[self.pos..];
        self.pos = self.buf.len();
        bytes
    }

    /// Length-prefixed UTF-8 string.
    pub fn read_string(&mut self) -> Result<String, ParseError> {
        let len = self.read_u16()? as usize;
        let bytes = self.read_bytes(len)?;
        // MQTT-1.5.3-2: UTF-8 string MUST NOT contain null character U+0000
        if bytes.contains(&0u8) {
            return Err(ParseError::InvalidMessageStructure);
        }
        String::from_utf8(bytes.to_vec()).map_err(|_| ParseError::InvalidMessageStructure)
    }

    /// Length-prefixed binary data.
    pub fn read_binary(&mut self) -> Result<Bytes, ParseError> {
        let len = self.read_u16()? as usize;
        let bytes = self.read_bytes(len)?;
        Ok(Bytes::copy_from_slice(bytes))
    }

    pub fn read_variable_byte_integer(&mut self) -> Result<u32, ParseError> {
        match varint::decode(&self.buf[self.pos..])? {
            Some((value, consumed)) => {
                self.pos += consumed;
                Ok(value)
            }
            None => Err(ParseError::IncompleteData),
        }
    }
}

/// First byte plus Remaining Length of a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedHeader {
    pub packet_type: PacketType,
    pub flags: u8,
    pub remaining_length: u32,
}

impl FixedHeader {
    /// Read the fixed header of a framed packet.
    ///
    /// Checks that the type nibble is `expected`, that the flag nibble is
    /// legal for that type, and that exactly `remaining_length` bytes follow.
    pub fn read(dec: &mut Decoder<'_>, expected: PacketType) -> Result<Self, ParseError> {
        let first = dec.read_u8()?;
        if first >> 4 != expected as u8 {
            return Err(ParseError::InvalidPacketType);
        }

        let remaining_length = dec.read_variable_byte_integer()?;
        if dec.remaining() != remaining_length as usize {
            return Err(ParseError::InvalidRemainingLength);
        }

        let flags = first & 0x0F;
        check_flags(expected, flags)?;

        Ok(Self {
            packet_type: expected,
            flags,
            remaining_length,
        })
    }
}

fn check_flags(packet_type: PacketType, flags: u8) -> Result<(), ParseError> {
    let legal = match packet_type {
        // DUP, QoS and RETAIN; QoS 3 is reserved
        PacketType::Publish => QoS::try_from((flags >> 1) & 0x03).is_ok(),
        // MQTT-3.6.1-1, MQTT-3.8.1-1, MQTT-3.10.1-1
        PacketType::Pubrel | PacketType::Subscribe | PacketType::Unsubscribe => flags == 0x02,
        _ => flags == 0x00,
    };
    if legal {
        Ok(())
    } else {
        Err(ParseError::InvalidMessageStructure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_advance_cursor() {
        let buf = [0x01, 0x00, 0x02, 0x00, 0x00, 0x00, 0x03];
        let mut dec = Decoder::new(&buf);
        assert_eq!(dec.read_u8().unwrap(), 1);
        assert_eq!(dec.read_u16().unwrap(), 2);
        assert_eq!(dec.read_u32().unwrap(), 3);
        assert!(dec.is_empty());
        assert_eq!(dec.position(), 7);
    }

    #[test]
    fn test_under_read_is_incomplete() {
        let mut dec = Decoder::new(&[0x00]);
        assert_eq!(dec.read_u16(), Err(ParseError::IncompleteData));

        // String length prefix claims more bytes than exist
        let mut dec = Decoder::new(&[0x00, 0x05, b'a', b'b']);
        assert_eq!(dec.read_string(), Err(ParseError::IncompleteData));
    }

    #[test]
    fn test_string_rejects_nul_and_bad_utf8() {
        let mut dec = Decoder::new(&[0x00, 0x02, b'a', 0x00]);
        assert_eq!(dec.read_string(), Err(ParseError::InvalidMessageStructure));

        let mut dec = Decoder::new(&[0x00, 0x02, 0xC3, 0x28]);
        assert_eq!(dec.read_string(), Err(ParseError::InvalidMessageStructure));
    }

    #[test]
    fn test_fixed_header() {
        let buf = [0x62, 0x02, 0x00, 0x01];
        let mut dec = Decoder::new(&buf);
        let header = FixedHeader::read(&mut dec, PacketType::Pubrel).unwrap();
        assert_eq!(header.flags, 0x02);
        assert_eq!(header.remaining_length, 2);
        assert_eq!(dec.remaining(), 2);
    }

    #[test]
    fn test_fixed_header_errors() {
        let mut dec = Decoder::new(&[0x30, 0x00]);
        assert_eq!(
            FixedHeader::read(&mut dec, PacketType::Connack),
            Err(ParseError::InvalidPacketType)
        );

        let mut dec = Decoder::new(&[0x60, 0x02, 0x00, 0x01]);
        assert_eq!(
            FixedHeader::read(&mut dec, PacketType::Pubrel),
            Err(ParseError::InvalidMessageStructure)
        );

        let mut dec = Decoder::new(&[0x20, 0x03, 0x00, 0x00]);
        assert_eq!(
            FixedHeader::read(&mut dec, PacketType::Connack),
            Err(ParseError::InvalidRemainingLength)
        );

        let mut dec = Decoder::new(&[0x20]);
        assert_eq!(
            FixedHeader::read(&mut dec, PacketType::Connack),
            Err(ParseError::IncompleteData)
        );

        let mut dec = Decoder::new(&[0x36, 0x00]);
        assert_eq!(
            FixedHeader::read(&mut dec, PacketType::Publish),
            Err(ParseError::InvalidMessageStructure)
        );
    }
}
