//! Transport seam between the network layer and the broker.
//!
//! The network layer reports what happened as [`TransportEvent`]s and the
//! broker answers through the [`Transport`] trait. [`FrameBuffer`] turns a
//! byte stream into whole MQTT packets.

use std::net::SocketAddr;

use bytes::{Bytes, BytesMut};
use thiserror::Error;

use embroker_core::parser::frame_len;
use embroker_core::ParseError;

use crate::slots::SessionId;

/// Something that happened on a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A new connection was accepted.
    Connected { peer: SocketAddr },
    /// One complete MQTT packet arrived.
    Data { session: SessionId, frame: Bytes },
    /// The stream could not be split into packets.
    Malformed { session: SessionId, error: FrameError },
    /// Everything queued for the session was written out.
    Sent { session: SessionId },
    /// The peer closed the connection or it failed.
    Closed { session: SessionId },
}

/// Outbound half of a transport.
pub trait Transport {
    /// Queue bytes for the session's connection.
    fn send(&mut self, session: SessionId, data: Bytes);

    /// Close the session's connection. Closing an unknown or already closed
    /// session does nothing.
    fn close(&mut self, session: SessionId);
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    #[error("malformed fixed header: {0}")]
    Malformed(#[from] ParseError),

    #[error("packet of {size} bytes exceeds maximum of {max}")]
    TooLarge { size: usize, max: usize },
}

/// Receive buffer that yields whole packets.
#[derive(Debug)]
pub struct FrameBuffer {
    buf: BytesMut,
    max_packet_size: usize,
}

impl FrameBuffer {
    pub fn new(max_packet_size: u32) -> Self {
        let max_packet_size = max_packet_size as usize;
        Self {
            buf: BytesMut::with_capacity(max_packet_size.min(4096)),
            max_packet_size,
        }
    }

    pub fn extend(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Bytes received but not yet handed out as a packet.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Split off the next complete packet, if one has fully arrived.
    pub fn next_frame(&mut self) -> Result<Option<Bytes>, FrameError> {
        let Some(size) = frame_len(&self.buf)? else {
            return Ok(None);
        };
        if size > self.max_packet_size {
            return Err(FrameError::TooLarge {
                size,
                max: self.max_packet_size,
            });
        }
        if self.buf.len() < size {
            return Ok(None);
        }
        Ok(Some(self.buf.split_to(size).freeze()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_splits_stream_into_packets() {
        let mut frames = FrameBuffer::new(2048);
        frames.extend(&[0xC0, 0x00, 0x40, 0x02, 0x00]);
        assert_eq!(
            frames.next_frame(),
            Ok(Some(Bytes::from_static(&[0xC0, 0x00])))
        );
        // PUBACK still missing its last byte
        assert_eq!(frames.next_frame(), Ok(None));
        frames.extend(&[0x01, 0xE0]);
        assert_eq!(
            frames.next_frame(),
            Ok(Some(Bytes::from_static(&[0x40, 0x02, 0x00, 0x01])))
        );
        // Header byte alone is not enough to size the packet
        assert_eq!(frames.next_frame(), Ok(None));
        assert_eq!(frames.buffered(), 1);
        frames.extend(&[0x00]);
        assert_eq!(
            frames.next_frame(),
            Ok(Some(Bytes::from_static(&[0xE0, 0x00])))
        );
        assert_eq!(frames.buffered(), 0);
    }

    #[test]
    fn test_multi_byte_remaining_length() {
        let mut frames = FrameBuffer::new(2048);
        let mut packet = vec![0x30, 0xC8, 0x01];
        packet.extend(std::iter::repeat(0u8).take(200));
        frames.extend(&packet[..100]);
        assert_eq!(frames.next_frame(), Ok(None));
        frames.extend(&packet[100..]);
        assert_eq!(frames.next_frame().unwrap().map(|f| f.len()), Some(203));
    }

    #[test]
    fn test_rejects_oversized_packet() {
        let mut frames = FrameBuffer::new(64);
        frames.extend(&[0x30, 0xC8, 0x01]);
        assert_eq!(
            frames.next_frame(),
            Err(FrameError::TooLarge { size: 203, max: 64 })
        );
    }

    #[test]
    fn test_rejects_bad_length_encoding() {
        let mut frames = FrameBuffer::new(2048);
        frames.extend(&[0x30, 0xFF, 0xFF, 0xFF, 0xFF, 0x01]);
        assert!(matches!(frames.next_frame(), Err(FrameError::Malformed(_))));
    }
}
