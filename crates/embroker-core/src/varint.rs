//! Variable Byte Integer encoding/decoding for MQTT.
//!
//! MQTT uses a variable-length encoding for the Remaining Length and for
//! MQTT 5 property identifiers and lengths. Each byte carries 7 bits of the
//! value, least significant group first, and the high bit says whether
//! another byte follows:
//! - 0-127: 1 byte
//! - 128-16383: 2 bytes
//! - 16384-2097151: 3 bytes
//! - 2097152-268435455: 4 bytes

use crate::error::{BuildError, ParseError};

/// Largest value the encoding can carry in its four bytes.
pub const MAX_VALUE: u32 = 268_435_455;

/// Longest legal encoding in bytes.
pub const MAX_LEN: usize = 4;

/// Decode a variable byte integer from the start of a buffer.
///
/// Returns `Ok(Some((value, bytes_consumed)))` if successful, `Ok(None)` if
/// the buffer ends before the encoding terminates, or `Err` if the fourth
/// byte still has its continuation bit set.
///
/// # Example
/// ```
/// use embroker_core::varint::decode;
/// let buf = [0x80, 0x01]; // Encodes 128
/// let (value, consumed) = decode(&buf).unwrap().unwrap();
/// assert_eq!(value, 128);
/// assert_eq!(consumed, 2);
/// ```
pub fn decode(buf: &[u8]) -> Result<Option<(u32, usize)>, ParseError> {
    let mut value = 0u32;

    for (i, &byte) in buf.iter().take(MAX_LEN).enumerate() {
        value |= u32::from(byte & 0x7F) << (7 * i);

        if byte & 0x80 == 0 {
            return Ok(Some((value, i + 1)));
        }

        if i == MAX_LEN - 1 {
            return Err(ParseError::InvalidRemainingLength);
        }
    }

    Ok(None)
}

/// Encode a value into a four byte scratch buffer.
///
/// Returns the number of bytes written.
///
/// # Example
/// ```
/// use embroker_core::varint::encode_to_slice;
/// let mut buf = [0u8; 4];
/// let written = encode_to_slice(128, &mut buf).unwrap();
/// assert_eq!(written, 2);
/// assert_eq!(&buf[..2], &[0x80, 0x01]);
/// ```
pub fn encode_to_slice(value: u32, buf: &mut [u8; MAX_LEN]) -> Result<usize, BuildError> {
    if value > MAX_VALUE {
        return Err(BuildError::VarintOutOfRange(value));
    }

    let mut value = value;
    let mut i = 0;
    loop {
        let mut byte = (value % 128) as u8;
        value /= 128;
        if value > 0 {
            byte |= 0x80;
        }
        buf[i] = byte;
        i += 1;
        if value == 0 {
            return Ok(i);
        }
    }
}

/// Encode a value, appending to a Vec.
///
/// Returns the number of bytes written.
///
/// # Example
/// ```
/// use embroker_core::varint::encode_to_vec;
/// let mut buf = Vec::new();
/// let written = encode_to_vec(300, &mut buf).unwrap();
/// assert_eq!(written, 2);
/// assert_eq!(&buf, &[0xAC, 0x02]);
/// ```
pub fn encode_to_vec(value: u32, buf: &mut Vec<u8>) -> Result<usize, BuildError> {
    let mut scratch = [0u8; MAX_LEN];
    let len = encode_to_slice(value, &mut scratch)?;
    buf.extend_from_slice(&scratch[..len]);
    Ok(len)
}

/// Number of bytes needed to encode a value.
///
/// # Example
/// ```
/// use embroker_core::varint::encoded_len;
/// assert_eq!(encoded_len(0), 1);
/// assert_eq!(encoded_len(127), 1);
/// assert_eq!(encoded_len(128), 2);
/// assert_eq!(encoded_len(16384), 3);
/// ```
pub fn encoded_len(mut value: u32) -> usize {
    let mut len = 0;
    loop {
        len += 1;
        value /= 128;
        if value == 0 {
            break;
        }
    }
    len
}
