//! Bounds-checked wire parsing and relay message framing.
//!
//! Block payloads come from untrusted peers, so every read goes through
//! [`ByteCursor`], which returns [`WireError`] instead of slicing past the
//! end of the buffer. Varints use the compact-size encoding: one byte below
//! `0xFD`, then 2-, 4-, or 8-byte little-endian forms tagged `0xFD`/`0xFE`/
//! `0xFF`.

use crate::constants::{RELAY_HEADER_LEN, RELAY_MAGIC};
use crate::error::WireError;
use crate::types::MessageType;

/// A forward-only reader over an untrusted byte buffer.
#[derive(Debug)]
pub struct ByteCursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Current offset from the start of the buffer.
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Bytes left to read.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Consume `n` bytes and return them.
    pub fn take(&mut self, n: usize) -> Result<&'a [u8], WireError> {
        if n > self.remaining() {
            return Err(WireError);
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    /// Consume `n` bytes without looking at them.
    pub fn skip(&mut self, n: usize) -> Result<(), WireError> {
        self.take(n).map(|_| ())
    }

    /// Read a little-endian i32 (block header version field).
    pub fn read_i32_le(&mut self) -> Result<i32, WireError> {
        let b = self.take(4)?;
        Ok(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Read a compact-size varint.
    ///
    /// Non-minimal encodings are accepted; the value, not the encoding, is
    /// what the parser acts on.
    pub fn read_varint(&mut self) -> Result<u64, WireError> {
        let tag = self.take(1)?[0];
        match tag {
            0xFD => {
                let b = self.take(2)?;
                Ok(u64::from(u16::from_le_bytes([b[0], b[1]])))
            }
            0xFE => {
                let b = self.take(4)?;
                Ok(u64::from(u32::from_le_bytes([b[0], b[1], b[2], b[3]])))
            }
            0xFF => {
                let b = self.take(8)?;
                Ok(u64::from_le_bytes([
                    b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
                ]))
            }
            n => Ok(u64::from(n)),
        }
    }
}

/// Append the compact-size encoding of `value`.
pub fn write_varint(out: &mut Vec<u8>, value: u64) {
    match value {
        0..=0xFC => out.push(value as u8),
        0xFD..=0xFFFF => {
            out.push(0xFD);
            out.extend_from_slice(&(value as u16).to_le_bytes());
        }
        0x1_0000..=0xFFFF_FFFF => {
            out.push(0xFE);
            out.extend_from_slice(&(value as u32).to_le_bytes());
        }
        _ => {
            out.push(0xFF);
            out.extend_from_slice(&value.to_le_bytes());
        }
    }
}

/// Append `value` as a 3-byte big-endian length. Truncates to 24 bits.
pub fn put_u24_be(out: &mut Vec<u8>, value: u32) {
    out.push((value >> 16) as u8);
    out.push((value >> 8) as u8);
    out.push(value as u8);
}

/// Build the 12-byte relay header: magic ∥ type ∥ big-endian length.
///
/// For [`MessageType::Block`] the length field carries the transaction
/// count; for [`MessageType::Transaction`] it carries the payload size.
pub fn relay_header(msg_type: MessageType, length: u32) -> [u8; RELAY_HEADER_LEN] {
    let mut header = [0u8; RELAY_HEADER_LEN];
    header[..4].copy_from_slice(&RELAY_MAGIC);
    header[4..8].copy_from_slice(&msg_type.wire_value().to_be_bytes());
    header[8..].copy_from_slice(&length.to_be_bytes());
    header
}
