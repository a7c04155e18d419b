//! Core value types: hashes and relay message discriminants.
//!
//! Transactions and blocks travel through the codec as opaque byte slices;
//! the only structured values the protocol exchanges are 32-byte double-SHA256
//! hashes and the relay message type field.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A 32-byte double-SHA256 hash.
///
/// Used for block header hashes, transaction identity in the relay caches,
/// and Merkle tree nodes.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
    bincode::Encode, bincode::Decode,
)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    /// The zero hash (32 zero bytes).
    pub const ZERO: Self = Self([0u8; 32]);

    /// Create a Hash256 from a byte array.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Return the underlying bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Check if this is the zero hash.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl From<[u8; 32]> for Hash256 {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Hash256 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Relay message type, carried big-endian in the second field of the
/// 12-byte relay header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    /// A compressed block. The header length field holds the tx count.
    Block,
    /// A relayed transaction. The header length field holds the payload size.
    Transaction,
}

impl MessageType {
    /// The u32 written to the wire for this type.
    pub fn wire_value(self) -> u32 {
        match self {
            Self::Block => 1,
            Self::Transaction => 2,
        }
    }

    /// Parse a wire value back into a message type.
    pub fn from_wire(value: u32) -> Option<Self> {
        match value {
            1 => Some(Self::Block),
            2 => Some(Self::Transaction),
            _ => None,
        }
    }
}
