//! # flare-relay
//! Bidirectional block-relay compression for the Flare gossip protocol.
//!
//! A [`RelayCodec`] pairs with one peer. Transactions relayed through the
//! tx channel land in per-direction caches; when a block arrives, every
//! transaction the peer already holds is replaced by a 2-byte cache-slot
//! index, and the receiving side splices the originals back in and verifies
//! the Merkle root.

pub mod cache;
pub mod codec;
pub mod config;
pub mod tweak;

pub use cache::FlaggedTxCache;
pub use codec::{DecompressedBlock, RelayCodec};
pub use config::{CodecConfig, LimitMode};
