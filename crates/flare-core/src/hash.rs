//! Double-SHA256 hashing.
//!
//! Block hashes, transaction identity in the relay caches, and every Merkle
//! node all use the same primitive: SHA-256 applied twice.

use sha2::{Digest, Sha256};

use crate::constants::WORK_CHECK_ZERO_BYTES;
use crate::types::Hash256;

/// Double-SHA256 of a byte range.
pub fn double_sha256(data: &[u8]) -> Hash256 {
    let first = Sha256::digest(data);
    Hash256(Sha256::digest(first).into())
}

/// Double-SHA256 of the concatenation of two 32-byte hashes.
///
/// Equivalent to `double_sha256(left ∥ right)` without materializing the
/// 64-byte buffer; this is the inner loop of the Merkle fold.
pub fn double_sha256_pair(left: &Hash256, right: &Hash256) -> Hash256 {
    let mut hasher = Sha256::new();
    hasher.update(left.as_bytes());
    hasher.update(right.as_bytes());
    let first = hasher.finalize();
    Hash256(Sha256::digest(first).into())
}

/// Work sanity floor for relayed blocks.
///
/// Any block mined at a realistic difficulty hashes with its top
/// [`WORK_CHECK_ZERO_BYTES`] bytes zero (the trailing bytes of the
/// little-endian digest). This is not difficulty validation, only a cheap
/// filter against junk headers fabricated to waste codec time.
pub fn meets_work_floor(hash: &Hash256) -> bool {
    let bytes = hash.as_bytes();
    bytes[32 - WORK_CHECK_ZERO_BYTES..].iter().all(|&b| b == 0)
}
