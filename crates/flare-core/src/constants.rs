//! Protocol constants for the Flare relay wire format and cache sizing.

/// Four-byte magic prepended to every relay message.
pub const RELAY_MAGIC: [u8; 4] = [0x46, 0x4C, 0x52, 0x45]; // "FLRE"

/// Length of the 12-byte relay message header: magic, type, length.
pub const RELAY_HEADER_LEN: usize = 12;

/// Length of the outer p2p message envelope preceding a block payload.
///
/// Block buffers handed to the compressor start with this envelope, and
/// reconstructed blocks reserve the same prefix (zeroed) for the caller
/// to fill before sending onward.
pub const P2P_HEADER_LEN: usize = 24;

/// Length of a serialized block header.
pub const BLOCK_HEADER_LEN: usize = 80;

/// Offset of the 32-byte merkle root within the block header
/// (4-byte version, 32-byte previous block hash, then the root).
pub const MERKLE_ROOT_OFFSET: usize = 36;

/// Minimum block version accepted for relay.
pub const MIN_BLOCK_VERSION: i32 = 4;

/// Trailing bytes of a block hash that must be zero to pass the work
/// sanity check.
pub const WORK_CHECK_ZERO_BYTES: usize = 7;

/// Upper bound on transactions in a relayed block.
pub const MAX_BLOCK_TRANSACTIONS: u64 = 100_000;

/// Upper bound on a single raw transaction read back during decompression.
pub const MAX_DECOMPRESS_TX_BYTES: u32 = 1_000_000;

/// Wire sentinel marking a raw (uncached) transaction entry. Live cache
/// slot indices are always strictly below this value.
pub const RAW_TX_SENTINEL: u16 = 0xFFFF;

/// Largest admissible transaction in standard limit mode.
pub const MAX_RELAY_TRANSACTION_BYTES: u32 = 1_000_000;

/// Largest non-oversize transaction in legacy limit mode.
pub const LEGACY_MAX_RELAY_TRANSACTION_BYTES: u32 = 10_000;

/// Largest oversize transaction admissible in legacy limit mode.
pub const LEGACY_MAX_OVERSIZE_TRANSACTION_BYTES: u32 = 250_000;

/// Cap on oversize entries held per cache in legacy limit mode.
pub const LEGACY_MAX_OVERSIZE_ENTRIES: usize = 250;

/// Default per-direction transaction cache capacity.
pub const DEFAULT_TX_CACHE_CAPACITY: usize = 10_000;

/// Hard cap on cache capacity so every live slot index stays below
/// [`RAW_TX_SENTINEL`].
pub const MAX_TX_CACHE_CAPACITY: usize = 0xFFFF;
