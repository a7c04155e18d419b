//! Error types for the Flare protocol.
//!
//! Codec errors are returned as values; nothing panics on adversarial input.
//! The `Display` strings are part of the wire-facing contract — peers and
//! operators key on them — so they are fixed tags, not free-form prose.

use thiserror::Error;

/// Raised by the byte walker when a read would run past the end of the buffer.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("read past end of buffer")]
pub struct WireError;

/// Compression failures. One tag per outcome of `compress_block`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompressError {
    #[error("BAD_WORK")] BadWork,
    #[error("SEEN")] AlreadySeen,
    #[error("SMALL_VERSION")] SmallVersion,
    #[error("TXCOUNT_RANGE")] TxCountRange,
    #[error("INVALID_SIZE")] InvalidSize,
    #[error("INVALID_MERKLE")] InvalidMerkle,
    /// The block-seen check at entry and the insert at exit disagreed while
    /// the codec mutex was held. Impossible absent a bug; treat as an
    /// assertion failure, not a network error.
    #[error("MUTEX_BROKEN???")] SeenSetBroken,
}

impl From<WireError> for CompressError {
    fn from(_: WireError) -> Self {
        CompressError::InvalidSize
    }
}

/// Decompression failures. One tag per read site or validation step.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecompressError {
    #[error("got a BLOCK message with far too many transactions")] TooManyTransactions,
    #[error("failed to read block header")] HeaderRead,
    #[error("block had version < 4")] SmallVersion,
    #[error("block hash did not meet minimum difficulty target")] BadWork,
    #[error("failed to read tx index")] IndexRead,
    #[error("failed to read tx length")] LengthRead,
    #[error("got unreasonably large tx")] OversizeTx,
    #[error("failed to read transaction data")] TxDataRead,
    #[error("failed to find referenced transaction")] UnknownIndex,
    #[error("merkle tree root did not match")] MerkleMismatch,
}

/// A transaction rejected by the relay admission gates.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdmissionError {
    #[error("transaction of {size} bytes exceeds relay size limits")]
    Oversize { size: u32 },
}

/// Umbrella error for callers that funnel every codec failure into one type.
#[derive(Error, Debug)]
pub enum FlareError {
    #[error(transparent)] Compress(#[from] CompressError),
    #[error(transparent)] Decompress(#[from] DecompressError),
    #[error(transparent)] Admission(#[from] AdmissionError),
}
