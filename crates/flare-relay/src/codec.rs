//! The relay codec: block compression, decompression, and tx-relay admission.
//!
//! A [`RelayCodec`] instance pairs with exactly one peer and owns three
//! pieces of state behind a single mutex: the send-side tx cache (what we
//! relayed to the peer), the recv-side tx cache (what the peer relayed to
//! us), and the set of block hashes already processed. Every public
//! operation locks at entry and unlocks at exit; within one codec,
//! operations are strictly serialized.
//!
//! The mutex is held across the reader callback during decompression. The
//! recv cache's slot numbering must not move between the moment wire indices
//! are read and the moment the referenced transactions are pulled out, and
//! any concurrent operation on this codec could renumber it.
//!
//! Compressed block layout: a 12-byte relay header (magic ∥ type ∥
//! big-endian tx count), the original 80-byte block header, then one entry
//! per transaction — either a 2-byte big-endian cache-slot index, or the
//! `0xFFFF` sentinel followed by a 3-byte big-endian length and the raw
//! transaction bytes.

use std::collections::HashSet;
use std::io::Read;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use flare_core::constants::{
    BLOCK_HEADER_LEN, LEGACY_MAX_OVERSIZE_ENTRIES, LEGACY_MAX_OVERSIZE_TRANSACTION_BYTES,
    LEGACY_MAX_RELAY_TRANSACTION_BYTES, MAX_BLOCK_TRANSACTIONS, MAX_DECOMPRESS_TX_BYTES,
    MAX_RELAY_TRANSACTION_BYTES, MERKLE_ROOT_OFFSET, MIN_BLOCK_VERSION, P2P_HEADER_LEN,
    RAW_TX_SENTINEL, RELAY_HEADER_LEN,
};
use flare_core::error::{AdmissionError, CompressError, DecompressError};
use flare_core::hash::{double_sha256, meets_work_floor};
use flare_core::merkle::MerkleTreeBuilder;
use flare_core::types::{Hash256, MessageType};
use flare_core::wire::{put_u24_be, relay_header, write_varint, ByteCursor};

use crate::cache::FlaggedTxCache;
use crate::config::{CodecConfig, LimitMode};
use crate::tweak::{tweak_sort, IndexedTx};

/// A block reconstructed by [`RelayCodec::decompress_block`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecompressedBlock {
    /// Total size of the compressed message: the 12-byte relay header the
    /// caller consumed plus every byte read from the reader here. Reported
    /// for bandwidth accounting.
    pub wire_bytes: u64,
    /// The reconstructed block. The first [`P2P_HEADER_LEN`] bytes are left
    /// zeroed for the caller to fill with its outer message envelope; the
    /// 80-byte block header, tx-count varint, and transactions follow.
    pub block: Vec<u8>,
    /// Double-SHA256 of the 80-byte block header.
    pub hash: Hash256,
}

/// Per-peer state guarded by the codec mutex.
struct CodecState {
    send_cache: FlaggedTxCache,
    recv_cache: FlaggedTxCache,
    blocks_seen: HashSet<Hash256>,
}

/// Bidirectional block-relay compressor for one peer pairing.
pub struct RelayCodec {
    config: CodecConfig,
    state: Mutex<CodecState>,
}

impl Default for RelayCodec {
    fn default() -> Self {
        Self::new(CodecConfig::default())
    }
}

impl RelayCodec {
    /// Create a codec with empty caches and an empty block-seen set.
    pub fn new(config: CodecConfig) -> Self {
        let capacity = config.effective_cache_capacity();
        Self {
            config,
            state: Mutex::new(CodecState {
                send_cache: FlaggedTxCache::new(capacity, LEGACY_MAX_OVERSIZE_ENTRIES),
                recv_cache: FlaggedTxCache::new(capacity, LEGACY_MAX_OVERSIZE_ENTRIES),
                blocks_seen: HashSet::new(),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, CodecState> {
        // A panic while holding the lock leaves the state no more corrupt
        // than the panic itself; keep serving rather than poisoning forever.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ------------------------------------------------------------------
    // Transaction relay
    // ------------------------------------------------------------------

    /// Admit a transaction into the send cache and frame it for relay.
    ///
    /// Returns `None` when the peer already has the transaction (it is in
    /// the send cache) or when it fails the size gates for the configured
    /// limit mode — in both cases nothing should go on the wire.
    pub fn get_relay_transaction(&self, tx: &[u8]) -> Option<Vec<u8>> {
        let mut state = self.state();

        if state.send_cache.contains(tx) {
            return None;
        }

        match self.config.limit_mode {
            LimitMode::Standard => {
                if tx.len() > MAX_RELAY_TRANSACTION_BYTES as usize {
                    return None;
                }
                state.send_cache.add(tx.to_vec(), false);
            }
            LimitMode::Legacy => {
                let oversize = tx.len() > LEGACY_MAX_RELAY_TRANSACTION_BYTES as usize;
                if oversize
                    && (state.send_cache.flag_count() >= LEGACY_MAX_OVERSIZE_ENTRIES
                        || tx.len() > LEGACY_MAX_OVERSIZE_TRANSACTION_BYTES as usize)
                {
                    return None;
                }
                state.send_cache.add(tx.to_vec(), oversize);
            }
        }

        let mut msg = Vec::with_capacity(RELAY_HEADER_LEN + tx.len());
        msg.extend_from_slice(&relay_header(MessageType::Transaction, tx.len() as u32));
        msg.extend_from_slice(tx);
        Some(msg)
    }

    /// Whether a transaction of `tx_size` bytes would be admitted into the
    /// recv cache right now.
    pub fn maybe_recv_tx_of_size(&self, tx_size: u32) -> bool {
        let state = self.state();
        let admissible = self.recv_admissible(&state, tx_size as usize);
        if !admissible {
            debug!(
                tx_size,
                oversize_held = state.recv_cache.flag_count(),
                "refusing freely relayed transaction"
            );
        }
        admissible
    }

    /// Admit a transaction the peer relayed to us into the recv cache.
    ///
    /// Succeeds exactly when [`maybe_recv_tx_of_size`](Self::maybe_recv_tx_of_size)
    /// returns `true` for its size against the same state.
    pub fn recv_tx(&self, tx: Vec<u8>) -> Result<(), AdmissionError> {
        let mut state = self.state();
        if !self.recv_admissible(&state, tx.len()) {
            return Err(AdmissionError::Oversize {
                size: tx.len() as u32,
            });
        }
        let oversize = match self.config.limit_mode {
            LimitMode::Standard => false,
            LimitMode::Legacy => tx.len() > LEGACY_MAX_RELAY_TRANSACTION_BYTES as usize,
        };
        state.recv_cache.add(tx, oversize);
        Ok(())
    }

    fn recv_admissible(&self, state: &CodecState, tx_size: usize) -> bool {
        match self.config.limit_mode {
            LimitMode::Standard => tx_size <= MAX_RELAY_TRANSACTION_BYTES as usize,
            LimitMode::Legacy => {
                tx_size <= LEGACY_MAX_RELAY_TRANSACTION_BYTES as usize
                    || (state.recv_cache.flag_count() < LEGACY_MAX_OVERSIZE_ENTRIES
                        && tx_size <= LEGACY_MAX_OVERSIZE_TRANSACTION_BYTES as usize)
            }
        }
    }

    /// Visit every transaction currently in the send cache, oldest first.
    pub fn for_each_sent_tx(&self, f: impl FnMut(&[u8])) {
        self.state().send_cache.for_each(f);
    }

    /// Whether a transaction with this double-SHA256 sits in the send cache.
    pub fn was_tx_sent(&self, tx_hash: &Hash256) -> bool {
        self.state().send_cache.contains_hash(tx_hash)
    }

    // ------------------------------------------------------------------
    // Block bookkeeping
    // ------------------------------------------------------------------

    /// Record a block hash as processed. Returns `true` if it was new.
    pub fn block_sent(&self, hash: Hash256) -> bool {
        self.state().blocks_seen.insert(hash)
    }

    /// Number of distinct block hashes processed so far.
    pub fn blocks_sent(&self) -> usize {
        self.state().blocks_seen.len()
    }

    /// Empty both tx caches. The block-seen set survives: a reconnecting
    /// peer renegotiates its tx state but never needs a block twice.
    pub fn reset(&self) {
        let mut state = self.state();
        state.send_cache.clear();
        state.recv_cache.clear();
    }

    // ------------------------------------------------------------------
    // Compression
    // ------------------------------------------------------------------

    /// Compress an outbound block for this peer.
    ///
    /// `block_msg` is the full block message as received: a
    /// [`P2P_HEADER_LEN`]-byte outer envelope, the 80-byte block header, a
    /// tx-count varint, and the transactions. `hash` is the block's header
    /// double-SHA256, computed by the caller.
    ///
    /// Each transaction found in the send cache is removed from it and
    /// replaced by its slot index; everything else is emitted raw. With
    /// `check_merkle`, the hash must pass the work floor and the
    /// transactions must fold to the header's Merkle root.
    ///
    /// Errors carry the protocol's stable tags. Cache removals performed
    /// before a mid-parse failure stay removed.
    pub fn compress_block(
        &self,
        hash: &Hash256,
        block_msg: &[u8],
        check_merkle: bool,
    ) -> Result<Vec<u8>, CompressError> {
        let mut state = self.state();

        if check_merkle && !meets_work_floor(hash) {
            return Err(CompressError::BadWork);
        }
        if state.blocks_seen.contains(hash) {
            return Err(CompressError::AlreadySeen);
        }

        let compressed =
            Self::compress_inner(&self.config, &mut state.send_cache, block_msg, check_merkle)?;

        if !state.blocks_seen.insert(*hash) {
            // Checked absent above, inserted here, mutex held throughout.
            return Err(CompressError::SeenSetBroken);
        }
        Ok(compressed)
    }

    fn compress_inner(
        config: &CodecConfig,
        send_cache: &mut FlaggedTxCache,
        msg: &[u8],
        check_merkle: bool,
    ) -> Result<Vec<u8>, CompressError> {
        let mut cur = ByteCursor::new(msg);
        cur.skip(P2P_HEADER_LEN)?;

        let version = cur.read_i32_le()?;
        if config.enforce_block_version && version < MIN_BLOCK_VERSION {
            return Err(CompressError::SmallVersion);
        }

        cur.skip(32)?; // previous block hash
        let merkle_root_off = cur.pos();
        cur.skip(BLOCK_HEADER_LEN - (4 + 32))?;

        let tx_count = cur.read_varint()?;
        if tx_count < 1 || tx_count > MAX_BLOCK_TRANSACTIONS {
            return Err(CompressError::TxCountRange);
        }

        let mut out = Vec::with_capacity(msg.len() + RELAY_HEADER_LEN);
        out.extend_from_slice(&relay_header(MessageType::Block, tx_count as u32));
        out.extend_from_slice(&msg[P2P_HEADER_LEN..P2P_HEADER_LEN + BLOCK_HEADER_LEN]);

        let mut merkle = MerkleTreeBuilder::new(if check_merkle { tx_count as usize } else { 0 });

        for i in 0..tx_count {
            let tx_start = cur.pos();

            cur.skip(4)?; // tx version
            let n_inputs = cur.read_varint()?;
            for _ in 0..n_inputs {
                cur.skip(36)?; // outpoint
                let script_len = cur.read_varint()?;
                cur.skip(script_len as usize)?;
                cur.skip(4)?; // sequence
            }
            let n_outputs = cur.read_varint()?;
            for _ in 0..n_outputs {
                cur.skip(8)?; // value
                let script_len = cur.read_varint()?;
                cur.skip(script_len as usize)?;
            }
            cur.skip(4)?; // locktime

            let tx_bytes = &msg[tx_start..cur.pos()];

            if check_merkle {
                merkle.set(i as usize, double_sha256(tx_bytes));
            }

            match send_cache.remove_by_content(tx_bytes) {
                Some(slot) => out.extend_from_slice(&slot.to_be_bytes()),
                None => {
                    out.extend_from_slice(&RAW_TX_SENTINEL.to_be_bytes());
                    put_u24_be(&mut out, tx_bytes.len() as u32);
                    out.extend_from_slice(tx_bytes);
                }
            }
        }

        if check_merkle {
            let mut expected = [0u8; 32];
            expected.copy_from_slice(&msg[merkle_root_off..merkle_root_off + 32]);
            if !merkle.root_matches(&Hash256(expected)) {
                return Err(CompressError::InvalidMerkle);
            }
        }

        debug!(
            tx_count,
            block_bytes = msg.len(),
            compressed_bytes = out.len(),
            "compressed relay block"
        );
        Ok(out)
    }

    // ------------------------------------------------------------------
    // Decompression
    // ------------------------------------------------------------------

    /// Reconstruct a block from a compressed stream.
    ///
    /// The caller has already consumed the 12-byte relay header and passes
    /// its length field as `tx_count`; `reader` is positioned at the 80-byte
    /// block header. Reads block until the message is complete — the codec
    /// mutex is held across them so the recv cache cannot renumber under the
    /// wire's slot references.
    ///
    /// The block hash is recorded as seen before Merkle validation runs, so
    /// a block that later fails validation is not re-requested and
    /// re-parsed; callers relying on [`compress_block`](Self::compress_block)
    /// returning `SEEN` should be aware the hash may belong to a block that
    /// never validated.
    ///
    /// With `check_merkle`, the computed block hash must pass the work floor
    /// and the reassembled transactions must fold to the header's root.
    pub fn decompress_block<R: Read>(
        &self,
        reader: &mut R,
        tx_count: u32,
        check_merkle: bool,
    ) -> Result<DecompressedBlock, DecompressError> {
        let mut state = self.state();

        if u64::from(tx_count) > MAX_BLOCK_TRANSACTIONS {
            return Err(DecompressError::TooManyTransactions);
        }

        let mut wire_bytes = RELAY_HEADER_LEN as u64;
        let mut block = vec![0u8; P2P_HEADER_LEN + BLOCK_HEADER_LEN];
        reader
            .read_exact(&mut block[P2P_HEADER_LEN..])
            .map_err(|_| DecompressError::HeaderRead)?;
        wire_bytes += BLOCK_HEADER_LEN as u64;

        if self.config.enforce_block_version {
            let version = i32::from_le_bytes([
                block[P2P_HEADER_LEN],
                block[P2P_HEADER_LEN + 1],
                block[P2P_HEADER_LEN + 2],
                block[P2P_HEADER_LEN + 3],
            ]);
            if version < MIN_BLOCK_VERSION {
                return Err(DecompressError::SmallVersion);
            }
        }

        let hash = double_sha256(&block[P2P_HEADER_LEN..]);
        state.blocks_seen.insert(hash);

        if check_merkle && !meets_work_floor(&hash) {
            return Err(DecompressError::BadWork);
        }

        write_varint(&mut block, u64::from(tx_count));

        let mut merkle = MerkleTreeBuilder::new(if check_merkle { tx_count as usize } else { 0 });
        let mut txn_data: Vec<Vec<u8>> = vec![Vec::new(); tx_count as usize];
        let mut pending: Vec<IndexedTx> = Vec::with_capacity(tx_count as usize);

        for i in 0..tx_count as usize {
            let mut index_buf = [0u8; 2];
            reader
                .read_exact(&mut index_buf)
                .map_err(|_| DecompressError::IndexRead)?;
            wire_bytes += 2;
            let index = u16::from_be_bytes(index_buf);

            if index == RAW_TX_SENTINEL {
                let mut len_buf = [0u8; 3];
                reader
                    .read_exact(&mut len_buf)
                    .map_err(|_| DecompressError::LengthRead)?;
                let tx_len = u32::from_be_bytes([0, len_buf[0], len_buf[1], len_buf[2]]);
                if tx_len > MAX_DECOMPRESS_TX_BYTES {
                    return Err(DecompressError::OversizeTx);
                }

                let mut data = vec![0u8; tx_len as usize];
                reader
                    .read_exact(&mut data)
                    .map_err(|_| DecompressError::TxDataRead)?;
                wire_bytes += 3 + u64::from(tx_len);

                if check_merkle {
                    merkle.set(i, double_sha256(&data));
                }
                txn_data[i] = data;
            } else {
                pending.push(IndexedTx::new(index, i));
            }
        }

        tweak_sort(&mut pending);
        for ptr in &pending {
            let (data, tx_hash) = state
                .recv_cache
                .remove_by_index(ptr.index)
                .ok_or(DecompressError::UnknownIndex)?;
            if check_merkle {
                merkle.set(ptr.pos, tx_hash);
            }
            txn_data[ptr.pos] = data;
        }

        for data in &txn_data {
            block.extend_from_slice(data);
        }

        if check_merkle {
            let root_at = P2P_HEADER_LEN + MERKLE_ROOT_OFFSET;
            let mut expected = [0u8; 32];
            expected.copy_from_slice(&block[root_at..root_at + 32]);
            if !merkle.root_matches(&Hash256(expected)) {
                return Err(DecompressError::MerkleMismatch);
            }
        }

        debug!(
            tx_count,
            wire_bytes,
            block_bytes = block.len(),
            "decompressed relay block"
        );
        Ok(DecompressedBlock {
            wire_bytes,
            block,
            hash,
        })
    }
}
