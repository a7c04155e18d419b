//! Bounded, slot-indexed transaction cache.
//!
//! One instance tracks each relay direction: the send cache holds what this
//! side has relayed to the peer, the recv cache what the peer has relayed
//! here. Entries keep insertion order and are addressed by their live slot
//! index — 0 is the oldest — so both peers agree on the numbering as long as
//! they apply the same additions and removals. Every removal renumbers the
//! survivors downward immediately; a caller that removes slot 3 from a
//! ten-entry cache will find the former slot 4 at index 3 on its next call.
//!
//! Capacity is bounded; inserting into a full cache evicts the oldest entry.
//! A subset of entries can be flagged oversize, counted separately so the
//! legacy admission gates can cap how many oversize transactions a peer may
//! park here.
//!
//! Content identity is the transaction's double-SHA256, which doubles as the
//! hash-lookup key.

use std::collections::{HashMap, VecDeque};

use flare_core::constants::MAX_TX_CACHE_CAPACITY;
use flare_core::hash::double_sha256;
use flare_core::types::Hash256;

#[derive(Debug)]
struct CacheEntry {
    data: Vec<u8>,
    hash: Hash256,
    /// Monotonic insertion counter; the deque stays sorted by it, which is
    /// what lets a hash lookup recover its live position.
    seq: u64,
    oversize: bool,
}

/// Insertion-ordered transaction cache with slot-index addressing and an
/// independently capped oversize subset.
#[derive(Debug)]
pub struct FlaggedTxCache {
    entries: VecDeque<CacheEntry>,
    by_hash: HashMap<Hash256, u64>,
    capacity: usize,
    max_flagged: usize,
    flagged: usize,
    next_seq: u64,
}

impl FlaggedTxCache {
    /// Create a cache holding at most `capacity` transactions, of which at
    /// most `max_flagged` may be flagged oversize.
    ///
    /// `capacity` is clamped to `1..=`[`MAX_TX_CACHE_CAPACITY`] so that every
    /// live slot index fits in a `u16` below the raw-tx wire sentinel.
    pub fn new(capacity: usize, max_flagged: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            by_hash: HashMap::new(),
            capacity: capacity.clamp(1, MAX_TX_CACHE_CAPACITY),
            max_flagged,
            flagged: 0,
            next_seq: 0,
        }
    }

    /// Number of transactions currently held.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no transactions.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The (clamped) capacity this cache was created with.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of entries currently flagged oversize.
    pub fn flag_count(&self) -> usize {
        self.flagged
    }

    /// Cap on oversize entries this cache was created with.
    pub fn max_flag_count(&self) -> usize {
        self.max_flagged
    }

    /// Exact-content membership.
    pub fn contains(&self, tx: &[u8]) -> bool {
        self.contains_hash(&double_sha256(tx))
    }

    /// Membership by transaction double-SHA256.
    pub fn contains_hash(&self, hash: &Hash256) -> bool {
        self.by_hash.contains_key(hash)
    }

    /// Append a transaction at the next slot, evicting the oldest entry if
    /// the cache is full. Adding content already present is a no-op.
    ///
    /// The caller decides `oversize` from its admission gates; the cache
    /// only counts the flag.
    pub fn add(&mut self, tx: Vec<u8>, oversize: bool) {
        let hash = double_sha256(&tx);
        if self.by_hash.contains_key(&hash) {
            return;
        }
        while self.entries.len() >= self.capacity {
            self.evict_oldest();
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.by_hash.insert(hash, seq);
        if oversize {
            self.flagged += 1;
        }
        self.entries.push_back(CacheEntry {
            data: tx,
            hash,
            seq,
            oversize,
        });
    }

    /// Remove a transaction by exact content.
    ///
    /// Returns the slot index the transaction held at the moment of removal,
    /// or `None` if absent. Surviving entries above the slot renumber down
    /// by one.
    pub fn remove_by_content(&mut self, tx: &[u8]) -> Option<u16> {
        let hash = double_sha256(tx);
        let seq = self.by_hash.remove(&hash)?;
        let pos = self.position_of(seq)?;
        if let Some(entry) = self.entries.remove(pos) {
            if entry.oversize {
                self.flagged -= 1;
            }
        }
        Some(pos as u16)
    }

    /// Remove the transaction at slot `index`, returning its bytes and
    /// double-SHA256. Returns `None` for a vacant slot. Surviving entries
    /// above the slot renumber down by one.
    pub fn remove_by_index(&mut self, index: u16) -> Option<(Vec<u8>, Hash256)> {
        let entry = self.entries.remove(usize::from(index))?;
        self.by_hash.remove(&entry.hash);
        if entry.oversize {
            self.flagged -= 1;
        }
        Some((entry.data, entry.hash))
    }

    /// Visit every held transaction in insertion order.
    pub fn for_each(&self, mut f: impl FnMut(&[u8])) {
        for entry in &self.entries {
            f(&entry.data);
        }
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.by_hash.clear();
        self.flagged = 0;
    }

    /// Live position of the entry with insertion counter `seq`.
    fn position_of(&self, seq: u64) -> Option<usize> {
        self.entries
            .binary_search_by(|entry| entry.seq.cmp(&seq))
            .ok()
    }

    fn evict_oldest(&mut self) {
        if let Some(entry) = self.entries.pop_front() {
            self.by_hash.remove(&entry.hash);
            if entry.oversize {
                self.flagged -= 1;
            }
        }
    }
}
