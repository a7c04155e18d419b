//! Index-adjusting merge sort for the decompression pull schedule.
//!
//! The wire carries cache-slot references in block order, each numbered
//! against the sender's cache state at the moment that transaction was
//! removed — so a reference later in the block already reflects the
//! renumbering caused by earlier removals. The receiver instead pulls
//! transactions out in one ascending pass, where each removal shifts the
//! survivors down by one.
//!
//! [`tweak_sort`] converts between the two views. It is a plain stable merge
//! sort with one twist: when a left-half (earlier-on-the-wire) reference is
//! emitted, its index drops by the number of right-half references emitted
//! before it. Those right-half references are removals the sender performed
//! *after* this one but which the receiver will perform *before* it, and each
//! sits below it in the cache, shifting it down a slot. Ties break toward the
//! left half: equal indices mean the later reference targets the survivor
//! that slid into the slot the earlier one vacates, so wire order is removal
//! order.

/// A slot reference read from the wire: `index` is the cache slot as the
/// sender numbered it, `pos` the transaction's position in the block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexedTx {
    pub index: u16,
    pub pos: usize,
}

impl IndexedTx {
    pub fn new(index: u16, pos: usize) -> Self {
        Self { index, pos }
    }
}

/// Sort slot references into the receiver's removal schedule, rewriting each
/// `index` into the slot the entry occupies when its turn comes.
///
/// For any reference list a well-formed peer can produce, the output indices
/// are non-decreasing and feeding them to `remove_by_index` in order yields
/// the transaction belonging at each `pos`. Garbage references (out-of-range
/// or repeated slots) never panic here; the cache lookup rejects them
/// afterwards.
pub fn tweak_sort(ptrs: &mut [IndexedTx]) {
    sort_range(ptrs, 0, ptrs.len());
}

fn sort_range(ptrs: &mut [IndexedTx], start: usize, end: usize) {
    if start + 1 >= end {
        return;
    }
    let split = start + (end - start) / 2;
    sort_range(ptrs, start, split);
    sort_range(ptrs, split, end);

    let left: Vec<IndexedTx> = ptrs[start..split].to_vec();
    let mut j = 0;
    let mut k = split;
    for i in start..end {
        let consumed = k - split;
        let take_left = j < left.len()
            && (k >= end
                || (usize::from(left[j].index) >= consumed
                    && usize::from(left[j].index) - consumed <= usize::from(ptrs[k].index)));
        if take_left {
            ptrs[i] = left[j];
            ptrs[i].index = (usize::from(left[j].index).wrapping_sub(consumed)) as u16;
            j += 1;
        } else {
            ptrs[i] = ptrs[k];
            k += 1;
        }
    }
}
