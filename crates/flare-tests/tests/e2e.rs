//! End-to-end round trips through a sender/receiver codec pair.
//!
//! Each test relays transactions through the tx channel first (populating
//! the sender's send cache and the receiver's recv cache at matching slots),
//! then compresses a block on one side and reconstructs it on the other,
//! asserting byte-for-byte equality and the expected wire layout.

use flare_core::constants::{
    BLOCK_HEADER_LEN, P2P_HEADER_LEN, RELAY_HEADER_LEN,
};
use flare_core::error::{CompressError, DecompressError};
use flare_core::hash::double_sha256;
use flare_relay::{CodecConfig, DecompressedBlock, RelayCodec};
use flare_tests::helpers::*;

/// Compressed-entry region of a compressed block message.
fn entries(compressed: &[u8]) -> &[u8] {
    &compressed[RELAY_HEADER_LEN + BLOCK_HEADER_LEN..]
}

/// Run the receiver over a compressed message, checking the byte count.
fn decompress(
    receiver: &RelayCodec,
    compressed: &[u8],
    tx_count: u32,
) -> Result<DecompressedBlock, DecompressError> {
    let mut reader: &[u8] = &compressed[RELAY_HEADER_LEN..];
    let result = receiver.decompress_block(&mut reader, tx_count, false);
    if let Ok(block) = &result {
        assert_eq!(block.wire_bytes, compressed.len() as u64);
        assert!(reader.is_empty(), "decompress left unread bytes");
    }
    result
}

#[test]
fn fully_cached_block_round_trip() {
    let txs: Vec<Vec<u8>> = (0..10).map(|i| make_tx(i, 20 + i as usize)).collect();
    let (sender, receiver) = paired_codecs(&txs);

    let block = make_block(&[txs[3].clone(), txs[7].clone(), txs[0].clone()]);
    let hash = block_hash(&block);
    let compressed = sender.compress_block(&hash, &block, false).unwrap();

    // Three 2-byte entries: slot 3, then slot 6 (the former slot 7 slid
    // down past the first removal), then slot 0.
    assert_eq!(
        entries(&compressed),
        [3u16.to_be_bytes(), 6u16.to_be_bytes(), 0u16.to_be_bytes()].concat()
    );

    // The send cache lost exactly the block's transactions.
    for (i, tx) in txs.iter().enumerate() {
        let expected = !matches!(i, 0 | 3 | 7);
        assert_eq!(sender.was_tx_sent(&double_sha256(tx)), expected, "tx {i}");
    }

    let result = decompress(&receiver, &compressed, 3).unwrap();
    assert_eq!(result.block, block);
    assert_eq!(result.hash, hash);
}

#[test]
fn second_block_sees_renumbered_slots() {
    let txs: Vec<Vec<u8>> = (0..10).map(|i| make_tx(i, 25)).collect();
    let (sender, receiver) = paired_codecs(&txs);

    let first = make_block(&[txs[3].clone(), txs[7].clone(), txs[0].clone()]);
    let compressed = sender
        .compress_block(&block_hash(&first), &first, false)
        .unwrap();
    assert_eq!(decompress(&receiver, &compressed, 3).unwrap().block, first);

    // Both caches now hold T1 T2 T4 T5 T6 T8 T9 at slots 0..=6.
    let second = make_block(&[txs[1].clone(), txs[9].clone()]);
    let compressed = sender
        .compress_block(&block_hash(&second), &second, false)
        .unwrap();
    assert_eq!(
        entries(&compressed),
        [0u16.to_be_bytes(), 5u16.to_be_bytes()].concat()
    );
    assert_eq!(decompress(&receiver, &compressed, 2).unwrap().block, second);
}

#[test]
fn mixed_cached_and_novel_transactions() {
    let cached: Vec<Vec<u8>> = (0..5).map(|i| make_tx(i, 30)).collect();
    let (sender, receiver) = paired_codecs(&cached);

    // 64 bytes of fixed layout + 186 bytes of script = a 250-byte tx.
    let novel = make_tx(99, 186);
    assert_eq!(novel.len(), 250);

    let block = make_block(&[cached[2].clone(), novel.clone(), cached[0].clone()]);
    let compressed = sender
        .compress_block(&block_hash(&block), &block, false)
        .unwrap();

    // Entry layout: index 2, then sentinel ∥ u24 length ∥ raw bytes, then
    // index 0.
    let body = entries(&compressed);
    assert_eq!(&body[..2], &2u16.to_be_bytes());
    assert_eq!(&body[2..4], &[0xFF, 0xFF]);
    assert_eq!(&body[4..7], &[0x00, 0x00, 0xFA]);
    assert_eq!(&body[7..7 + 250], &novel[..]);
    assert_eq!(&body[7 + 250..], &0u16.to_be_bytes());

    let result = decompress(&receiver, &compressed, 3).unwrap();
    assert_eq!(result.block, block);

    // The receiver did not admit the raw transaction into its recv cache:
    // three cached transactions remain at slots 0..=2, so slot 3 — where the
    // raw transaction would sit had it been admitted — is vacant.
    let mut stream = block[P2P_HEADER_LEN..P2P_HEADER_LEN + BLOCK_HEADER_LEN].to_vec();
    stream.extend_from_slice(&3u16.to_be_bytes());
    let mut reader: &[u8] = &stream;
    assert_eq!(
        receiver.decompress_block(&mut reader, 1, false),
        Err(DecompressError::UnknownIndex)
    );
}

#[test]
fn compress_is_idempotent_via_seen() {
    let (sender, _) = paired_codecs(&[]);
    let block = make_block(&[make_tx(1, 40)]);
    let hash = block_hash(&block);
    sender.compress_block(&hash, &block, false).unwrap();
    assert_eq!(
        sender.compress_block(&hash, &block, false),
        Err(CompressError::AlreadySeen)
    );
    assert_eq!(sender.blocks_sent(), 1);
}

#[test]
fn large_block_round_trip() {
    let txs: Vec<Vec<u8>> = (0..40).map(|i| make_tx(i, 10 + (i as usize * 7) % 120)).collect();
    // Cache every third transaction only.
    let cached: Vec<Vec<u8>> = txs.iter().step_by(3).cloned().collect();
    let (sender, receiver) = paired_codecs(&cached);

    let block = make_block(&txs);
    let compressed = sender
        .compress_block(&block_hash(&block), &block, false)
        .unwrap();
    assert!(compressed.len() < block.len() + RELAY_HEADER_LEN);

    let result = decompress(&receiver, &compressed, txs.len() as u32).unwrap();
    assert_eq!(result.block, block);
    assert_eq!(result.hash, block_hash(&block));
}

#[test]
fn sequential_blocks_keep_caches_aligned() {
    let txs: Vec<Vec<u8>> = (0..30).map(|i| make_tx(i, 35)).collect();
    let (sender, receiver) = paired_codecs(&txs);

    let batches: [Vec<usize>; 3] = [
        vec![5, 6, 7, 8, 9],
        vec![0, 29, 1, 28],
        vec![15, 2, 14, 3, 13],
    ];
    for batch in &batches {
        let block_txs: Vec<Vec<u8>> = batch.iter().map(|&i| txs[i].clone()).collect();
        let block = make_block(&block_txs);
        let compressed = sender
            .compress_block(&block_hash(&block), &block, false)
            .unwrap();
        // Every entry resolves from the cache: 2 bytes per transaction.
        assert_eq!(entries(&compressed).len(), 2 * batch.len());
        let result = decompress(&receiver, &compressed, batch.len() as u32).unwrap();
        assert_eq!(result.block, block);
    }
}

#[test]
fn zero_tx_count_stream_reconstructs_empty_block() {
    // The compressor refuses empty blocks, but the decompressor follows its
    // header: a zero count yields envelope + header + varint(0).
    let (_, receiver) = paired_codecs(&[]);
    let block = make_block(&[]);
    let mut reader: &[u8] = &block[P2P_HEADER_LEN..P2P_HEADER_LEN + BLOCK_HEADER_LEN];
    let result = receiver.decompress_block(&mut reader, 0, false).unwrap();
    assert_eq!(result.block, block);
    assert_eq!(
        result.wire_bytes,
        (RELAY_HEADER_LEN + BLOCK_HEADER_LEN) as u64
    );
}

#[test]
fn legacy_mode_relays_oversize_transactions() {
    let big = make_tx(1, 15_000); // over the legacy base cap, under the oversize cap
    let small = make_tx(2, 50);
    let (sender, receiver) =
        paired_codecs_with(CodecConfig::legacy(), &[small.clone(), big.clone()]);

    let block = make_block(&[big, small]);
    let compressed = sender
        .compress_block(&block_hash(&block), &block, false)
        .unwrap();
    assert_eq!(
        entries(&compressed),
        [1u16.to_be_bytes(), 0u16.to_be_bytes()].concat()
    );
    let result = decompress(&receiver, &compressed, 2).unwrap();
    assert_eq!(result.block, block);
}

#[test]
fn reset_forgets_caches_but_not_blocks() {
    let txs: Vec<Vec<u8>> = (0..4).map(|i| make_tx(i, 20)).collect();
    let (sender, receiver) = paired_codecs(&txs);

    let block = make_block(&[txs[1].clone()]);
    let hash = block_hash(&block);
    let compressed = sender.compress_block(&hash, &block, false).unwrap();
    decompress(&receiver, &compressed, 1).unwrap();

    sender.reset();
    receiver.reset();

    // The caches are gone: the same transactions now travel raw.
    let block2 = make_block(&[txs[2].clone()]);
    let compressed2 = sender
        .compress_block(&block_hash(&block2), &block2, false)
        .unwrap();
    assert_eq!(&entries(&compressed2)[..2], &[0xFF, 0xFF]);
    assert_eq!(decompress(&receiver, &compressed2, 1).unwrap().block, block2);

    // The block-seen set survived the reset.
    assert_eq!(
        sender.compress_block(&hash, &block, false),
        Err(CompressError::AlreadySeen)
    );
}
