//! Shared builders for relay codec tests.

use flare_core::constants::{BLOCK_HEADER_LEN, MIN_BLOCK_VERSION, P2P_HEADER_LEN};
use flare_core::hash::{double_sha256, double_sha256_pair};
use flare_core::types::Hash256;
use flare_core::wire::write_varint;
use flare_relay::{CodecConfig, RelayCodec};

/// A parseable transaction with one input and one output, distinguishable
/// by `seed` and sized by `script_len`.
pub fn make_tx(seed: u8, script_len: usize) -> Vec<u8> {
    let mut tx = Vec::new();
    tx.extend_from_slice(&1i32.to_le_bytes()); // version
    tx.push(1); // input count
    tx.extend_from_slice(&[seed; 36]); // outpoint
    write_varint(&mut tx, script_len as u64);
    tx.extend(std::iter::repeat(seed).take(script_len));
    tx.extend_from_slice(&0xFFFF_FFFFu32.to_le_bytes()); // sequence
    tx.push(1); // output count
    tx.extend_from_slice(&50_000u64.to_le_bytes()); // value
    write_varint(&mut tx, 4);
    tx.extend_from_slice(&[seed; 4]); // output script
    tx.extend_from_slice(&0u32.to_le_bytes()); // locktime
    tx
}

/// Classical Merkle root over raw transactions: hash each, fold adjacent
/// pairs, duplicate the last element of odd rows.
pub fn merkle_root(txs: &[Vec<u8>]) -> Hash256 {
    let mut layer: Vec<Hash256> = txs.iter().map(|tx| double_sha256(tx)).collect();
    while layer.len() > 1 {
        let mut next = Vec::with_capacity(layer.len().div_ceil(2));
        for pair in layer.chunks(2) {
            let right = pair.get(1).unwrap_or(&pair[0]);
            next.push(double_sha256_pair(&pair[0], right));
        }
        layer = next;
    }
    layer.first().copied().unwrap_or(Hash256::ZERO)
}

/// Full block message with the given header version: zeroed p2p envelope,
/// 80-byte header with the correct Merkle root, tx-count varint, txs.
pub fn make_block_with_version(version: i32, txs: &[Vec<u8>]) -> Vec<u8> {
    let mut msg = vec![0u8; P2P_HEADER_LEN];
    msg.extend_from_slice(&version.to_le_bytes());
    msg.extend_from_slice(&[0x11; 32]); // previous block hash
    msg.extend_from_slice(merkle_root(txs).as_bytes());
    msg.extend_from_slice(&[0x22; BLOCK_HEADER_LEN - (4 + 32 + 32)]); // time, bits, nonce
    write_varint(&mut msg, txs.len() as u64);
    for tx in txs {
        msg.extend_from_slice(tx);
    }
    msg
}

/// Full block message at the minimum relayable version.
pub fn make_block(txs: &[Vec<u8>]) -> Vec<u8> {
    make_block_with_version(MIN_BLOCK_VERSION, txs)
}

/// Double-SHA256 of a block message's 80-byte header.
pub fn block_hash(msg: &[u8]) -> Hash256 {
    double_sha256(&msg[P2P_HEADER_LEN..P2P_HEADER_LEN + BLOCK_HEADER_LEN])
}

/// A fabricated block hash that passes the relay work floor.
pub fn workable_hash(seed: u8) -> Hash256 {
    let mut bytes = [seed; 32];
    for b in bytes[25..].iter_mut() {
        *b = 0;
    }
    Hash256(bytes)
}

/// A sender/receiver codec pair whose send and recv caches both hold the
/// given transactions at matching slots.
pub fn paired_codecs(txs: &[Vec<u8>]) -> (RelayCodec, RelayCodec) {
    paired_codecs_with(CodecConfig::default(), txs)
}

/// [`paired_codecs`] with an explicit codec configuration on both sides.
pub fn paired_codecs_with(config: CodecConfig, txs: &[Vec<u8>]) -> (RelayCodec, RelayCodec) {
    let sender = RelayCodec::new(config.clone());
    let receiver = RelayCodec::new(config);
    for tx in txs {
        assert!(sender.get_relay_transaction(tx).is_some());
        receiver.recv_tx(tx.clone()).unwrap();
    }
    (sender, receiver)
}
