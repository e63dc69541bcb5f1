//! Leaf encoding for staking transactions.
//!
//! Every field is written as a 32-byte big-endian word, left-padded with
//! zeros, in this order:
//!
//! `tx_type ‖ tx_id ‖ node_id ‖ address ‖ weight ‖ start_time ‖ end_time`
//!
//! The leaf is the Keccak-256 of that 224-byte string. The layout is the
//! static-tuple word encoding EVM contracts use, so a contract can recompute
//! the leaf from the submitted stake data.

use attest_types::StakeEntry;

use crate::hash::{keccak256, H256};

const WORD: usize = 32;
const FIELDS: usize = 7;

fn put_word(buf: &mut [u8; WORD * FIELDS], field: usize, value: &[u8]) {
    let end = (field + 1) * WORD;
    buf[end - value.len()..end].copy_from_slice(value);
}

/// Encode a stake entry into its word layout.
pub fn encode_stake(entry: &StakeEntry) -> [u8; WORD * FIELDS] {
    let mut buf = [0u8; WORD * FIELDS];
    put_word(&mut buf, 0, &[entry.tx_type.code()]);
    put_word(&mut buf, 1, entry.tx_id.as_bytes());
    put_word(&mut buf, 2, entry.node_id.as_bytes());
    put_word(&mut buf, 3, entry.address.as_bytes());
    put_word(&mut buf, 4, &entry.weight.to_be_bytes());
    put_word(&mut buf, 5, &entry.start_time.as_secs().to_be_bytes());
    put_word(&mut buf, 6, &entry.end_time.as_secs().to_be_bytes());
    buf
}

/// Merkle leaf of a stake entry.
pub fn stake_leaf(entry: &StakeEntry) -> H256 {
    keccak256(&encode_stake(entry))
}
