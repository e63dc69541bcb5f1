//! Composite key layouts. All integers are big-endian.

use attest_types::{NodeId, Timestamp, TxId, UptimeStatus};

/// `tx_id ‖ index`
pub(crate) fn output_key(tx_id: &TxId, index: u32) -> [u8; 36] {
    let mut key = [0u8; 36];
    key[..32].copy_from_slice(tx_id.as_bytes());
    key[32..].copy_from_slice(&index.to_be_bytes());
    key
}

/// `tx_id ‖ referenced_tx_id ‖ referenced_index`
pub(crate) fn input_key(tx_id: &TxId, referenced: &TxId, referenced_index: u32) -> [u8; 68] {
    let mut key = [0u8; 68];
    key[..32].copy_from_slice(tx_id.as_bytes());
    key[32..64].copy_from_slice(referenced.as_bytes());
    key[64..].copy_from_slice(&referenced_index.to_be_bytes());
    key
}

/// `start_time ‖ tx_id`
pub(crate) fn stake_start_key(start: Timestamp, tx_id: &TxId) -> [u8; 40] {
    let mut key = [0u8; 40];
    key[..8].copy_from_slice(&start.as_secs().to_be_bytes());
    key[8..].copy_from_slice(tx_id.as_bytes());
    key
}

pub(crate) fn tx_id_from_stake_key(key: &[u8]) -> Option<TxId> {
    let bytes: [u8; 32] = key.get(8..40)?.try_into().ok()?;
    Some(TxId::new(bytes))
}

/// `tag ‖ node_id ‖ timestamp ‖ status`, tag 0 for node-less samples.
pub(crate) fn sample_key(node: Option<&NodeId>, timestamp: Timestamp, status: UptimeStatus) -> [u8; 30] {
    let mut key = [0u8; 30];
    if let Some(node) = node {
        key[0] = 1;
        key[1..21].copy_from_slice(node.as_bytes());
    }
    key[21..29].copy_from_slice(&timestamp.as_secs().to_be_bytes());
    key[29] = status.code();
    key
}

/// First and last possible sample keys of `node` within `[from, to]`.
pub(crate) fn sample_range(node: &NodeId, from: Timestamp, to: Timestamp) -> ([u8; 30], [u8; 30]) {
    let mut lo = [0u8; 30];
    lo[0] = 1;
    lo[1..21].copy_from_slice(node.as_bytes());
    let mut hi = lo;
    lo[21..29].copy_from_slice(&from.as_secs().to_be_bytes());
    hi[21..29].copy_from_slice(&to.as_secs().to_be_bytes());
    hi[29] = u8::MAX;
    (lo, hi)
}

/// `epoch ‖ node_id`
pub(crate) fn aggregation_key(epoch: u64, node: &NodeId) -> [u8; 28] {
    let mut key = [0u8; 28];
    key[..8].copy_from_slice(&epoch.to_be_bytes());
    key[8..].copy_from_slice(node.as_bytes());
    key
}

pub(crate) fn epoch_from_aggregation_key(key: &[u8]) -> Option<u64> {
    let bytes: [u8; 8] = key.get(..8)?.try_into().ok()?;
    Some(u64::from_be_bytes(bytes))
}
