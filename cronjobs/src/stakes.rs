//! Epoch-scoped staking transactions and their Merkle commitment.

use std::collections::HashSet;

use attest_merkle::{empty_root, stake_leaf, MerkleError, MerkleTree, H256};
use attest_store::{ProgressStore, StoreError, TransactionStore};
use attest_types::{StakeEntry, Timestamp};

use crate::epoch::EpochConfig;

/// Staking transactions that started in `epoch`, deduplicated by
/// `(tx id, address)`, keeping the first occurrence.
pub fn epoch_stakes<S>(
    store: &S,
    epochs: &EpochConfig,
    epoch: u64,
) -> Result<Vec<StakeEntry>, StoreError>
where
    S: TransactionStore + ?Sized,
{
    let (from, to) = epochs.time_range(epoch);
    let mut entries = store.stake_entries(from, to)?;
    let mut seen = HashSet::new();
    entries.retain(|entry| seen.insert(entry.dedup_key()));
    Ok(entries)
}

/// Time up to which the indexer stream `stream` has persisted its data.
pub fn indexed_until<S>(store: &S, stream: &str) -> Result<Timestamp, StoreError>
where
    S: ProgressStore + ?Sized,
{
    Ok(store
        .get_progress(stream)?
        .map_or(Timestamp::EPOCH, |p| p.updated_at))
}

/// The Merkle tree over one epoch's deduplicated stakes.
pub struct EpochCommitment {
    entries: Vec<StakeEntry>,
    leaves: Vec<H256>,
    tree: MerkleTree,
}

impl EpochCommitment {
    pub fn build(entries: Vec<StakeEntry>) -> Self {
        let leaves: Vec<H256> = entries.iter().map(stake_leaf).collect();
        let tree = MerkleTree::build(leaves.iter().copied());
        Self {
            entries,
            leaves,
            tree,
        }
    }

    /// Root of the tree, or the empty-epoch sentinel when there are no stakes.
    pub fn root(&self) -> H256 {
        self.tree.root().unwrap_or_else(|_| empty_root())
    }

    pub fn entries(&self) -> &[StakeEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Inclusion proof of the `i`-th entry.
    pub fn proof(&self, i: usize) -> Result<Vec<H256>, MerkleError> {
        let leaf = self.leaves.get(i).ok_or(MerkleError::InvalidIndex {
            index: i,
            count: self.leaves.len(),
        })?;
        self.tree.proof_for(leaf)
    }
}
