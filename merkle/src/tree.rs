//! Sorted-pair Merkle tree over a set of leaf hashes.
//!
//! Construction:
//! 1. Leaves are sorted ascending and deduplicated (level 0).
//! 2. Each next level pairs nodes `(0,1), (2,3), …` and hashes every pair with
//!    [`hash_pair`]. A lone trailing node is carried up unchanged.
//! 3. The single node of the last level is the root. A one-leaf tree's root is
//!    the leaf itself and its proof is empty.
//!
//! Because pairs are hashed in sorted order a proof is just the list of
//! sibling hashes from leaf to root; levels where the node was promoted
//! contribute no sibling.

use crate::error::MerkleError;
use crate::hash::{hash_pair, H256};

/// An immutable Merkle tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MerkleTree {
    /// `levels[0]` holds the sorted leaves, the last level holds the root.
    levels: Vec<Vec<H256>>,
}

impl MerkleTree {
    /// Build a tree from any collection of leaf hashes. Order and duplicates
    /// in the input do not affect the result.
    pub fn build<I>(leaves: I) -> Self
    where
        I: IntoIterator<Item = H256>,
    {
        let mut leaves: Vec<H256> = leaves.into_iter().collect();
        leaves.sort_unstable();
        leaves.dedup();

        if leaves.is_empty() {
            return Self { levels: Vec::new() };
        }

        let mut levels = vec![leaves];
        while let Some(current) = levels.last().filter(|level| level.len() > 1) {
            let next: Vec<H256> = current
                .chunks(2)
                .map(|pair| match pair {
                    [left, right] => hash_pair(left, right),
                    _ => pair[0],
                })
                .collect();
            levels.push(next);
        }

        Self { levels }
    }

    /// The committed root.
    pub fn root(&self) -> Result<H256, MerkleError> {
        self.levels
            .last()
            .and_then(|level| level.first())
            .copied()
            .ok_or(MerkleError::EmptyTree)
    }

    /// Number of distinct leaves.
    pub fn leaf_count(&self) -> usize {
        self.levels.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.leaf_count() == 0
    }

    /// The sorted, deduplicated leaves.
    pub fn leaves(&self) -> &[H256] {
        self.levels.first().map(Vec::as_slice).unwrap_or(&[])
    }

    /// Position of a leaf in sorted order.
    pub fn index_of(&self, leaf: &H256) -> Option<usize> {
        self.leaves().binary_search(leaf).ok()
    }

    /// Sibling path for the leaf at `index` (sorted position).
    pub fn proof(&self, index: usize) -> Result<Vec<H256>, MerkleError> {
        self.check_index(index)?;

        let mut proof = Vec::with_capacity(self.levels.len().saturating_sub(1));
        let mut pos = index;
        for level in &self.levels[..self.levels.len() - 1] {
            let sibling = pos ^ 1;
            if let Some(hash) = level.get(sibling) {
                proof.push(*hash);
            }
            pos /= 2;
        }
        Ok(proof)
    }

    /// Sibling path for a leaf given by value.
    pub fn proof_for(&self, leaf: &H256) -> Result<Vec<H256>, MerkleError> {
        let index = self
            .index_of(leaf)
            .ok_or_else(|| MerkleError::LeafNotFound(leaf.to_string()))?;
        self.proof(index)
    }

    /// Verify `proof` for the leaf at `index` against this tree's root.
    pub fn verify_leaf(&self, index: usize, proof: &[H256]) -> Result<bool, MerkleError> {
        self.check_index(index)?;
        let root = self.root()?;
        Ok(verify(&self.leaves()[index], proof, &root))
    }

    fn check_index(&self, index: usize) -> Result<(), MerkleError> {
        let count = self.leaf_count();
        if index >= count {
            return Err(MerkleError::InvalidIndex { index, count });
        }
        Ok(())
    }
}

/// Fold `proof` over `leaf` and compare with `root`.
pub fn verify(leaf: &H256, proof: &[H256], root: &H256) -> bool {
    let computed = proof
        .iter()
        .fold(*leaf, |acc, sibling| hash_pair(&acc, sibling));
    computed == *root
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(byte: u8) -> H256 {
        H256::new([byte; 32])
    }

    #[test]
    fn empty_tree_has_no_root() {
        let tree = MerkleTree::build(Vec::new());
        assert_eq!(tree.root(), Err(MerkleError::EmptyTree));
        assert!(tree.is_empty());
        assert_eq!(
            tree.proof(0),
            Err(MerkleError::InvalidIndex { index: 0, count: 0 })
        );
    }

    #[test]
    fn single_leaf_is_its_own_root() {
        let tree = MerkleTree::build([h(7)]);
        assert_eq!(tree.root().unwrap(), h(7));
        assert!(tree.proof(0).unwrap().is_empty());
        assert!(tree.verify_leaf(0, &[]).unwrap());
    }

    #[test]
    fn two_leaves_hash_in_sorted_order() {
        let tree = MerkleTree::build([h(0xbb), h(0xaa)]);
        assert_eq!(tree.root().unwrap(), hash_pair(&h(0xaa), &h(0xbb)));
        assert_eq!(tree.leaves(), &[h(0xaa), h(0xbb)]);
    }

    #[test]
    fn odd_level_promotes_last_node_unchanged() {
        // Level 0: [1, 2, 3] -> level 1: [H(1,2), 3] -> root H(H(1,2), 3)
        let tree = MerkleTree::build([h(3), h(1), h(2)]);
        let expected = hash_pair(&hash_pair(&h(1), &h(2)), &h(3));
        assert_eq!(tree.root().unwrap(), expected);

        // The promoted leaf skips the level it had no sibling on.
        assert_eq!(tree.proof(2).unwrap(), vec![hash_pair(&h(1), &h(2))]);
        assert_eq!(tree.proof(0).unwrap(), vec![h(2), h(3)]);
    }

    #[test]
    fn five_leaves_golden_shape() {
        // [1,2,3,4,5] -> [H12, H34, 5] -> [H(H12,H34), 5] -> root
        let tree = MerkleTree::build((1..=5).map(h));
        let h12 = hash_pair(&h(1), &h(2));
        let h34 = hash_pair(&h(3), &h(4));
        let expected = hash_pair(&hash_pair(&h12, &h34), &h(5));
        assert_eq!(tree.root().unwrap(), expected);
        assert_eq!(tree.proof(4).unwrap(), vec![hash_pair(&h12, &h34)]);
        assert_eq!(tree.proof(2).unwrap(), vec![h(4), h12, h(5)]);
    }

    #[test]
    fn duplicates_are_ignored() {
        let a = MerkleTree::build([h(1), h(2), h(2), h(1)]);
        let b = MerkleTree::build([h(2), h(1)]);
        assert_eq!(a.leaf_count(), 2);
        assert_eq!(a.root().unwrap(), b.root().unwrap());
    }

    #[test]
    fn every_proof_verifies() {
        let tree = MerkleTree::build((0..13).map(h));
        let root = tree.root().unwrap();
        for (i, leaf) in tree.leaves().iter().enumerate() {
            let proof = tree.proof(i).unwrap();
            assert!(verify(leaf, &proof, &root), "leaf {i}");
            assert_eq!(tree.proof_for(leaf).unwrap(), proof);
        }
    }

    #[test]
    fn tampered_proof_fails() {
        let tree = MerkleTree::build((0..4).map(h));
        let mut proof = tree.proof(1).unwrap();
        proof[0] = h(0xee);
        assert!(!tree.verify_leaf(1, &proof).unwrap());
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        let tree = MerkleTree::build((0..3).map(h));
        assert_eq!(
            tree.verify_leaf(3, &[]),
            Err(MerkleError::InvalidIndex { index: 3, count: 3 })
        );
    }

    #[test]
    fn unknown_leaf_has_no_proof() {
        let tree = MerkleTree::build((0..3).map(h));
        assert!(matches!(
            tree.proof_for(&h(9)),
            Err(MerkleError::LeafNotFound(_))
        ));
    }
}
