//! Deterministic Merkle commitments for epoch attestations.
//!
//! - **Keccak-256** for every node and leaf hash
//! - Leaves are deduplicated and sorted before construction, so the tree is a
//!   pure function of the leaf *set*
//! - Internal nodes hash their children in sorted order, so proofs carry no
//!   left/right flags
//! - A lone node at the end of an odd-sized level is promoted unchanged

pub mod error;
pub mod hash;
pub mod leaf;
pub mod tree;

pub use error::MerkleError;
pub use hash::{empty_root, hash_pair, keccak256, keccak256_multi, H256};
pub use leaf::stake_leaf;
pub use tree::{verify, MerkleTree};
