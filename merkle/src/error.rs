use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MerkleError {
    #[error("merkle tree has no leaves")]
    EmptyTree,

    #[error("leaf index {index} out of range (leaf count {count})")]
    InvalidIndex { index: usize, count: usize },

    #[error("leaf {0} is not part of the tree")]
    LeafNotFound(String),
}
