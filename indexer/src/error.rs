use thiserror::Error;

use attest_store::StoreError;
use attest_types::{OutPoint, TypesError};
use attest_utils::ErrorKind;

use crate::ledger::LedgerError;

#[derive(Debug, Error)]
pub enum IndexerError {
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("container {index} could not be transformed: {reason}")]
    Transform { index: u64, reason: String },

    #[error("invalid field: {0}")]
    InvalidField(#[from] TypesError),

    #[error("ledger returned container {actual}, expected {expected}")]
    OutOfOrder { expected: u64, actual: u64 },

    #[error("unresolved inputs: {}", format_outpoints(.0))]
    Unresolved(Vec<OutPoint>),
}

impl IndexerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            IndexerError::Ledger(_) => ErrorKind::Transient,
            IndexerError::Store(StoreError::Backend(_)) => ErrorKind::Transient,
            IndexerError::Store(_) => ErrorKind::DataInconsistency,
            IndexerError::Transform { .. }
            | IndexerError::InvalidField(_)
            | IndexerError::OutOfOrder { .. }
            | IndexerError::Unresolved(_) => ErrorKind::DataInconsistency,
        }
    }
}

fn format_outpoints(outpoints: &[OutPoint]) -> String {
    outpoints
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
