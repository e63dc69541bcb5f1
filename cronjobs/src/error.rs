use thiserror::Error;

use attest_indexer::LedgerError;
use attest_merkle::{MerkleError, H256};
use attest_store::StoreError;
use attest_utils::ErrorKind;

use crate::contracts::{classify_mirror_error, ContractError};

#[derive(Debug, Error)]
pub enum CronjobError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("contract error: {0}")]
    Contract(#[from] ContractError),

    #[error("merkle error: {0}")]
    Merkle(#[from] MerkleError),

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("epoch {epoch}: local root {local} does not match published root {remote}")]
    RootMismatch { epoch: u64, local: H256, remote: H256 },

    #[error("config error: {0}")]
    Config(String),
}

impl CronjobError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CronjobError::Store(StoreError::Backend(_)) => ErrorKind::Transient,
            CronjobError::Store(_) => ErrorKind::DataInconsistency,
            CronjobError::Contract(err) => match err {
                ContractError::Reverted(_) if classify_mirror_error(err).is_some() => {
                    ErrorKind::KnownBenign
                }
                ContractError::Reverted(_) => ErrorKind::DataInconsistency,
                _ => ErrorKind::Transient,
            },
            CronjobError::Ledger(_) => ErrorKind::Transient,
            CronjobError::Merkle(_) | CronjobError::RootMismatch { .. } => {
                ErrorKind::DataInconsistency
            }
            CronjobError::Config(_) => ErrorKind::Configuration,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy() {
        assert_eq!(
            CronjobError::from(ContractError::Timeout("x".into())).kind(),
            ErrorKind::Transient
        );
        assert_eq!(
            CronjobError::RootMismatch {
                epoch: 1,
                local: H256::ZERO,
                remote: H256::ZERO
            }
            .kind(),
            ErrorKind::DataInconsistency
        );
        assert_eq!(
            CronjobError::from(ContractError::Reverted("already mirrored".into())).kind(),
            ErrorKind::KnownBenign
        );
        assert_eq!(
            CronjobError::Config("bad".into()).kind(),
            ErrorKind::Configuration
        );
    }
}
