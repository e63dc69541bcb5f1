//! Remote ledger client capability.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use attest_types::{NodeId, TxId};

/// An opaque container fetched from the ledger by sequential index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Container {
    pub index: u64,
    pub bytes: Vec<u8>,
}

/// Connectivity of one current validator, as reported by the ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorStatus {
    pub node_id: NodeId,
    pub connected: bool,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("ledger unavailable: {0}")]
    Unavailable(String),

    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("not found: {0}")]
    NotFound(String),
}

impl LedgerError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, LedgerError::Timeout(_))
    }
}

/// Read access to the remote ledger.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Index of the last accepted container.
    async fn last_accepted(&self) -> Result<u64, LedgerError>;

    /// Up to `count` containers starting at `from`, in ascending order.
    async fn container_range(&self, from: u64, count: u64) -> Result<Vec<Container>, LedgerError>;

    async fn container_by_index(&self, index: u64) -> Result<Container, LedgerError>;

    /// Raw bytes of one transaction.
    async fn transaction(&self, tx_id: &TxId) -> Result<Vec<u8>, LedgerError>;

    /// Current validator set with connectivity.
    async fn current_validators(&self) -> Result<Vec<ValidatorStatus>, LedgerError>;
}
