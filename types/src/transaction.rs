//! Indexed transaction rows and the staking views derived from them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Address, NodeId, Timestamp, TxId, TypesError};

/// Transaction kinds the indexer distinguishes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxType {
    AddValidator,
    AddDelegator,
    Import,
    Export,
    Base,
    RewardValidator,
    Other,
}

impl TxType {
    /// Stable numeric code, used in the stake leaf encoding.
    pub fn code(&self) -> u8 {
        match self {
            TxType::AddValidator => 0,
            TxType::AddDelegator => 1,
            TxType::Import => 2,
            TxType::Export => 3,
            TxType::Base => 4,
            TxType::RewardValidator => 5,
            TxType::Other => 255,
        }
    }

    /// Whether transactions of this type carry a stake.
    pub fn is_staking(&self) -> bool {
        matches!(self, TxType::AddValidator | TxType::AddDelegator)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TxType::AddValidator => "add_validator",
            TxType::AddDelegator => "add_delegator",
            TxType::Import => "import",
            TxType::Export => "export",
            TxType::Base => "base",
            TxType::RewardValidator => "reward_validator",
            TxType::Other => "other",
        }
    }
}

impl fmt::Display for TxType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TxType {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "add_validator" => Ok(TxType::AddValidator),
            "add_delegator" => Ok(TxType::AddDelegator),
            "import" => Ok(TxType::Import),
            "export" => Ok(TxType::Export),
            "base" => Ok(TxType::Base),
            "reward_validator" => Ok(TxType::RewardValidator),
            "other" => Ok(TxType::Other),
            _ => Err(TypesError::UnknownTxType(s.to_string())),
        }
    }
}

/// Staking details carried by validator and delegator transactions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeInfo {
    pub node_id: NodeId,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
    pub weight: u64,
    /// Public key that signed the transaction, when the ledger exposes it.
    #[serde(default)]
    pub signer_public_key: Option<Vec<u8>>,
}

/// A transaction as persisted by the indexer.
///
/// Chain-specific detail is composed in (`stake`) rather than layered on
/// through separate row types.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRow {
    pub id: TxId,
    pub tx_type: TxType,
    /// Index of the container this transaction was found in.
    pub container_index: u64,
    pub block_height: u64,
    pub timestamp: Timestamp,
    #[serde(default)]
    pub stake: Option<StakeInfo>,
}

/// One staking transaction joined with one of its resolved input addresses.
///
/// A transaction with several inputs from the same address yields duplicate
/// entries; consumers deduplicate by [`StakeEntry::dedup_key`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeEntry {
    pub tx_id: TxId,
    pub tx_type: TxType,
    pub node_id: NodeId,
    pub address: Address,
    pub weight: u64,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
    pub signer_public_key: Option<Vec<u8>>,
}

impl StakeEntry {
    pub fn dedup_key(&self) -> (TxId, Address) {
        (self.tx_id, self.address)
    }
}

/// A validator's staking period, used by uptime aggregation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakingInterval {
    pub node_id: NodeId,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
}
