//! Client capabilities of the external contracts the jobs talk to.

use async_trait::async_trait;
use thiserror::Error;

use attest_merkle::H256;
use attest_types::{Address, NodeId, StakeEntry};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ContractError {
    #[error("contract call timed out: {0}")]
    Timeout(String),

    #[error("contract gateway unavailable: {0}")]
    Unavailable(String),

    #[error("contract call reverted: {0}")]
    Reverted(String),

    #[error("invalid gateway response: {0}")]
    InvalidResponse(String),
}

/// Mirroring rejections that mean the stake needs no further action.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BenignOutcome {
    AlreadyMirrored,
    StakingEnded,
    UnknownStakingAddress,
    MaxNodeIdsExceeded,
}

impl BenignOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            BenignOutcome::AlreadyMirrored => "already mirrored",
            BenignOutcome::StakingEnded => "staking already ended",
            BenignOutcome::UnknownStakingAddress => "unknown staking address",
            BenignOutcome::MaxNodeIdsExceeded => "max node ids exceeded",
        }
    }
}

const BENIGN: [BenignOutcome; 4] = [
    BenignOutcome::AlreadyMirrored,
    BenignOutcome::StakingEnded,
    BenignOutcome::UnknownStakingAddress,
    BenignOutcome::MaxNodeIdsExceeded,
];

/// Match a mirroring failure against the known benign revert reasons.
pub fn classify_mirror_error(err: &ContractError) -> Option<BenignOutcome> {
    let ContractError::Reverted(reason) = err else {
        return None;
    };
    let reason = reason.to_ascii_lowercase();
    BENIGN
        .into_iter()
        .find(|outcome| reason.contains(outcome.as_str()))
}

/// The epoch voting contract.
#[async_trait]
pub trait VotingContract: Send + Sync {
    /// Root committed for `epoch`; zero while none is published.
    async fn merkle_root(&self, epoch: u64) -> Result<H256, ContractError>;

    /// Whether this voter still owes a vote for `epoch`.
    async fn should_vote(&self, epoch: u64) -> Result<bool, ContractError>;

    async fn submit_vote(&self, epoch: u64, root: H256) -> Result<(), ContractError>;
}

#[async_trait]
pub trait MirroringContract: Send + Sync {
    async fn mirror_stake(&self, stake: &StakeEntry, proof: &[H256]) -> Result<(), ContractError>;
}

/// Binds ledger addresses to the public keys that own them.
#[async_trait]
pub trait AddressBinder: Send + Sync {
    async fn is_address_registered(&self, address: &Address) -> Result<bool, ContractError>;

    async fn register_public_key(&self, public_key: &[u8]) -> Result<(), ContractError>;
}

#[async_trait]
pub trait UptimeVoting: Send + Sync {
    async fn submit_uptime_vote(&self, epoch: u64, nodes: &[NodeId]) -> Result<(), ContractError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_reverts_are_benign() {
        let cases = [
            ("execution reverted: Already mirrored", BenignOutcome::AlreadyMirrored),
            ("staking already ended", BenignOutcome::StakingEnded),
            ("Unknown staking address 0x12", BenignOutcome::UnknownStakingAddress),
            ("max node ids exceeded", BenignOutcome::MaxNodeIdsExceeded),
        ];
        for (text, expected) in cases {
            assert_eq!(
                classify_mirror_error(&ContractError::Reverted(text.into())),
                Some(expected)
            );
        }
    }

    #[test]
    fn other_failures_are_not_benign() {
        assert_eq!(
            classify_mirror_error(&ContractError::Reverted("invalid merkle proof".into())),
            None
        );
        assert_eq!(
            classify_mirror_error(&ContractError::Timeout("already mirrored".into())),
            None
        );
    }
}
