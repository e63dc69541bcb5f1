//! Nullable contracts: scripted voting, mirroring, binder and uptime-voting
//! contracts that record every call.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use attest_cronjobs::{AddressBinder, ContractError, MirroringContract, UptimeVoting, VotingContract};
use attest_merkle::H256;
use attest_types::{Address, NodeId, StakeEntry, TxId};

use crate::lock;

#[derive(Default)]
struct ContractState {
    roots: BTreeMap<u64, H256>,
    no_vote_needed: HashSet<u64>,
    votes: Vec<(u64, H256)>,
    vote_failure: Option<(u64, ContractError)>,
    mirrored: Vec<(StakeEntry, Vec<H256>)>,
    mirror_failures: HashMap<TxId, ContractError>,
    registered: HashSet<Address>,
    registrations: Vec<Vec<u8>>,
    registration_failure: Option<ContractError>,
    uptime_votes: Vec<(u64, Vec<NodeId>)>,
    uptime_failure: Option<(u64, ContractError)>,
    uptime_stall: Option<u64>,
    failure: Option<ContractError>,
}

/// One object standing in for every contract the cronjobs call.
///
/// Published roots and votes are separate: `submit_vote` records the vote but
/// does not publish a root, so tests decide when an epoch is confirmed.
#[derive(Default)]
pub struct NullContracts {
    state: Mutex<ContractState>,
}

impl NullContracts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish_root(&self, epoch: u64, root: H256) {
        lock(&self.state).roots.insert(epoch, root);
    }

    /// `should_vote(epoch)` answers false from now on.
    pub fn vote_not_needed(&self, epoch: u64) {
        lock(&self.state).no_vote_needed.insert(epoch);
    }

    /// Fail `submit_vote` for `epoch` and every later epoch.
    pub fn fail_votes_from(&self, failure: Option<(u64, ContractError)>) {
        lock(&self.state).vote_failure = failure;
    }

    /// Reject mirroring of one transaction with `error`.
    pub fn fail_mirror(&self, tx_id: TxId, error: ContractError) {
        lock(&self.state).mirror_failures.insert(tx_id, error);
    }

    pub fn mark_registered(&self, address: Address) {
        lock(&self.state).registered.insert(address);
    }

    pub fn fail_registration(&self, failure: Option<ContractError>) {
        lock(&self.state).registration_failure = failure;
    }

    /// Fail `submit_uptime_vote` for `epoch` and every later epoch.
    pub fn fail_uptime_votes_from(&self, failure: Option<(u64, ContractError)>) {
        lock(&self.state).uptime_failure = failure;
    }

    /// `submit_uptime_vote` never returns for `epoch` and every later epoch.
    pub fn stall_uptime_votes_from(&self, epoch: Option<u64>) {
        lock(&self.state).uptime_stall = epoch;
    }

    /// Fail every call while set.
    pub fn fail_with(&self, failure: Option<ContractError>) {
        lock(&self.state).failure = failure;
    }

    pub fn votes(&self) -> Vec<(u64, H256)> {
        lock(&self.state).votes.clone()
    }

    pub fn mirrored(&self) -> Vec<(StakeEntry, Vec<H256>)> {
        lock(&self.state).mirrored.clone()
    }

    pub fn registrations(&self) -> Vec<Vec<u8>> {
        lock(&self.state).registrations.clone()
    }

    pub fn uptime_votes(&self) -> Vec<(u64, Vec<NodeId>)> {
        lock(&self.state).uptime_votes.clone()
    }

    fn check_failure(state: &ContractState) -> Result<(), ContractError> {
        match &state.failure {
            Some(failure) => Err(failure.clone()),
            None => Ok(()),
        }
    }

    fn scripted(failure: &Option<(u64, ContractError)>, epoch: u64) -> Result<(), ContractError> {
        match failure {
            Some((from, error)) if epoch >= *from => Err(error.clone()),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl VotingContract for NullContracts {
    async fn merkle_root(&self, epoch: u64) -> Result<H256, ContractError> {
        let state = lock(&self.state);
        Self::check_failure(&state)?;
        Ok(state.roots.get(&epoch).copied().unwrap_or(H256::ZERO))
    }

    async fn should_vote(&self, epoch: u64) -> Result<bool, ContractError> {
        let state = lock(&self.state);
        Self::check_failure(&state)?;
        Ok(!state.no_vote_needed.contains(&epoch))
    }

    async fn submit_vote(&self, epoch: u64, root: H256) -> Result<(), ContractError> {
        let mut state = lock(&self.state);
        Self::check_failure(&state)?;
        Self::scripted(&state.vote_failure, epoch)?;
        state.votes.push((epoch, root));
        Ok(())
    }
}

#[async_trait]
impl MirroringContract for NullContracts {
    async fn mirror_stake(&self, stake: &StakeEntry, proof: &[H256]) -> Result<(), ContractError> {
        let mut state = lock(&self.state);
        Self::check_failure(&state)?;
        if let Some(error) = state.mirror_failures.get(&stake.tx_id) {
            return Err(error.clone());
        }
        state.mirrored.push((stake.clone(), proof.to_vec()));
        Ok(())
    }
}

#[async_trait]
impl AddressBinder for NullContracts {
    async fn is_address_registered(&self, address: &Address) -> Result<bool, ContractError> {
        let state = lock(&self.state);
        Self::check_failure(&state)?;
        Ok(state.registered.contains(address))
    }

    async fn register_public_key(&self, public_key: &[u8]) -> Result<(), ContractError> {
        let mut state = lock(&self.state);
        Self::check_failure(&state)?;
        if let Some(failure) = &state.registration_failure {
            return Err(failure.clone());
        }
        state.registrations.push(public_key.to_vec());
        Ok(())
    }
}

#[async_trait]
impl UptimeVoting for NullContracts {
    async fn submit_uptime_vote(&self, epoch: u64, nodes: &[NodeId]) -> Result<(), ContractError> {
        let stalled = {
            let mut state = lock(&self.state);
            Self::check_failure(&state)?;
            Self::scripted(&state.uptime_failure, epoch)?;
            let stalled = state.uptime_stall.is_some_and(|from| epoch >= from);
            if !stalled {
                state.uptime_votes.push((epoch, nodes.to_vec()));
            }
            stalled
        };
        if stalled {
            std::future::pending::<()>().await;
        }
        Ok(())
    }
}
