//! Nullable ledger: a scripted remote ledger.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;

use attest_indexer::{Container, JsonContainer, JsonTx, LedgerClient, LedgerError, ValidatorStatus};
use attest_types::TxId;

use crate::lock;

#[derive(Default)]
struct LedgerState {
    containers: BTreeMap<u64, Vec<u8>>,
    last_accepted: Option<u64>,
    transactions: HashMap<TxId, Vec<u8>>,
    validators: Vec<ValidatorStatus>,
    failure: Option<LedgerError>,
    tx_fetches: Vec<TxId>,
    range_calls: Vec<(u64, u64)>,
    range_overshoot: u64,
}

/// A ledger whose containers, transactions and validator set are set up by
/// the test. Every call fails with the configured error while one is set.
#[derive(Default)]
pub struct NullLedger {
    state: Mutex<LedgerState>,
}

impl NullLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a container; the last accepted index follows the highest one.
    pub fn push_container(&self, index: u64, bytes: Vec<u8>) {
        let mut state = lock(&self.state);
        state.containers.insert(index, bytes);
        state.last_accepted = state.last_accepted.max(Some(index));
    }

    pub fn push_json(&self, index: u64, container: &JsonContainer) {
        self.push_container(index, serde_json::to_vec(container).unwrap_or_default());
    }

    pub fn set_last_accepted(&self, index: u64) {
        lock(&self.state).last_accepted = Some(index);
    }

    /// Make a transaction available to `transaction()` lookups.
    pub fn add_transaction(&self, tx: &JsonTx) {
        if let Ok(id) = tx.id.parse::<TxId>() {
            let bytes = serde_json::to_vec(tx).unwrap_or_default();
            lock(&self.state).transactions.insert(id, bytes);
        }
    }

    pub fn set_validators(&self, validators: Vec<ValidatorStatus>) {
        lock(&self.state).validators = validators;
    }

    /// `container_range()` returns up to `extra` containers past `count`.
    pub fn overshoot_ranges(&self, extra: u64) {
        lock(&self.state).range_overshoot = extra;
    }

    pub fn fail_with(&self, failure: Option<LedgerError>) {
        lock(&self.state).failure = failure;
    }

    /// Transaction ids requested through `transaction()`, in call order.
    pub fn tx_fetches(&self) -> Vec<TxId> {
        lock(&self.state).tx_fetches.clone()
    }

    /// `(from, count)` of every `container_range()` call.
    pub fn range_calls(&self) -> Vec<(u64, u64)> {
        lock(&self.state).range_calls.clone()
    }

    fn check_failure(state: &LedgerState) -> Result<(), LedgerError> {
        match &state.failure {
            Some(failure) => Err(failure.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl LedgerClient for NullLedger {
    async fn last_accepted(&self) -> Result<u64, LedgerError> {
        let state = lock(&self.state);
        Self::check_failure(&state)?;
        state
            .last_accepted
            .ok_or_else(|| LedgerError::NotFound("no accepted container".into()))
    }

    async fn container_range(&self, from: u64, count: u64) -> Result<Vec<Container>, LedgerError> {
        let mut state = lock(&self.state);
        Self::check_failure(&state)?;
        state.range_calls.push((from, count));
        let end = from.saturating_add(count).saturating_add(state.range_overshoot);
        Ok(state
            .containers
            .range(from..end)
            .map(|(index, bytes)| Container {
                index: *index,
                bytes: bytes.clone(),
            })
            .collect())
    }

    async fn container_by_index(&self, index: u64) -> Result<Container, LedgerError> {
        let state = lock(&self.state);
        Self::check_failure(&state)?;
        state
            .containers
            .get(&index)
            .map(|bytes| Container {
                index,
                bytes: bytes.clone(),
            })
            .ok_or_else(|| LedgerError::NotFound(format!("container {index}")))
    }

    async fn transaction(&self, tx_id: &TxId) -> Result<Vec<u8>, LedgerError> {
        let mut state = lock(&self.state);
        Self::check_failure(&state)?;
        state.tx_fetches.push(*tx_id);
        state
            .transactions
            .get(tx_id)
            .cloned()
            .ok_or_else(|| LedgerError::NotFound(format!("transaction {tx_id}")))
    }

    async fn current_validators(&self) -> Result<Vec<ValidatorStatus>, LedgerError> {
        let state = lock(&self.state);
        Self::check_failure(&state)?;
        Ok(state.validators.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn range_stops_at_known_containers() {
        let ledger = NullLedger::new();
        for i in 0..5 {
            ledger.push_container(i, vec![i as u8]);
        }
        assert_eq!(ledger.last_accepted().await.unwrap(), 4);
        let got = ledger.container_range(3, 10).await.unwrap();
        assert_eq!(got.iter().map(|c| c.index).collect::<Vec<_>>(), vec![3, 4]);
    }

    #[tokio::test]
    async fn injected_failure_applies_to_every_call() {
        let ledger = NullLedger::new();
        ledger.push_container(0, vec![]);
        ledger.fail_with(Some(LedgerError::Timeout("test".into())));
        assert!(ledger.last_accepted().await.unwrap_err().is_timeout());
        ledger.fail_with(None);
        assert!(ledger.last_accepted().await.is_ok());
    }
}
