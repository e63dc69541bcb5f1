//! Three-tier input resolution: in-memory cache, persisted outputs, remote
//! ledger.

use std::collections::{BTreeMap, BTreeSet};
use std::num::NonZeroUsize;
use std::sync::Arc;

use async_trait::async_trait;
use lru::LruCache;

use attest_store::OutputStore;
use attest_types::{Input, OutPoint, Output, TxId};

use crate::{IndexerError, LedgerError};

/// Default number of transactions whose outputs the cache retains.
pub const DEFAULT_CACHE_CAPACITY: usize = 10_000;

/// Materialises a transaction's outputs from outside the local store.
#[async_trait]
pub trait OutputFetcher: Send + Sync {
    async fn fetch_outputs(&self, tx_id: &TxId) -> Result<Vec<Output>, IndexerError>;
}

/// Per-tier resolution counts of the last [`UtxoResolver::resolve`] call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ResolveStats {
    pub from_cache: usize,
    pub from_store: usize,
    pub from_remote: usize,
}

/// Fills in the amount and address of inputs from the outputs they spend.
///
/// Owned by a single indexing engine; never shared between streams.
pub struct UtxoResolver {
    cache: LruCache<TxId, Vec<Output>>,
    fetcher: Arc<dyn OutputFetcher>,
}

impl UtxoResolver {
    pub fn new(capacity: usize, fetcher: Arc<dyn OutputFetcher>) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: LruCache::new(capacity),
            fetcher,
        }
    }

    /// Drop every cached output. Called at the start of each cycle.
    pub fn reset(&mut self) {
        self.cache.clear();
    }

    pub fn cached_transactions(&self) -> usize {
        self.cache.len()
    }

    /// Make outputs produced by the current batch available to the cache tier.
    pub fn add_outputs(&mut self, outputs: &[Output]) {
        let mut by_tx: BTreeMap<TxId, Vec<Output>> = BTreeMap::new();
        for output in outputs {
            by_tx.entry(output.tx_id).or_default().push(output.clone());
        }
        for (tx_id, outputs) in by_tx {
            self.cache_outputs(tx_id, outputs);
        }
    }

    fn cache_outputs(&mut self, tx_id: TxId, outputs: Vec<Output>) {
        match self.cache.get_mut(&tx_id) {
            Some(cached) => {
                for output in outputs {
                    if !cached.iter().any(|o| o.index == output.index) {
                        cached.push(output);
                    }
                }
            }
            None => {
                self.cache.put(tx_id, outputs);
            }
        }
    }

    fn lookup_cache(&mut self, outpoint: &OutPoint) -> Option<Output> {
        self.cache
            .get(&outpoint.tx_id)?
            .iter()
            .find(|o| o.index == outpoint.index)
            .cloned()
    }

    /// Resolve every unresolved input in `inputs`.
    ///
    /// Either all inputs are resolved, or none is touched and the error names
    /// every outpoint no tier could supply.
    pub async fn resolve<S>(
        &mut self,
        store: &S,
        inputs: &mut [Input],
    ) -> Result<ResolveStats, IndexerError>
    where
        S: OutputStore + Sync + ?Sized,
    {
        let mut stats = ResolveStats::default();
        let mut outstanding: BTreeSet<OutPoint> = inputs
            .iter()
            .filter(|input| !input.is_resolved())
            .map(Input::outpoint)
            .collect();
        let mut found: BTreeMap<OutPoint, Output> = BTreeMap::new();

        outstanding.retain(|outpoint| match self.lookup_cache(outpoint) {
            Some(output) => {
                found.insert(*outpoint, output);
                stats.from_cache += 1;
                false
            }
            None => true,
        });

        if !outstanding.is_empty() {
            let tx_ids = distinct_tx_ids(&outstanding);
            let persisted = store.get_outputs(&tx_ids)?;
            stats.from_store += take_matches(&mut outstanding, &mut found, &persisted);
            self.add_outputs(&persisted);
        }

        for tx_id in distinct_tx_ids(&outstanding) {
            let fetched = match self.fetcher.fetch_outputs(&tx_id).await {
                Ok(outputs) => outputs,
                // Reported below as unresolved.
                Err(IndexerError::Ledger(LedgerError::NotFound(_))) => Vec::new(),
                Err(e) => return Err(e),
            };
            tracing::debug!(tx_id = %tx_id, outputs = fetched.len(), "fetched outputs from ledger");
            stats.from_remote += take_matches(&mut outstanding, &mut found, &fetched);
            self.cache_outputs(tx_id, fetched);
        }

        if !outstanding.is_empty() {
            return Err(IndexerError::Unresolved(outstanding.into_iter().collect()));
        }

        for input in inputs.iter_mut().filter(|input| !input.is_resolved()) {
            if let Some(output) = found.get(&input.outpoint()) {
                input.resolve_from(output);
            }
        }
        Ok(stats)
    }
}

fn distinct_tx_ids(outpoints: &BTreeSet<OutPoint>) -> Vec<TxId> {
    let ids: BTreeSet<TxId> = outpoints.iter().map(|o| o.tx_id).collect();
    ids.into_iter().collect()
}

fn take_matches(
    outstanding: &mut BTreeSet<OutPoint>,
    found: &mut BTreeMap<OutPoint, Output>,
    outputs: &[Output],
) -> usize {
    let mut matched = 0;
    for output in outputs {
        let outpoint = output.outpoint();
        if outstanding.remove(&outpoint) {
            found.insert(outpoint, output.clone());
            matched += 1;
        }
    }
    matched
}
