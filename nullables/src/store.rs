//! Nullable store: thread-safe in-memory storage for testing.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use attest_store::{
    BatchStore, OutputStore, ProgressStore, StoreError, TransactionStore, UptimeStore, WriteBatch,
};
use attest_types::{
    Input, NodeId, Output, Progress, StakeEntry, StakingInterval, Timestamp, TransactionRow, TxId,
    TxType, UptimeAggregation, UptimeSample,
};

use crate::lock;

#[derive(Clone, Default)]
struct Tables {
    progress: BTreeMap<String, Progress>,
    transactions: BTreeMap<TxId, TransactionRow>,
    outputs: BTreeMap<(TxId, u32), Output>,
    inputs: BTreeMap<(TxId, TxId, u32), Input>,
    aggregations: BTreeMap<(u64, NodeId), UptimeAggregation>,
}

/// An in-memory implementation of every store trait.
///
/// Enforces the same uniqueness rules as the LMDB backend. Commits can be
/// made to fail on demand to exercise rollback paths.
#[derive(Default)]
pub struct NullStore {
    tables: Mutex<Tables>,
    samples: Mutex<Vec<UptimeSample>>,
    fail_commits: AtomicBool,
    commits: AtomicUsize,
}

impl NullStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following commit fail with a backend error.
    pub fn fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    /// Number of successful commits so far.
    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    pub fn transactions(&self) -> Vec<TransactionRow> {
        lock(&self.tables).transactions.values().cloned().collect()
    }

    pub fn outputs(&self) -> Vec<Output> {
        lock(&self.tables).outputs.values().cloned().collect()
    }

    pub fn inputs(&self) -> Vec<Input> {
        lock(&self.tables).inputs.values().cloned().collect()
    }

    pub fn samples(&self) -> Vec<UptimeSample> {
        lock(&self.samples).clone()
    }
}

fn insert_unique<K: Ord, V: PartialEq>(
    map: &mut BTreeMap<K, V>,
    key: K,
    value: V,
    what: impl FnOnce() -> String,
) -> Result<(), StoreError> {
    match map.get(&key) {
        Some(existing) if *existing == value => Ok(()),
        Some(_) => Err(StoreError::Duplicate(what())),
        None => {
            map.insert(key, value);
            Ok(())
        }
    }
}

fn check_unique<K: Ord, V: PartialEq>(
    map: &BTreeMap<K, V>,
    key: &K,
    value: &V,
    what: impl FnOnce() -> String,
) -> Result<(), StoreError> {
    match map.get(key) {
        Some(existing) if existing != value => Err(StoreError::Duplicate(what())),
        _ => Ok(()),
    }
}

impl Tables {
    fn put_transaction(&mut self, row: &TransactionRow) -> Result<(), StoreError> {
        insert_unique(&mut self.transactions, row.id, row.clone(), || {
            format!("transaction {}", row.id)
        })
    }

    fn put_output(&mut self, output: &Output) -> Result<(), StoreError> {
        insert_unique(
            &mut self.outputs,
            (output.tx_id, output.index),
            output.clone(),
            || output.outpoint().to_string(),
        )
    }

    fn put_input(&mut self, input: &Input) -> Result<(), StoreError> {
        if !input.is_resolved() {
            return Err(StoreError::InvalidRow(format!(
                "input of {} spending {} has no address",
                input.tx_id,
                input.outpoint()
            )));
        }
        insert_unique(
            &mut self.inputs,
            (input.tx_id, input.referenced_tx_id, input.referenced_index),
            input.clone(),
            || format!("input {} -> {}", input.tx_id, input.outpoint()),
        )
    }

    fn put_aggregation(&mut self, aggregation: &UptimeAggregation) -> Result<(), StoreError> {
        insert_unique(
            &mut self.aggregations,
            (aggregation.epoch, aggregation.node_id),
            aggregation.clone(),
            || format!("aggregation {} {}", aggregation.epoch, aggregation.node_id),
        )
    }

    /// Reject anything in `staged` that conflicts with `self`.
    fn check_against(&self, staged: &Tables) -> Result<(), StoreError> {
        for (key, row) in &staged.transactions {
            check_unique(&self.transactions, key, row, || format!("transaction {key}"))?;
        }
        for (key, output) in &staged.outputs {
            check_unique(&self.outputs, key, output, || output.outpoint().to_string())?;
        }
        for (key, input) in &staged.inputs {
            check_unique(&self.inputs, key, input, || format!("input {}", input.tx_id))?;
        }
        for (key, aggregation) in &staged.aggregations {
            check_unique(&self.aggregations, key, aggregation, || {
                format!("aggregation {}", key.0)
            })?;
        }
        Ok(())
    }

    fn apply(&mut self, staged: Tables) {
        self.transactions.extend(staged.transactions);
        self.outputs.extend(staged.outputs);
        self.inputs.extend(staged.inputs);
        self.aggregations.extend(staged.aggregations);
        self.progress.extend(staged.progress);
    }

    fn staking_rows(&self, from: Option<Timestamp>, to: Timestamp) -> Vec<&TransactionRow> {
        let mut rows: Vec<&TransactionRow> = self
            .transactions
            .values()
            .filter(|row| row.tx_type.is_staking())
            .filter(|row| match &row.stake {
                Some(stake) => {
                    stake.start_time < to && from.map_or(true, |from| stake.start_time >= from)
                }
                None => false,
            })
            .collect();
        rows.sort_by_key(|row| (row.stake.as_ref().map(|s| s.start_time), row.id));
        rows
    }
}

impl ProgressStore for NullStore {
    fn get_progress(&self, name: &str) -> Result<Option<Progress>, StoreError> {
        Ok(lock(&self.tables).progress.get(name).cloned())
    }

    fn put_progress(&self, progress: &Progress) -> Result<(), StoreError> {
        lock(&self.tables)
            .progress
            .insert(progress.name.clone(), progress.clone());
        Ok(())
    }
}

impl OutputStore for NullStore {
    fn get_outputs(&self, tx_ids: &[TxId]) -> Result<Vec<Output>, StoreError> {
        let tables = lock(&self.tables);
        Ok(tables
            .outputs
            .values()
            .filter(|o| tx_ids.contains(&o.tx_id))
            .cloned()
            .collect())
    }
}

impl TransactionStore for NullStore {
    fn get_transaction(&self, id: &TxId) -> Result<Option<TransactionRow>, StoreError> {
        Ok(lock(&self.tables).transactions.get(id).cloned())
    }

    fn get_inputs(&self, tx_id: &TxId) -> Result<Vec<Input>, StoreError> {
        Ok(lock(&self.tables)
            .inputs
            .values()
            .filter(|i| i.tx_id == *tx_id)
            .cloned()
            .collect())
    }

    fn stake_entries(
        &self,
        from: Timestamp,
        to: Timestamp,
    ) -> Result<Vec<StakeEntry>, StoreError> {
        let tables = lock(&self.tables);
        let mut entries = Vec::new();
        for row in tables.staking_rows(Some(from), to) {
            let Some(stake) = &row.stake else { continue };
            for input in tables.inputs.values().filter(|i| i.tx_id == row.id) {
                let Some(address) = input.address else { continue };
                entries.push(StakeEntry {
                    tx_id: row.id,
                    tx_type: row.tx_type,
                    node_id: stake.node_id,
                    address,
                    weight: stake.weight,
                    start_time: stake.start_time,
                    end_time: stake.end_time,
                    signer_public_key: stake.signer_public_key.clone(),
                });
            }
        }
        Ok(entries)
    }

    fn staking_intervals(
        &self,
        from: Timestamp,
        to: Timestamp,
    ) -> Result<Vec<StakingInterval>, StoreError> {
        let tables = lock(&self.tables);
        let mut intervals: Vec<StakingInterval> = tables
            .staking_rows(None, to)
            .into_iter()
            .filter(|row| row.tx_type == TxType::AddValidator)
            .filter_map(|row| row.stake.as_ref())
            .filter(|stake| stake.end_time > from)
            .map(|stake| StakingInterval {
                node_id: stake.node_id,
                start_time: stake.start_time,
                end_time: stake.end_time,
            })
            .collect();
        intervals.sort_by_key(|i| (i.node_id, i.start_time));
        Ok(intervals)
    }
}

impl UptimeStore for NullStore {
    fn append_sample(&self, sample: &UptimeSample) -> Result<(), StoreError> {
        lock(&self.samples).push(sample.clone());
        Ok(())
    }

    fn node_samples(
        &self,
        node_id: &NodeId,
        from: Timestamp,
        to: Timestamp,
    ) -> Result<Vec<UptimeSample>, StoreError> {
        let mut samples: Vec<UptimeSample> = lock(&self.samples)
            .iter()
            .filter(|s| s.node_id.as_ref() == Some(node_id))
            .filter(|s| s.timestamp >= from && s.timestamp <= to)
            .cloned()
            .collect();
        samples.sort_by_key(|s| (s.timestamp, s.status.code()));
        Ok(samples)
    }

    fn max_aggregated_epoch(&self) -> Result<Option<u64>, StoreError> {
        Ok(lock(&self.tables)
            .aggregations
            .keys()
            .next_back()
            .map(|(epoch, _)| *epoch))
    }

    fn aggregations_for_epoch(&self, epoch: u64) -> Result<Vec<UptimeAggregation>, StoreError> {
        Ok(lock(&self.tables)
            .aggregations
            .range((epoch, NodeId::new([0; 20]))..=(epoch, NodeId::new([0xff; 20])))
            .map(|(_, a)| a.clone())
            .collect())
    }
}

/// Write batch over [`NullStore`]. Rows are staged locally and merged on
/// commit.
pub struct NullWriteBatch<'a> {
    store: &'a NullStore,
    staged: Tables,
}

impl NullWriteBatch<'_> {
    fn check_committed(&self, f: impl FnOnce(&Tables) -> Result<(), StoreError>) -> Result<(), StoreError> {
        f(&lock(&self.store.tables))
    }
}

impl WriteBatch for NullWriteBatch<'_> {
    fn put_transaction(&mut self, row: &TransactionRow) -> Result<(), StoreError> {
        self.check_committed(|t| {
            check_unique(&t.transactions, &row.id, row, || format!("transaction {}", row.id))
        })?;
        self.staged.put_transaction(row)
    }

    fn put_output(&mut self, output: &Output) -> Result<(), StoreError> {
        self.check_committed(|t| {
            check_unique(&t.outputs, &(output.tx_id, output.index), output, || {
                output.outpoint().to_string()
            })
        })?;
        self.staged.put_output(output)
    }

    fn put_input(&mut self, input: &Input) -> Result<(), StoreError> {
        let key = (input.tx_id, input.referenced_tx_id, input.referenced_index);
        self.check_committed(|t| {
            check_unique(&t.inputs, &key, input, || format!("input {}", input.tx_id))
        })?;
        self.staged.put_input(input)
    }

    fn put_aggregation(&mut self, aggregation: &UptimeAggregation) -> Result<(), StoreError> {
        let key = (aggregation.epoch, aggregation.node_id);
        self.check_committed(|t| {
            check_unique(&t.aggregations, &key, aggregation, || {
                format!("aggregation {}", aggregation.epoch)
            })
        })?;
        self.staged.put_aggregation(aggregation)
    }

    fn put_progress(&mut self, progress: &Progress) -> Result<(), StoreError> {
        self.staged
            .progress
            .insert(progress.name.clone(), progress.clone());
        Ok(())
    }

    fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let NullWriteBatch { store, staged } = *self;
        if store.fail_commits.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("injected commit failure".into()));
        }
        let mut tables = lock(&store.tables);
        tables.check_against(&staged)?;
        tables.apply(staged);
        store.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl BatchStore for NullStore {
    fn write_batch(&self) -> Result<Box<dyn WriteBatch + '_>, StoreError> {
        Ok(Box::new(NullWriteBatch {
            store: self,
            staged: Tables::default(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use attest_types::Address;

    fn output(tx: u8, amount: u64) -> Output {
        Output {
            tx_id: TxId::new([tx; 32]),
            index: 0,
            amount,
            address: Address::new([tx; 20]),
        }
    }

    #[test]
    fn dropped_batch_writes_nothing() {
        let store = NullStore::new();
        {
            let mut batch = store.write_batch().unwrap();
            batch.put_output(&output(1, 5)).unwrap();
        }
        assert!(store.outputs().is_empty());
    }

    #[test]
    fn identical_rewrite_is_noop_and_conflict_fails() {
        let store = NullStore::new();
        let mut batch = store.write_batch().unwrap();
        batch.put_output(&output(1, 5)).unwrap();
        batch.commit().unwrap();

        let mut batch = store.write_batch().unwrap();
        batch.put_output(&output(1, 5)).unwrap();
        assert!(matches!(
            batch.put_output(&output(1, 6)),
            Err(StoreError::Duplicate(_))
        ));
        assert_eq!(store.outputs().len(), 1);
    }

    #[test]
    fn failed_commit_keeps_progress() {
        let store = NullStore::new();
        store.fail_commits(true);
        let mut batch = store.write_batch().unwrap();
        batch
            .put_progress(&Progress::new("s").advanced(3, 3, Timestamp::new(1)))
            .unwrap();
        assert!(batch.commit().is_err());
        assert_eq!(store.get_progress("s").unwrap(), None);
        assert_eq!(store.commit_count(), 0);
    }
}
