//! LMDB implementation of TransactionStore.
//!
//! Staking transactions get a secondary `stake_by_start` entry keyed by start
//! time so epoch queries are a single range scan.

use std::ops::Bound;

use heed::{RoTxn, RwTxn};

use attest_store::{StoreError, TransactionStore};
use attest_types::{Input, StakeEntry, StakingInterval, Timestamp, TransactionRow, TxId, TxType};

use crate::environment::{decode, encode, put_unique};
use crate::keys::{stake_start_key, tx_id_from_stake_key};
use crate::{LmdbEnvironment, LmdbError};

pub(crate) fn write_transaction(
    env: &LmdbEnvironment,
    txn: &mut RwTxn,
    row: &TransactionRow,
) -> Result<(), StoreError> {
    let what = format!("transaction {}", row.id);
    put_unique(
        &env.transactions_db,
        txn,
        row.id.as_bytes(),
        &encode(row)?,
        &what,
    )?;
    if let (true, Some(stake)) = (row.tx_type.is_staking(), &row.stake) {
        let key = stake_start_key(stake.start_time, &row.id);
        put_unique(&env.stake_by_start_db, txn, &key, &[], &what)?;
    }
    Ok(())
}

impl LmdbEnvironment {
    fn read_transaction(&self, rtxn: &RoTxn, id: &TxId) -> Result<Option<TransactionRow>, StoreError> {
        self.transactions_db
            .get(rtxn, id.as_bytes())
            .map_err(LmdbError::from)?
            .map(decode)
            .transpose()
    }

    fn read_inputs(&self, rtxn: &RoTxn, tx_id: &TxId) -> Result<Vec<Input>, StoreError> {
        let mut inputs = Vec::new();
        for entry in self
            .inputs_db
            .prefix_iter(rtxn, tx_id.as_bytes())
            .map_err(LmdbError::from)?
        {
            let (_, value) = entry.map_err(LmdbError::from)?;
            inputs.push(decode(value)?);
        }
        Ok(inputs)
    }

    /// Staking transactions whose start time is in `[from, to)`, in start
    /// time order.
    fn staking_rows(
        &self,
        rtxn: &RoTxn,
        from: Option<Timestamp>,
        to: Timestamp,
    ) -> Result<Vec<TransactionRow>, StoreError> {
        let hi = stake_start_key(to, &TxId::ZERO);
        let lo = from.map(|from| stake_start_key(from, &TxId::ZERO));
        let range = (
            lo.as_ref()
                .map_or(Bound::Unbounded, |lo| Bound::Included(&lo[..])),
            Bound::Excluded(&hi[..]),
        );

        let mut rows = Vec::new();
        for entry in self
            .stake_by_start_db
            .range(rtxn, &range)
            .map_err(LmdbError::from)?
        {
            let (key, _) = entry.map_err(LmdbError::from)?;
            let tx_id = tx_id_from_stake_key(key)
                .ok_or_else(|| StoreError::Corruption("short stake index key".into()))?;
            let row = self.read_transaction(rtxn, &tx_id)?.ok_or_else(|| {
                StoreError::Corruption(format!("stake index points at missing {tx_id}"))
            })?;
            rows.push(row);
        }
        Ok(rows)
    }
}

impl TransactionStore for LmdbEnvironment {
    fn get_transaction(&self, id: &TxId) -> Result<Option<TransactionRow>, StoreError> {
        let rtxn = self.env().read_txn().map_err(LmdbError::from)?;
        self.read_transaction(&rtxn, id)
    }

    fn get_inputs(&self, tx_id: &TxId) -> Result<Vec<Input>, StoreError> {
        let rtxn = self.env().read_txn().map_err(LmdbError::from)?;
        self.read_inputs(&rtxn, tx_id)
    }

    fn stake_entries(
        &self,
        from: Timestamp,
        to: Timestamp,
    ) -> Result<Vec<StakeEntry>, StoreError> {
        let rtxn = self.env().read_txn().map_err(LmdbError::from)?;
        let mut entries = Vec::new();
        for row in self.staking_rows(&rtxn, Some(from), to)? {
            let Some(stake) = row.stake else { continue };
            for input in self.read_inputs(&rtxn, &row.id)? {
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
        let rtxn = self.env().read_txn().map_err(LmdbError::from)?;
        let mut intervals: Vec<StakingInterval> = self
            .staking_rows(&rtxn, None, to)?
            .into_iter()
            .filter(|row| row.tx_type == TxType::AddValidator)
            .filter_map(|row| row.stake)
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::test_support::temp_env;
    use attest_store::BatchStore;
    use attest_types::{Address, NodeId, Output, StakeInfo};

    fn staking_row(id: u8, tx_type: TxType, node: u8, start: u64, end: u64) -> TransactionRow {
        TransactionRow {
            id: TxId::new([id; 32]),
            tx_type,
            container_index: id as u64,
            block_height: id as u64,
            timestamp: Timestamp::new(start),
            stake: Some(StakeInfo {
                node_id: NodeId::new([node; 20]),
                start_time: Timestamp::new(start),
                end_time: Timestamp::new(end),
                weight: 2_000,
                signer_public_key: None,
            }),
        }
    }

    fn resolved_input(tx: u8, funding: u8, index: u32, addr: u8) -> Input {
        let mut input = Input::spending(TxId::new([tx; 32]), TxId::new([funding; 32]), index);
        input.resolve_from(&Output {
            tx_id: TxId::new([funding; 32]),
            index,
            amount: 10,
            address: Address::new([addr; 20]),
        });
        input
    }

    fn seed(env: &LmdbEnvironment, rows: &[TransactionRow], inputs: &[Input]) {
        let mut batch = env.write_batch().unwrap();
        for row in rows {
            batch.put_transaction(row).unwrap();
        }
        for input in inputs {
            batch.put_input(input).unwrap();
        }
        batch.commit().unwrap();
    }

    #[test]
    fn transaction_roundtrip() {
        let (_dir, env) = temp_env();
        let row = staking_row(1, TxType::AddValidator, 1, 100, 200);
        seed(&env, &[row.clone()], &[]);
        assert_eq!(env.get_transaction(&row.id).unwrap(), Some(row));
        assert_eq!(env.get_transaction(&TxId::new([9; 32])).unwrap(), None);
    }

    #[test]
    fn stake_entries_filter_on_start_time() {
        let (_dir, env) = temp_env();
        seed(
            &env,
            &[
                staking_row(1, TxType::AddValidator, 1, 100, 500),
                staking_row(2, TxType::AddDelegator, 1, 150, 500),
                staking_row(3, TxType::AddValidator, 2, 200, 500),
            ],
            &[
                resolved_input(1, 10, 0, 0xaa),
                resolved_input(2, 10, 1, 0xbb),
                resolved_input(2, 11, 0, 0xcc),
                resolved_input(3, 12, 0, 0xdd),
            ],
        );

        let entries = env
            .stake_entries(Timestamp::new(100), Timestamp::new(200))
            .unwrap();
        let got: Vec<_> = entries.iter().map(|e| (e.tx_id, e.address)).collect();
        assert_eq!(
            got,
            vec![
                (TxId::new([1; 32]), Address::new([0xaa; 20])),
                (TxId::new([2; 32]), Address::new([0xbb; 20])),
                (TxId::new([2; 32]), Address::new([0xcc; 20])),
            ]
        );
    }

    #[test]
    fn staking_intervals_only_cover_overlapping_validators() {
        let (_dir, env) = temp_env();
        seed(
            &env,
            &[
                staking_row(1, TxType::AddValidator, 2, 0, 50),
                staking_row(2, TxType::AddValidator, 2, 60, 500),
                staking_row(3, TxType::AddDelegator, 1, 60, 500),
                staking_row(4, TxType::AddValidator, 1, 10, 300),
                staking_row(5, TxType::AddValidator, 3, 400, 500),
            ],
            &[],
        );

        let intervals = env
            .staking_intervals(Timestamp::new(100), Timestamp::new(200))
            .unwrap();
        let got: Vec<_> = intervals
            .iter()
            .map(|i| (i.node_id, i.start_time.as_secs()))
            .collect();
        assert_eq!(
            got,
            vec![(NodeId::new([1; 20]), 10), (NodeId::new([2; 20]), 60)]
        );
    }

    #[test]
    fn rolled_back_batch_leaves_no_rows() {
        let (_dir, env) = temp_env();
        let row = staking_row(1, TxType::AddValidator, 1, 100, 200);
        {
            let mut batch = env.write_batch().unwrap();
            batch.put_transaction(&row).unwrap();
        }
        assert_eq!(env.get_transaction(&row.id).unwrap(), None);
        assert!(env
            .stake_entries(Timestamp::new(0), Timestamp::new(1_000))
            .unwrap()
            .is_empty());
    }
}
