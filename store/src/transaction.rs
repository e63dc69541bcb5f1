//! Indexed transaction queries.

use attest_types::{Input, StakeEntry, StakingInterval, Timestamp, TransactionRow, TxId};

use crate::StoreError;

pub trait TransactionStore {
    fn get_transaction(&self, id: &TxId) -> Result<Option<TransactionRow>, StoreError>;

    /// Inputs of one transaction, ordered by referenced output.
    fn get_inputs(&self, tx_id: &TxId) -> Result<Vec<Input>, StoreError>;

    /// Validator and delegator transactions whose start time lies in
    /// `[from, to)`, one entry per resolved input of each transaction.
    fn stake_entries(&self, from: Timestamp, to: Timestamp)
        -> Result<Vec<StakeEntry>, StoreError>;

    /// Validator staking periods intersecting `[from, to)`, sorted by node id
    /// then start time.
    fn staking_intervals(
        &self,
        from: Timestamp,
        to: Timestamp,
    ) -> Result<Vec<StakingInterval>, StoreError>;
}
