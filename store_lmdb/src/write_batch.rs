//! LMDB write batch: one read-write transaction per batch.

use heed::RwTxn;

use attest_store::{StoreError, WriteBatch};
use attest_types::{Input, Output, Progress, TransactionRow, UptimeAggregation};

use crate::progress::write_progress;
use crate::transaction::write_transaction;
use crate::uptime::write_aggregation;
use crate::utxo::{write_input, write_output};
use crate::{LmdbEnvironment, LmdbError};

/// Stages writes in an LMDB write transaction. Dropping the batch aborts the
/// transaction.
pub struct LmdbWriteBatch<'a> {
    txn: RwTxn<'a>,
    env: &'a LmdbEnvironment,
}

impl<'a> LmdbWriteBatch<'a> {
    pub(crate) fn new(env: &'a LmdbEnvironment) -> Result<Self, StoreError> {
        let txn = env.env().write_txn().map_err(LmdbError::from)?;
        Ok(Self { txn, env })
    }
}

impl WriteBatch for LmdbWriteBatch<'_> {
    fn put_transaction(&mut self, row: &TransactionRow) -> Result<(), StoreError> {
        write_transaction(self.env, &mut self.txn, row)
    }

    fn put_output(&mut self, output: &Output) -> Result<(), StoreError> {
        write_output(self.env, &mut self.txn, output)
    }

    fn put_input(&mut self, input: &Input) -> Result<(), StoreError> {
        write_input(self.env, &mut self.txn, input)
    }

    fn put_aggregation(&mut self, aggregation: &UptimeAggregation) -> Result<(), StoreError> {
        write_aggregation(self.env, &mut self.txn, aggregation)
    }

    fn put_progress(&mut self, progress: &Progress) -> Result<(), StoreError> {
        write_progress(self.env, &mut self.txn, progress)
    }

    fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let this = *self;
        this.txn.commit().map_err(LmdbError::from)?;
        Ok(())
    }
}
