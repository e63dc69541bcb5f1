//! The per-chain transformation capability driven by the indexing engine.

use attest_store::{StoreError, WriteBatch};
use attest_types::{Input, Output, TransactionRow};

use crate::ledger::Container;
use crate::IndexerError;

/// Rows produced by one batch of containers. Inputs are unresolved until the
/// engine runs them through the resolver.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BatchRows {
    pub transactions: Vec<TransactionRow>,
    pub outputs: Vec<Output>,
    pub inputs: Vec<Input>,
}

impl BatchRows {
    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty() && self.outputs.is_empty() && self.inputs.is_empty()
    }
}

/// Turns raw containers of one ledger into rows.
///
/// The engine calls [`reset`](Self::reset) once per cycle, then
/// [`add_container`](Self::add_container) for each container in ascending
/// index order, then [`process_batch`](Self::process_batch). Resolved rows
/// are handed back to [`persist`](Self::persist) inside the cycle's write
/// batch.
pub trait BatchProcessor: Send {
    fn reset(&mut self, expected_size: usize);

    fn add_container(&mut self, container: &Container) -> Result<(), IndexerError>;

    /// Finish the batch and hand over the accumulated rows.
    fn process_batch(&mut self) -> Result<BatchRows, IndexerError>;

    fn persist(&self, rows: &BatchRows, batch: &mut dyn WriteBatch) -> Result<(), StoreError> {
        for row in &rows.transactions {
            batch.put_transaction(row)?;
        }
        for output in &rows.outputs {
            batch.put_output(output)?;
        }
        for input in &rows.inputs {
            batch.put_input(input)?;
        }
        Ok(())
    }
}
