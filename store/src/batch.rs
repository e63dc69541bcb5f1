//! Scoped, all-or-nothing write batches.

use attest_types::{Input, Output, Progress, TransactionRow, UptimeAggregation};

use crate::StoreError;

/// A group of writes applied atomically on [`commit`](WriteBatch::commit).
///
/// Dropping the batch (early return, `?`, panic unwinding) rolls every staged
/// write back. Row writes enforce the table's unique key: re-writing an
/// identical row is a no-op, writing a different row under an existing key
/// fails with [`StoreError::Duplicate`].
pub trait WriteBatch {
    fn put_transaction(&mut self, row: &TransactionRow) -> Result<(), StoreError>;

    fn put_output(&mut self, output: &Output) -> Result<(), StoreError>;

    /// Persist a resolved input. Unresolved inputs are rejected with
    /// [`StoreError::InvalidRow`].
    fn put_input(&mut self, input: &Input) -> Result<(), StoreError>;

    fn put_aggregation(&mut self, aggregation: &UptimeAggregation) -> Result<(), StoreError>;

    /// Overwrite the cursor for `progress.name`.
    fn put_progress(&mut self, progress: &Progress) -> Result<(), StoreError>;

    /// Apply all staged writes.
    fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

/// Backends that can open a [`WriteBatch`].
pub trait BatchStore {
    fn write_batch(&self) -> Result<Box<dyn WriteBatch + '_>, StoreError>;
}
