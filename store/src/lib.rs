//! Abstract storage traits for the attestation indexer.
//!
//! Every storage backend (LMDB, in-memory for testing) implements these
//! traits. The rest of the codebase depends only on the traits.
//!
//! Reads go through the per-concern traits. Every multi-row write goes through
//! a [`WriteBatch`], which is all-or-nothing: dropping a batch without calling
//! [`WriteBatch::commit`] discards every staged write.

pub mod batch;
pub mod error;
pub mod meta;
pub mod progress;
pub mod transaction;
pub mod uptime;
pub mod utxo;

pub use batch::{BatchStore, WriteBatch};
pub use error::StoreError;
pub use meta::MetaStore;
pub use progress::ProgressStore;
pub use transaction::TransactionStore;
pub use uptime::UptimeStore;
pub use utxo::OutputStore;

/// Everything the indexer and the cronjobs need from one backend.
pub trait Store:
    ProgressStore + OutputStore + TransactionStore + UptimeStore + BatchStore + Send + Sync
{
}

impl<T> Store for T where
    T: ProgressStore + OutputStore + TransactionStore + UptimeStore + BatchStore + Send + Sync
{
}
