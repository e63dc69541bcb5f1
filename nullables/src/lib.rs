//! Nullable infrastructure for deterministic testing.
//!
//! Every external dependency of the indexer (clock, storage, remote ledger,
//! contracts) is abstracted behind a trait. This crate provides test-friendly
//! implementations that:
//! - Return deterministic values
//! - Can be controlled programmatically
//! - Never touch the filesystem or network
//!
//! Usage: swap real implementations for nullables in tests.

pub mod clock;
pub mod contracts;
pub mod ledger;
pub mod store;

pub use clock::NullClock;
pub use contracts::NullContracts;
pub use ledger::NullLedger;
pub use store::NullStore;

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a mutex, ignoring poisoning from a panicked test thread.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
