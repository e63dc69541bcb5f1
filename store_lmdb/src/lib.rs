//! LMDB storage backend for the attestation indexer.
//!
//! Implements all storage traits from `attest-store` using the `heed` LMDB
//! bindings. Each logical table maps to one named LMDB database within a
//! single environment; composite keys are big-endian so range scans come back
//! in key order.

pub mod environment;
pub mod error;
mod keys;
pub mod meta;
pub mod migration;
pub mod progress;
pub mod transaction;
pub mod uptime;
pub mod utxo;
pub mod write_batch;

pub use environment::LmdbEnvironment;
pub use error::LmdbError;
pub use migration::{Migrator, CURRENT_SCHEMA_VERSION};
pub use write_batch::LmdbWriteBatch;
