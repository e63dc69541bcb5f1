//! Batch indexing of an append-only remote ledger.
//!
//! The [`IndexingEngine`] polls a [`LedgerClient`] for new containers, hands
//! them to a chain-specific [`BatchProcessor`], completes every input through
//! the three-tier [`UtxoResolver`] and persists the rows together with the
//! stream's progress cursor in one write batch.

pub mod engine;
pub mod error;
pub mod http;
pub mod json;
pub mod ledger;
pub mod processor;
pub mod resolver;

pub use engine::{CycleOutcome, IndexingEngine, StreamConfig, DEFAULT_BATCH_SIZE};
pub use error::IndexerError;
pub use http::HttpLedgerClient;
pub use json::{JsonBatchProcessor, JsonContainer, JsonInput, JsonOutput, JsonStake, JsonTx, LedgerOutputFetcher};
pub use ledger::{Container, LedgerClient, LedgerError, ValidatorStatus};
pub use processor::{BatchProcessor, BatchRows};
pub use resolver::{OutputFetcher, ResolveStats, UtxoResolver, DEFAULT_CACHE_CAPACITY};
