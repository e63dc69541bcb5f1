//! Fundamental types for the attestation indexer.
//!
//! This crate defines the rows and identifiers shared across every other crate
//! in the workspace: transaction and node ids, addresses, UTXO outputs and
//! inputs, indexed transactions, progress cursors and uptime records.

pub mod address;
pub mod error;
pub mod hash;
pub mod node;
pub mod progress;
pub mod time;
pub mod transaction;
pub mod uptime;
pub mod utxo;

pub use address::{Address, AddressFormat};
pub use error::TypesError;
pub use hash::TxId;
pub use node::NodeId;
pub use progress::Progress;
pub use time::Timestamp;
pub use transaction::{StakeEntry, StakeInfo, StakingInterval, TransactionRow, TxType};
pub use uptime::{UptimeAggregation, UptimeSample, UptimeStatus};
pub use utxo::{Input, OutPoint, Output};
