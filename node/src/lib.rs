//! Attestation indexer service.
//!
//! Wires one LMDB store, one indexing stream and the enabled epoch cronjobs
//! into independent timer loops that share nothing but the store, plus the
//! configuration, metrics and shutdown plumbing around them.

pub mod config;
pub mod error;
pub mod metrics;
pub mod service;
pub mod shutdown;
pub mod stream;

pub use config::{
    EpochsConfig, IndexerConfig, MetricsConfig, MirrorConfig, NodeConfig, UptimeConfig,
    VotingConfig,
};
pub use error::NodeError;
pub use metrics::{metrics_router, serve_metrics, IndexerMetrics};
pub use service::IndexerService;
pub use shutdown::{ShutdownController, StopReason};
pub use stream::run_stream;
