//! Service configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use attest_cronjobs::{parse_contract_address, EpochConfig, Schedule};
use attest_indexer::{StreamConfig, DEFAULT_BATCH_SIZE, DEFAULT_CACHE_CAPACITY};
use attest_types::{AddressFormat, Timestamp};
use attest_utils::LogFormat;

use crate::NodeError;

/// Configuration for the attestation indexer service.
///
/// Can be loaded from a TOML file via [`NodeConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Human-readable prefix of ledger addresses, e.g. `"P-avax"`.
    #[serde(default)]
    pub address_prefix: String,

    /// Directory holding the LMDB environment.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default)]
    pub log_format: LogFormat,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub indexer: IndexerConfig,

    #[serde(default)]
    pub epochs: EpochsConfig,

    #[serde(default)]
    pub voting: VotingConfig,

    #[serde(default)]
    pub mirror: MirrorConfig,

    #[serde(default)]
    pub uptime: UptimeConfig,

    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IndexerConfig {
    #[serde(default = "default_ledger_url")]
    pub ledger_url: String,

    /// Name of the progress record the stream owns.
    #[serde(default = "default_stream")]
    pub stream: String,

    #[serde(default = "default_batch_size")]
    pub batch_size: u64,

    #[serde(default)]
    pub start_index: u64,

    #[serde(default = "default_indexer_interval")]
    pub interval_secs: u64,

    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_cycle_timeout")]
    pub cycle_timeout_secs: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EpochsConfig {
    /// Unix time at which epoch 0 starts.
    #[serde(default)]
    pub start: u64,

    #[serde(default = "default_epoch_period")]
    pub period_secs: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VotingConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_gateway_url")]
    pub gateway_url: String,

    /// Voting contract address.
    #[serde(default)]
    pub contract: String,

    #[serde(default = "default_job_interval")]
    pub interval_secs: u64,

    #[serde(default = "default_job_timeout")]
    pub timeout_secs: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MirrorConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_gateway_url")]
    pub gateway_url: String,

    /// Voting contract publishing the confirmed roots.
    #[serde(default)]
    pub voting_contract: String,

    /// Stake mirroring contract.
    #[serde(default)]
    pub contract: String,

    /// Address binder contract.
    #[serde(default)]
    pub binder_contract: String,

    #[serde(default = "default_job_interval")]
    pub interval_secs: u64,

    #[serde(default = "default_job_timeout")]
    pub timeout_secs: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UptimeConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_gateway_url")]
    pub gateway_url: String,

    /// Uptime voting contract address.
    #[serde(default)]
    pub contract: String,

    #[serde(default = "default_job_interval")]
    pub interval_secs: u64,

    #[serde(default = "default_job_timeout")]
    pub timeout_secs: u64,

    /// Minimum connected / staked ratio for a node to be voted.
    #[serde(default = "default_threshold")]
    pub threshold: f64,

    #[serde(default = "default_sample_interval")]
    pub sample_interval_secs: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_metrics_listen")]
    pub listen: SocketAddr,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_data_dir() -> PathBuf {
    PathBuf::from("./attest_data")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_ledger_url() -> String {
    "http://127.0.0.1:9650/ext/index/P/block".to_string()
}

fn default_stream() -> String {
    "p-chain".to_string()
}

fn default_batch_size() -> u64 {
    DEFAULT_BATCH_SIZE
}

fn default_indexer_interval() -> u64 {
    10
}

fn default_cache_capacity() -> usize {
    DEFAULT_CACHE_CAPACITY
}

fn default_request_timeout() -> u64 {
    30
}

fn default_cycle_timeout() -> u64 {
    300
}

fn default_epoch_period() -> u64 {
    90 * 60
}

fn default_gateway_url() -> String {
    "http://127.0.0.1:8545".to_string()
}

fn default_job_interval() -> u64 {
    60
}

fn default_job_timeout() -> u64 {
    120
}

fn default_threshold() -> f64 {
    0.8
}

fn default_sample_interval() -> u64 {
    60
}

fn default_metrics_listen() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 9100))
}

// ── Impl ───────────────────────────────────────────────────────────────

impl NodeConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, NodeError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| NodeError::Config(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, NodeError> {
        toml::from_str(s).map_err(|e| NodeError::Config(e.to_string()))
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, NodeError> {
        toml::to_string_pretty(self).map_err(|e| NodeError::Config(e.to_string()))
    }

    /// Check every setting a loop depends on. Enabled jobs must name
    /// well-formed contract addresses.
    pub fn validate(&self) -> Result<(), NodeError> {
        self.address_format()?;
        self.epoch_config()?;
        if self.indexer.batch_size == 0 {
            return Err(NodeError::Config("indexer.batch_size must be positive".into()));
        }
        if self.indexer.cache_capacity == 0 {
            return Err(NodeError::Config("indexer.cache_capacity must be positive".into()));
        }
        if self.voting.enabled {
            check_contract("voting.contract", &self.voting.contract)?;
        }
        if self.mirror.enabled {
            check_contract("mirror.voting_contract", &self.mirror.voting_contract)?;
            check_contract("mirror.contract", &self.mirror.contract)?;
            check_contract("mirror.binder_contract", &self.mirror.binder_contract)?;
        }
        if self.uptime.enabled {
            check_contract("uptime.contract", &self.uptime.contract)?;
            if !(0.0..=1.0).contains(&self.uptime.threshold) {
                return Err(NodeError::Config(format!(
                    "uptime.threshold {} is outside [0, 1]",
                    self.uptime.threshold
                )));
            }
        }
        Ok(())
    }

    pub fn address_format(&self) -> Result<AddressFormat, NodeError> {
        AddressFormat::new(self.address_prefix.clone())
            .map_err(|e| NodeError::Config(format!("address_prefix: {e}")))
    }

    pub fn epoch_config(&self) -> Result<EpochConfig, NodeError> {
        EpochConfig::new(Timestamp::new(self.epochs.start), self.epochs.period_secs)
            .map_err(|e| NodeError::Config(format!("epochs: {e}")))
    }

    pub fn stream_config(&self) -> StreamConfig {
        StreamConfig {
            name: self.indexer.stream.clone(),
            start_index: self.indexer.start_index,
            batch_size: self.indexer.batch_size,
        }
    }
}

impl IndexerConfig {
    pub fn schedule(&self) -> Schedule {
        schedule(self.interval_secs, self.cycle_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl VotingConfig {
    pub fn schedule(&self) -> Schedule {
        schedule(self.interval_secs, self.timeout_secs)
    }
}

impl MirrorConfig {
    pub fn schedule(&self) -> Schedule {
        schedule(self.interval_secs, self.timeout_secs)
    }
}

impl UptimeConfig {
    pub fn schedule(&self) -> Schedule {
        schedule(self.interval_secs, self.timeout_secs)
    }

    pub fn sampler_schedule(&self) -> Schedule {
        schedule(self.sample_interval_secs, self.timeout_secs)
    }
}

fn schedule(interval_secs: u64, timeout_secs: u64) -> Schedule {
    Schedule {
        interval: Duration::from_secs(interval_secs.max(1)),
        timeout: Duration::from_secs(timeout_secs.max(1)),
    }
}

fn check_contract(field: &str, value: &str) -> Result<(), NodeError> {
    parse_contract_address(value)
        .map(|_| ())
        .map_err(|e| NodeError::Config(format!("{field}: {e}")))
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            address_prefix: String::new(),
            data_dir: default_data_dir(),
            log_format: LogFormat::default(),
            log_level: default_log_level(),
            indexer: IndexerConfig::default(),
            epochs: EpochsConfig::default(),
            voting: VotingConfig::default(),
            mirror: MirrorConfig::default(),
            uptime: UptimeConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            ledger_url: default_ledger_url(),
            stream: default_stream(),
            batch_size: default_batch_size(),
            start_index: 0,
            interval_secs: default_indexer_interval(),
            cache_capacity: default_cache_capacity(),
            request_timeout_secs: default_request_timeout(),
            cycle_timeout_secs: default_cycle_timeout(),
        }
    }
}

impl Default for EpochsConfig {
    fn default() -> Self {
        Self {
            start: 0,
            period_secs: default_epoch_period(),
        }
    }
}

impl Default for VotingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            gateway_url: default_gateway_url(),
            contract: String::new(),
            interval_secs: default_job_interval(),
            timeout_secs: default_job_timeout(),
        }
    }
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            gateway_url: default_gateway_url(),
            voting_contract: String::new(),
            contract: String::new(),
            binder_contract: String::new(),
            interval_secs: default_job_interval(),
            timeout_secs: default_job_timeout(),
        }
    }
}

impl Default for UptimeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            gateway_url: default_gateway_url(),
            contract: String::new(),
            interval_secs: default_job_interval(),
            timeout_secs: default_job_timeout(),
            threshold: default_threshold(),
            sample_interval_secs: default_sample_interval(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen: default_metrics_listen(),
        }
    }
}
