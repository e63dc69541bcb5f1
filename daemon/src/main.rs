//! Attestation indexer daemon.

use anyhow::Context;
use attest_node::{IndexerService, NodeConfig};
use attest_utils::{init_logging, LogFormat};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "attest-daemon", about = "Ledger indexer and epoch attestation daemon")]
struct Cli {
    /// Path to a TOML configuration file. If provided, file settings
    /// are used as the base; CLI flags and env vars override them.
    #[arg(long, env = "ATTEST_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding the LMDB environment.
    #[arg(long, env = "ATTEST_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Prefix of ledger addresses, e.g. "P-avax".
    #[arg(long, env = "ATTEST_ADDRESS_PREFIX")]
    address_prefix: Option<String>,

    /// JSON-RPC endpoint of the ledger index.
    #[arg(long, env = "ATTEST_LEDGER_URL")]
    ledger_url: Option<String>,

    /// Enable the Prometheus metrics endpoint.
    #[arg(long, env = "ATTEST_ENABLE_METRICS")]
    metrics: bool,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "ATTEST_LOG_LEVEL")]
    log_level: Option<String>,

    #[arg(long, value_enum, env = "ATTEST_LOG_FORMAT")]
    log_format: Option<CliLogFormat>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum CliLogFormat {
    Human,
    Json,
}

impl From<CliLogFormat> for LogFormat {
    fn from(format: CliLogFormat) -> Self {
        match format {
            CliLogFormat::Human => LogFormat::Human,
            CliLogFormat::Json => LogFormat::Json,
        }
    }
}

#[derive(clap::Subcommand)]
enum Command {
    /// Run the indexer and every enabled job until SIGINT/SIGTERM.
    Run,

    /// Make the mirror job resume from `epoch` on its next cycle.
    MirrorReset {
        #[arg(long)]
        epoch: u64,
    },

    /// Print the effective configuration as TOML.
    ShowConfig,
}

fn load_config(cli: &Cli) -> anyhow::Result<NodeConfig> {
    let mut config = match &cli.config {
        Some(path) => NodeConfig::from_toml_file(path)
            .with_context(|| format!("loading config file {}", path.display()))?,
        None => NodeConfig::default(),
    };
    if let Some(data_dir) = &cli.data_dir {
        config.data_dir = data_dir.clone();
    }
    if let Some(prefix) = &cli.address_prefix {
        config.address_prefix = prefix.clone();
    }
    if let Some(url) = &cli.ledger_url {
        config.indexer.ledger_url = url.clone();
    }
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    if let Some(format) = cli.log_format {
        config.log_format = format.into();
    }
    config.metrics.enabled |= cli.metrics;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    init_logging(config.log_format, &config.log_level);

    match cli.command {
        Command::Run => {
            tracing::info!(
                data_dir = %config.data_dir.display(),
                stream = %config.indexer.stream,
                voting = config.voting.enabled,
                mirror = config.mirror.enabled,
                uptime = config.uptime.enabled,
                "starting attestation indexer"
            );
            let mut service = IndexerService::open(config)?;
            service.start()?;
            service.run_until_signal().await;
            tracing::info!("daemon exited cleanly");
        }
        Command::MirrorReset { epoch } => {
            let service = IndexerService::open(config)?;
            let progress = service.reset_mirror(epoch)?;
            println!("mirror job will resume at epoch {}", progress.next_index);
        }
        Command::ShowConfig => {
            print!("{}", config.to_toml_string()?);
        }
    }

    Ok(())
}
