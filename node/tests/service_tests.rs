//! Service wiring: the stream loop against nullables, and the LMDB-backed
//! service lifecycle.

use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use attest_cronjobs::{Schedule, MIRROR_JOB};
use attest_indexer::{
    IndexingEngine, JsonBatchProcessor, JsonContainer, JsonOutput, JsonTx, LedgerOutputFetcher,
    StreamConfig, UtxoResolver,
};
use attest_node::{
    run_stream, IndexerMetrics, IndexerService, NodeConfig, NodeError, ShutdownController,
    StopReason,
};
use attest_nullables::{NullClock, NullLedger, NullStore};
use attest_store::ProgressStore;
use attest_types::{Address, AddressFormat, TxId, TxType};

fn format() -> AddressFormat {
    AddressFormat::new("P-test").unwrap()
}

fn fast() -> Schedule {
    Schedule {
        interval: Duration::from_millis(10),
        timeout: Duration::from_secs(5),
    }
}

fn container(i: u64) -> JsonContainer {
    JsonContainer {
        height: i,
        timestamp: 1_000 + i,
        txs: vec![JsonTx {
            id: TxId::new([i as u8 + 1; 32]).to_string(),
            tx_type: TxType::Base,
            inputs: Vec::new(),
            outputs: vec![JsonOutput {
                amount: 5,
                address: format().format(&Address::new([3; 20])),
            }],
            stake: None,
        }],
    }
}

/// In-memory log sink for the fmt subscriber.
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn lines_containing(&self, needle: &str) -> usize {
        let bytes = self.0.lock().unwrap().clone();
        String::from_utf8_lossy(&bytes)
            .lines()
            .filter(|line| line.contains(needle))
            .count()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn stream_loop_indexes_and_reports() {
    let logs = CapturedLogs::default();
    let sink = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || sink.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::INFO)
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let store = Arc::new(NullStore::new());
    let ledger = Arc::new(NullLedger::new());
    for i in 0..5 {
        ledger.push_json(i, &container(i));
    }
    let fetcher = Arc::new(LedgerOutputFetcher::new(ledger.clone(), format()));
    let engine = IndexingEngine::new(
        StreamConfig {
            name: "p-chain".into(),
            start_index: 0,
            batch_size: 2,
        },
        store.clone(),
        ledger,
        JsonBatchProcessor::new(format()),
        UtxoResolver::new(16, fetcher),
        Arc::new(NullClock::new(2_000)),
    );
    let metrics = Arc::new(IndexerMetrics::new().unwrap());
    let shutdown = ShutdownController::new();
    let handle = tokio::spawn(run_stream(engine, fast(), shutdown.subscribe(), metrics.clone()));

    for _ in 0..100 {
        if metrics.containers_indexed.get() == 5 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    shutdown.request(StopReason::Requested);
    handle.await.unwrap();

    assert_eq!(metrics.containers_indexed.get(), 5);
    assert_eq!(
        metrics
            .stream_next_index
            .with_label_values(&["p-chain"])
            .get(),
        5
    );
    assert_eq!(store.get_progress("p-chain").unwrap().unwrap().next_index, 5);
    assert_eq!(metrics.indexing_cycles_failed.get(), 0);
    // Batches of 2, 2 and 1, one info line each.
    assert_eq!(logs.lines_containing("indexed containers"), 3);
}

fn service_config(dir: &std::path::Path) -> NodeConfig {
    let mut config = NodeConfig {
        address_prefix: "P-test".into(),
        data_dir: dir.to_path_buf(),
        ..NodeConfig::default()
    };
    config.indexer.ledger_url = "http://127.0.0.1:1".into();
    config.indexer.interval_secs = 1;
    config.indexer.request_timeout_secs = 1;
    config
}

#[test]
fn invalid_config_never_opens_the_store() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = service_config(dir.path());
    config.address_prefix = String::new();
    assert!(matches!(IndexerService::open(config), Err(NodeError::Config(_))));
}

#[test]
fn mirror_reset_is_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let service = IndexerService::open(service_config(dir.path())).unwrap();
    let progress = service.reset_mirror(7).unwrap();
    assert_eq!(progress.next_index, 7);
    assert_eq!(
        service
            .store()
            .get_progress(MIRROR_JOB)
            .unwrap()
            .unwrap()
            .next_index,
        7
    );
}

#[tokio::test]
async fn service_starts_and_stops_with_an_unreachable_ledger() {
    let dir = tempfile::tempdir().unwrap();
    let mut service = IndexerService::open(service_config(dir.path())).unwrap();
    service.start().unwrap();
    let metrics = service.metrics().clone();
    tokio::time::sleep(Duration::from_millis(200)).await;
    service.stop().await;

    assert_eq!(metrics.containers_indexed.get(), 0);
    assert!(metrics.indexing_cycles_failed.get() >= 1);
}

#[tokio::test]
async fn start_after_stop_request_spawns_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let mut service = IndexerService::open(service_config(dir.path())).unwrap();
    assert!(service.shutdown_controller().request(StopReason::Interrupt));
    service.start().unwrap();
    let metrics = service.metrics().clone();
    tokio::time::sleep(Duration::from_millis(100)).await;
    service.stop().await;

    assert_eq!(metrics.indexing_cycles_failed.get(), 0);
}
