//! Uptime sampling and aggregation against the nullable store, ledger and
//! contracts.

use std::sync::Arc;
use std::time::Duration;

use attest_cronjobs::{
    record_start, ContractError, Cronjob, EpochConfig, UptimeAggregationJob, UptimeSamplerJob,
};
use attest_indexer::{LedgerError, ValidatorStatus};
use attest_nullables::{NullClock, NullContracts, NullLedger, NullStore};
use attest_store::{BatchStore, UptimeStore};
use attest_types::{
    NodeId, StakeInfo, Timestamp, TransactionRow, TxId, TxType, UptimeAggregation, UptimeSample,
    UptimeStatus,
};

const THRESHOLD: f64 = 0.5;

fn epochs() -> EpochConfig {
    EpochConfig::new(Timestamp::new(1_000), 100).unwrap()
}

fn node(n: u8) -> NodeId {
    NodeId::new([n; 20])
}

fn add_validator(store: &NullStore, tx: u8, node_id: NodeId, start: u64, end: u64) {
    let mut batch = store.write_batch().unwrap();
    batch
        .put_transaction(&TransactionRow {
            id: TxId::new([tx; 32]),
            tx_type: TxType::AddValidator,
            container_index: tx as u64,
            block_height: tx as u64,
            timestamp: Timestamp::new(start),
            stake: Some(StakeInfo {
                node_id,
                start_time: Timestamp::new(start),
                end_time: Timestamp::new(end),
                weight: 2_000,
                signer_public_key: None,
            }),
        })
        .unwrap();
    batch.commit().unwrap();
}

fn sample(store: &NullStore, node_id: NodeId, status: UptimeStatus, t: u64) {
    store
        .append_sample(&UptimeSample {
            node_id: Some(node_id),
            status,
            timestamp: Timestamp::new(t),
        })
        .unwrap();
}

/// Node 1 stakes `[1000, 1090)` with a 30 second outage; node 2 stakes the
/// whole first epoch and is never sampled.
fn seeded_store() -> Arc<NullStore> {
    let store = Arc::new(NullStore::new());
    add_validator(&store, 1, node(1), 1_000, 1_090);
    add_validator(&store, 2, node(2), 1_000, 1_400);
    sample(&store, node(1), UptimeStatus::Connected, 1_000);
    sample(&store, node(1), UptimeStatus::Disconnected, 1_030);
    sample(&store, node(1), UptimeStatus::Connected, 1_060);
    store
}

fn job(
    store: &Arc<NullStore>,
    contracts: &Arc<NullContracts>,
    now: u64,
) -> UptimeAggregationJob<NullStore, NullContracts> {
    UptimeAggregationJob::new(
        store.clone(),
        contracts.clone(),
        epochs(),
        Arc::new(NullClock::new(now)),
        THRESHOLD,
    )
}

#[tokio::test]
async fn aggregates_connected_time_and_votes_qualified_nodes() {
    let store = seeded_store();
    let contracts = Arc::new(NullContracts::new());
    let mut job = job(&store, &contracts, 1_150);

    let report = job.run_cycle().await.unwrap();
    assert_eq!(report.epochs, 1);

    let rows = store.aggregations_for_epoch(0).unwrap();
    assert_eq!(
        rows,
        vec![
            UptimeAggregation {
                epoch: 0,
                node_id: node(1),
                start_time: Timestamp::new(1_000),
                end_time: Timestamp::new(1_090),
                connected_seconds: 60,
                staking_duration_seconds: 90,
            },
            UptimeAggregation {
                epoch: 0,
                node_id: node(2),
                start_time: Timestamp::new(1_000),
                end_time: Timestamp::new(1_100),
                connected_seconds: 0,
                staking_duration_seconds: 100,
            },
        ]
    );
    assert_eq!(contracts.uptime_votes(), vec![(0, vec![node(1)])]);

    assert!(job.run_cycle().await.unwrap().is_idle());
}

#[tokio::test]
async fn submission_failure_still_persists_computed_epochs() {
    let store = seeded_store();
    let contracts = Arc::new(NullContracts::new());
    contracts.fail_uptime_votes_from(Some((1, ContractError::Unavailable("gateway".into()))));
    let mut job = job(&store, &contracts, 1_350);

    assert!(job.run_cycle().await.is_err());
    assert_eq!(store.max_aggregated_epoch().unwrap(), Some(1));
    assert_eq!(job.next_epoch().unwrap(), 1);
    assert_eq!(contracts.uptime_votes().len(), 1);

    contracts.fail_uptime_votes_from(None);
    let report = job.run_cycle().await.unwrap();
    assert_eq!(report.epochs, 2);
    assert_eq!(
        contracts
            .uptime_votes()
            .iter()
            .map(|(epoch, _)| *epoch)
            .collect::<Vec<_>>(),
        vec![0, 1, 2]
    );
    assert_eq!(store.max_aggregated_epoch().unwrap(), Some(2));
}

#[tokio::test]
async fn failed_first_vote_is_retried_in_the_same_process() {
    let store = seeded_store();
    let contracts = Arc::new(NullContracts::new());
    contracts.fail_uptime_votes_from(Some((0, ContractError::Unavailable("gateway".into()))));
    let mut job = job(&store, &contracts, 1_150);

    assert!(job.run_cycle().await.is_err());
    assert_eq!(store.max_aggregated_epoch().unwrap(), Some(0));
    assert_eq!(job.next_epoch().unwrap(), 0);
    assert!(contracts.uptime_votes().is_empty());

    contracts.fail_uptime_votes_from(None);
    let report = job.run_cycle().await.unwrap();
    assert_eq!(report.epochs, 1);
    assert_eq!(contracts.uptime_votes(), vec![(0, vec![node(1)])]);
}

#[tokio::test]
async fn cancelled_cycle_keeps_rows_of_voted_epochs() {
    let store = seeded_store();
    let contracts = Arc::new(NullContracts::new());
    contracts.stall_uptime_votes_from(Some(1));
    let mut job = job(&store, &contracts, 1_350);

    let cancelled = tokio::time::timeout(Duration::from_millis(50), job.run_cycle()).await;
    assert!(cancelled.is_err());
    assert_eq!(contracts.uptime_votes(), vec![(0, vec![node(1)])]);
    assert_eq!(store.aggregations_for_epoch(0).unwrap().len(), 2);
    assert_eq!(store.max_aggregated_epoch().unwrap(), Some(1));
    assert_eq!(job.next_epoch().unwrap(), 1);

    contracts.stall_uptime_votes_from(None);
    job.run_cycle().await.unwrap();
    assert_eq!(
        contracts
            .uptime_votes()
            .iter()
            .map(|(epoch, _)| *epoch)
            .collect::<Vec<_>>(),
        vec![0, 1, 2]
    );
}

#[tokio::test]
async fn resumes_after_the_last_persisted_epoch() {
    let store = seeded_store();
    let contracts = Arc::new(NullContracts::new());
    job(&store, &contracts, 1_150).run_cycle().await.unwrap();

    let restarted = job(&store, &contracts, 1_350);
    assert_eq!(restarted.next_epoch().unwrap(), 1);
}

#[tokio::test]
async fn nodes_below_threshold_are_not_voted() {
    let store = Arc::new(NullStore::new());
    add_validator(&store, 1, node(1), 1_000, 1_100);
    sample(&store, node(1), UptimeStatus::Disconnected, 1_000);
    sample(&store, node(1), UptimeStatus::Connected, 1_080);
    let contracts = Arc::new(NullContracts::new());

    job(&store, &contracts, 1_150).run_cycle().await.unwrap();
    assert_eq!(contracts.uptime_votes(), vec![(0, Vec::new())]);
    let rows = store.aggregations_for_epoch(0).unwrap();
    assert_eq!(rows[0].connected_seconds, 20);
}

#[tokio::test]
async fn sampler_records_each_validator() {
    let store = Arc::new(NullStore::new());
    let ledger = Arc::new(NullLedger::new());
    ledger.set_validators(vec![
        ValidatorStatus {
            node_id: node(1),
            connected: true,
        },
        ValidatorStatus {
            node_id: node(2),
            connected: false,
        },
    ]);
    let mut sampler = UptimeSamplerJob::new(store.clone(), ledger, Arc::new(NullClock::new(1_234)));

    let report = sampler.run_cycle().await.unwrap();
    assert_eq!(report.submitted, 2);
    assert_eq!(
        store.samples(),
        vec![
            UptimeSample {
                node_id: Some(node(1)),
                status: UptimeStatus::Connected,
                timestamp: Timestamp::new(1_234),
            },
            UptimeSample {
                node_id: Some(node(2)),
                status: UptimeStatus::Disconnected,
                timestamp: Timestamp::new(1_234),
            },
        ]
    );
}

#[tokio::test]
async fn sampler_records_ledger_failures() {
    let store = Arc::new(NullStore::new());
    let ledger = Arc::new(NullLedger::new());
    let mut sampler =
        UptimeSamplerJob::new(store.clone(), ledger.clone(), Arc::new(NullClock::new(10)));

    ledger.fail_with(Some(LedgerError::Timeout("slow".into())));
    sampler.run_cycle().await.unwrap();
    ledger.fail_with(Some(LedgerError::Unavailable("down".into())));
    sampler.run_cycle().await.unwrap();
    record_start(store.as_ref(), Timestamp::new(11)).unwrap();

    let statuses: Vec<_> = store
        .samples()
        .iter()
        .map(|s| (s.node_id, s.status))
        .collect();
    assert_eq!(
        statuses,
        vec![
            (None, UptimeStatus::Timeout),
            (None, UptimeStatus::ServiceError),
            (None, UptimeStatus::IndexerStarted),
        ]
    );
}
