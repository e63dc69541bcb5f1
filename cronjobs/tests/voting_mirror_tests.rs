//! Voting and mirroring cycles against the nullable store and contracts.

use std::sync::Arc;

use attest_cronjobs::{
    ContractError, Cronjob, CronjobError, EpochCommitment, EpochConfig, MirrorJob, VotingJob,
    MIRROR_JOB, VOTING_JOB,
};
use attest_merkle::{empty_root, verify, H256};
use attest_nullables::{NullClock, NullContracts, NullStore};
use attest_store::{BatchStore, ProgressStore};
use attest_types::{
    Address, AddressFormat, Input, NodeId, Progress, StakeEntry, StakeInfo, Timestamp,
    TransactionRow, TxId, TxType,
};
use attest_utils::Clock;

const STREAM: &str = "p-chain";

fn epochs() -> EpochConfig {
    EpochConfig::new(Timestamp::new(1_000), 100).unwrap()
}

fn format() -> AddressFormat {
    AddressFormat::new("P-test").unwrap()
}

struct Stake {
    tx: u8,
    start: u64,
    addresses: Vec<u8>,
    signer: Option<Vec<u8>>,
}

impl Stake {
    fn new(tx: u8, start: u64, addresses: &[u8]) -> Self {
        Self {
            tx,
            start,
            addresses: addresses.to_vec(),
            signer: None,
        }
    }
}

fn seed(store: &NullStore, stakes: &[Stake]) {
    let mut batch = store.write_batch().unwrap();
    for stake in stakes {
        let id = TxId::new([stake.tx; 32]);
        batch
            .put_transaction(&TransactionRow {
                id,
                tx_type: TxType::AddDelegator,
                container_index: stake.tx as u64,
                block_height: stake.tx as u64,
                timestamp: Timestamp::new(stake.start),
                stake: Some(StakeInfo {
                    node_id: NodeId::new([9; 20]),
                    start_time: Timestamp::new(stake.start),
                    end_time: Timestamp::new(stake.start + 10_000),
                    weight: 2_000,
                    signer_public_key: stake.signer.clone(),
                }),
            })
            .unwrap();
        for (i, addr) in stake.addresses.iter().enumerate() {
            let mut input = Input::spending(id, TxId::new([0xee; 32]), i as u32);
            input.amount = 1_000;
            input.address = Some(Address::new([*addr; 20]));
            batch.put_input(&input).unwrap();
        }
    }
    batch.commit().unwrap();
}

fn indexed_until(store: &NullStore, secs: u64) {
    let progress = Progress::new(STREAM).advanced(0, 0, Timestamp::new(secs));
    store.put_progress(&progress).unwrap();
}

fn root_of(store: &NullStore, epoch: u64) -> H256 {
    let stakes = attest_cronjobs::epoch_stakes(store, &epochs(), epoch).unwrap();
    EpochCommitment::build(stakes).root()
}

fn next_index(store: &NullStore, job: &str) -> Option<u64> {
    store.get_progress(job).unwrap().map(|p| p.next_index)
}

struct Fixture {
    store: Arc<NullStore>,
    contracts: Arc<NullContracts>,
    clock: Arc<NullClock>,
}

/// Epoch 0 holds one stake, epoch 1 none, epoch 2 one stake spending two
/// inputs of the same address plus one of another.
fn fixture(now: u64) -> Fixture {
    let store = Arc::new(NullStore::new());
    seed(
        &store,
        &[Stake::new(1, 1_010, &[1]), Stake::new(2, 1_250, &[2, 2, 3])],
    );
    indexed_until(&store, now);
    Fixture {
        store,
        contracts: Arc::new(NullContracts::new()),
        clock: Arc::new(NullClock::new(now)),
    }
}

impl Fixture {
    fn voting(&self) -> VotingJob<NullStore, NullContracts> {
        VotingJob::new(
            self.store.clone(),
            self.contracts.clone(),
            epochs(),
            self.clock.clone(),
            STREAM,
        )
    }

    fn mirror(&self) -> MirrorJob<NullStore, NullContracts, NullContracts, NullContracts> {
        MirrorJob::new(
            self.store.clone(),
            self.contracts.clone(),
            self.contracts.clone(),
            self.contracts.clone(),
            format(),
            epochs(),
            self.clock.clone(),
            STREAM,
        )
    }

    fn publish_local_roots(&self, through: u64) {
        for epoch in 0..=through {
            self.contracts.publish_root(epoch, root_of(&self.store, epoch));
        }
    }
}

#[tokio::test]
async fn votes_every_elapsed_epoch_once() {
    let f = fixture(1_350);
    let mut job = f.voting();

    let report = job.run_cycle().await.unwrap();
    assert_eq!(report.epochs, 3);
    assert_eq!(report.submitted, 3);

    let votes = f.contracts.votes();
    assert_eq!(
        votes.iter().map(|(e, _)| *e).collect::<Vec<_>>(),
        vec![0, 1, 2]
    );
    assert_eq!(votes[1].1, empty_root());
    assert_eq!(votes[2].1, root_of(&f.store, 2));
    assert_eq!(next_index(&f.store, VOTING_JOB), Some(3));

    let report = job.run_cycle().await.unwrap();
    assert!(report.is_idle());
    assert_eq!(f.contracts.votes().len(), 3);
}

#[tokio::test]
async fn deduplicated_stakes_all_have_proofs() {
    let f = fixture(1_350);
    let stakes = attest_cronjobs::epoch_stakes(f.store.as_ref(), &epochs(), 2).unwrap();
    assert_eq!(stakes.len(), 2);
    let commitment = EpochCommitment::build(stakes);
    for (i, entry) in commitment.entries().iter().enumerate() {
        let proof = commitment.proof(i).unwrap();
        assert!(verify(&attest_merkle::stake_leaf(entry), &proof, &commitment.root()));
    }
}

#[tokio::test]
async fn voting_waits_for_the_indexer() {
    let f = fixture(1_350);
    indexed_until(&f.store, 1_150);
    let mut job = f.voting();

    job.run_cycle().await.unwrap();
    assert_eq!(f.contracts.votes().len(), 1);
    assert_eq!(next_index(&f.store, VOTING_JOB), Some(1));

    indexed_until(&f.store, 1_350);
    job.run_cycle().await.unwrap();
    assert_eq!(f.contracts.votes().len(), 3);
}

#[tokio::test]
async fn unwanted_votes_are_skipped_but_advance() {
    let f = fixture(1_350);
    f.contracts.vote_not_needed(1);
    let mut job = f.voting();

    let report = job.run_cycle().await.unwrap();
    assert_eq!(report.epochs, 3);
    assert_eq!(report.submitted, 2);
    assert_eq!(next_index(&f.store, VOTING_JOB), Some(3));
}

#[tokio::test]
async fn failed_vote_keeps_earlier_progress() {
    let f = fixture(1_350);
    f.contracts
        .fail_votes_from(Some((1, ContractError::Timeout("gateway".into()))));
    let mut job = f.voting();

    let err = job.run_cycle().await.unwrap_err();
    assert!(matches!(err, CronjobError::Contract(ContractError::Timeout(_))));
    assert_eq!(next_index(&f.store, VOTING_JOB), Some(1));

    f.contracts.fail_votes_from(None);
    job.run_cycle().await.unwrap();
    assert_eq!(next_index(&f.store, VOTING_JOB), Some(3));
}

#[tokio::test]
async fn voting_progress_is_monotonic() {
    let f = fixture(900);
    let mut job = f.voting();
    let mut last = 0;
    for _ in 0..12 {
        job.run_cycle().await.unwrap();
        indexed_until(&f.store, f.clock.now().as_secs());
        let next = next_index(&f.store, VOTING_JOB).unwrap_or(0);
        let current = epochs().epoch_index(f.clock.now()).unwrap_or(0);
        assert!(next >= last);
        assert!(next <= current);
        last = next;
        f.clock.advance(45);
    }
    assert!(last >= 3);
}

#[tokio::test]
async fn mirrors_confirmed_epochs() {
    let f = fixture(1_350);
    f.publish_local_roots(2);
    let mut job = f.mirror();

    let report = job.run_cycle().await.unwrap();
    assert_eq!(report.epochs, 3);
    assert_eq!(report.submitted, 3);
    assert_eq!(next_index(&f.store, MIRROR_JOB), Some(3));

    let mirrored = f.contracts.mirrored();
    assert_eq!(mirrored.len(), 3);
    let root = root_of(&f.store, 2);
    for (entry, proof) in mirrored.iter().skip(1) {
        assert!(verify(&attest_merkle::stake_leaf(entry), proof, &root));
    }
}

#[tokio::test]
async fn nothing_is_mirrored_before_a_root_is_published() {
    let f = fixture(1_350);
    let mut job = f.mirror();
    assert!(job.run_cycle().await.unwrap().is_idle());
    assert_eq!(next_index(&f.store, MIRROR_JOB), None);
}

#[tokio::test]
async fn root_mismatch_aborts_without_advancing() {
    let f = fixture(1_350);
    f.publish_local_roots(2);
    f.contracts.publish_root(1, H256::new([0x42; 32]));
    let mut job = f.mirror();

    let err = job.run_cycle().await.unwrap_err();
    assert!(matches!(err, CronjobError::RootMismatch { epoch: 1, .. }));
    assert_eq!(next_index(&f.store, MIRROR_JOB), None);
    assert_eq!(f.contracts.mirrored().len(), 1);
}

#[tokio::test]
async fn benign_rejections_count_as_done() {
    let f = fixture(1_350);
    f.publish_local_roots(2);
    f.contracts.fail_mirror(
        TxId::new([1; 32]),
        ContractError::Reverted("execution reverted: Already Mirrored".into()),
    );
    let mut job = f.mirror();

    let report = job.run_cycle().await.unwrap();
    assert_eq!(report.benign, 1);
    assert_eq!(report.submitted, 2);
    assert_eq!(next_index(&f.store, MIRROR_JOB), Some(3));
}

#[tokio::test]
async fn unknown_rejection_aborts_the_cycle() {
    let f = fixture(1_350);
    f.publish_local_roots(2);
    f.contracts.fail_mirror(
        TxId::new([2; 32]),
        ContractError::Reverted("execution reverted: out of gas".into()),
    );
    let mut job = f.mirror();

    assert!(job.run_cycle().await.is_err());
    assert_eq!(next_index(&f.store, MIRROR_JOB), None);
}

#[tokio::test]
async fn mirroring_never_runs_ahead_of_indexing() {
    let f = fixture(1_350);
    f.publish_local_roots(2);
    indexed_until(&f.store, 1_150);
    let mut job = f.mirror();

    let report = job.run_cycle().await.unwrap();
    assert_eq!(report.epochs, 1);
    assert_eq!(next_index(&f.store, MIRROR_JOB), None);
}

#[tokio::test]
async fn signer_keys_are_registered_once() {
    let store = Arc::new(NullStore::new());
    let mut signed = Stake::new(1, 1_010, &[1]);
    signed.signer = Some(vec![0x02; 33]);
    let mut known = Stake::new(2, 1_020, &[2]);
    known.signer = Some(vec![0x03; 33]);
    seed(&store, &[signed, known]);
    indexed_until(&store, 1_150);
    let f = Fixture {
        store,
        contracts: Arc::new(NullContracts::new()),
        clock: Arc::new(NullClock::new(1_150)),
    };
    f.contracts.mark_registered(Address::new([2; 20]));
    f.publish_local_roots(0);

    f.mirror().run_cycle().await.unwrap();
    assert_eq!(f.contracts.registrations(), vec![vec![0x02; 33]]);
    assert_eq!(f.contracts.mirrored().len(), 2);
}

#[tokio::test]
async fn registration_failure_does_not_block_mirroring() {
    let store = Arc::new(NullStore::new());
    let mut signed = Stake::new(1, 1_010, &[1]);
    signed.signer = Some(vec![0x02; 33]);
    seed(&store, &[signed]);
    indexed_until(&store, 1_150);
    let f = Fixture {
        store,
        contracts: Arc::new(NullContracts::new()),
        clock: Arc::new(NullClock::new(1_150)),
    };
    f.contracts
        .fail_registration(Some(ContractError::Reverted("binder paused".into())));
    f.publish_local_roots(0);

    f.mirror().run_cycle().await.unwrap();
    assert!(f.contracts.registrations().is_empty());
    assert_eq!(f.contracts.mirrored().len(), 1);
}

#[tokio::test]
async fn reset_replays_from_the_given_epoch() {
    let f = fixture(1_350);
    f.publish_local_roots(2);
    let mut job = f.mirror();
    job.run_cycle().await.unwrap();
    assert_eq!(next_index(&f.store, MIRROR_JOB), Some(3));

    let reset = job.reset(2).unwrap();
    assert_eq!(reset.next_index, 2);

    let report = job.run_cycle().await.unwrap();
    assert_eq!(report.epochs, 1);
    assert_eq!(f.contracts.mirrored().len(), 5);
    assert_eq!(next_index(&f.store, MIRROR_JOB), Some(3));
}

#[test]
fn stake_entries_carry_the_input_address() {
    let store = NullStore::new();
    seed(&store, &[Stake::new(7, 1_010, &[4])]);
    let stakes: Vec<StakeEntry> = attest_cronjobs::epoch_stakes(&store, &epochs(), 0).unwrap();
    assert_eq!(stakes.len(), 1);
    assert_eq!(stakes[0].address, Address::new([4; 20]));
    assert_eq!(stakes[0].tx_type, TxType::AddDelegator);
}
