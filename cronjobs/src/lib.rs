//! Epoch cronjobs.
//!
//! Every job follows the same shape: read its persisted cursor, work out the
//! range of epochs it still owes, and process them in ascending order, never
//! running ahead of the indexer's watermark. Jobs talk to the outside world
//! only through the capability traits in [`contracts`] and
//! [`attest_indexer::LedgerClient`].

pub mod contracts;
pub mod epoch;
pub mod error;
pub mod gateway;
pub mod job;
pub mod mirror;
pub mod runner;
pub mod sampler;
pub mod stakes;
pub mod uptime;
pub mod voting;

pub use contracts::{
    classify_mirror_error, AddressBinder, BenignOutcome, ContractError, MirroringContract,
    UptimeVoting, VotingContract,
};
pub use epoch::{owed_range, EpochConfig};
pub use error::CronjobError;
pub use gateway::{parse_contract_address, HttpContractGateway};
pub use job::{Cronjob, JobReport};
pub use mirror::{reset_mirror_progress, MirrorJob, MIRROR_JOB};
pub use runner::{log_failure, run_job, Schedule};
pub use sampler::{record_start, UptimeSamplerJob, SAMPLER_JOB};
pub use stakes::{epoch_stakes, indexed_until, EpochCommitment};
pub use uptime::{aggregate_epoch, connected_seconds, UptimeAggregationJob, UPTIME_JOB};
pub use voting::{VotingJob, VOTING_JOB};
