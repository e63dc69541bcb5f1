//! The indexer service: one LMDB store shared by one indexing stream and the
//! enabled cronjobs, each running its own timer loop.

use std::sync::Arc;

use tokio::task::JoinHandle;

use attest_cronjobs::{
    record_start, reset_mirror_progress, run_job, Cronjob, HttpContractGateway, MirrorJob,
    Schedule, UptimeAggregationJob, UptimeSamplerJob, VotingJob,
};
use attest_indexer::{
    HttpLedgerClient, IndexingEngine, JsonBatchProcessor, LedgerOutputFetcher, UtxoResolver,
};
use attest_store_lmdb::LmdbEnvironment;
use attest_types::Progress;
use attest_utils::{Clock, SystemClock};

use crate::{run_stream, serve_metrics, IndexerMetrics, NodeConfig, NodeError, ShutdownController, StopReason};

pub struct IndexerService {
    config: NodeConfig,
    store: Arc<LmdbEnvironment>,
    metrics: Arc<IndexerMetrics>,
    clock: Arc<dyn Clock>,
    shutdown: ShutdownController,
    task_handles: Vec<JoinHandle<()>>,
}

impl IndexerService {
    /// Validate `config` and open the store. Nothing runs until
    /// [`start`](Self::start).
    pub fn open(config: NodeConfig) -> Result<Self, NodeError> {
        config.validate()?;
        let store = Arc::new(LmdbEnvironment::open_default(&config.data_dir)?);
        Ok(Self {
            config,
            store,
            metrics: Arc::new(IndexerMetrics::new()?),
            clock: Arc::new(SystemClock),
            shutdown: ShutdownController::new(),
            task_handles: Vec::new(),
        })
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<LmdbEnvironment> {
        &self.store
    }

    pub fn metrics(&self) -> &Arc<IndexerMetrics> {
        &self.metrics
    }

    pub fn shutdown_controller(&self) -> &ShutdownController {
        &self.shutdown
    }

    /// Point the mirror job at `epoch`. Takes effect on its next cycle.
    pub fn reset_mirror(&self, epoch: u64) -> Result<Progress, NodeError> {
        Ok(reset_mirror_progress(self.store.as_ref(), epoch, self.clock.now())?)
    }

    /// Spawn every configured loop.
    pub fn start(&mut self) -> Result<(), NodeError> {
        if self.shutdown.is_stopping() {
            tracing::warn!("stop already requested, not starting loops");
            return Ok(());
        }
        let format = self.config.address_format()?;
        let epochs = self.config.epoch_config()?;
        let stream = self.config.indexer.stream.clone();

        record_start(self.store.as_ref(), self.clock.now())?;

        let ledger = Arc::new(HttpLedgerClient::with_timeout(
            self.config.indexer.ledger_url.clone(),
            self.config.indexer.request_timeout(),
        ));
        let fetcher = Arc::new(LedgerOutputFetcher::new(ledger.clone(), format.clone()));
        let engine = IndexingEngine::new(
            self.config.stream_config(),
            self.store.clone(),
            ledger.clone(),
            JsonBatchProcessor::new(format.clone()),
            UtxoResolver::new(self.config.indexer.cache_capacity, fetcher),
            self.clock.clone(),
        );
        self.task_handles.push(tokio::spawn(run_stream(
            engine,
            self.config.indexer.schedule(),
            self.shutdown.subscribe(),
            self.metrics.clone(),
        )));
        tracing::info!(stream = %stream, url = %self.config.indexer.ledger_url, "indexing stream started");

        if self.config.voting.enabled {
            let voting = &self.config.voting;
            let schedule = voting.schedule();
            let gateway = Arc::new(gateway(&voting.gateway_url, &voting.contract, schedule)?);
            let job = VotingJob::new(self.store.clone(), gateway, epochs, self.clock.clone(), stream.clone());
            self.spawn_job(job, schedule);
        }

        if self.config.mirror.enabled {
            let mirror = &self.config.mirror;
            let schedule = mirror.schedule();
            let job = MirrorJob::new(
                self.store.clone(),
                Arc::new(gateway(&mirror.gateway_url, &mirror.voting_contract, schedule)?),
                Arc::new(gateway(&mirror.gateway_url, &mirror.contract, schedule)?),
                Arc::new(gateway(&mirror.gateway_url, &mirror.binder_contract, schedule)?),
                format.clone(),
                epochs,
                self.clock.clone(),
                stream.clone(),
            );
            self.spawn_job(job, schedule);
        }

        if self.config.uptime.enabled {
            let uptime = &self.config.uptime;
            let gateway = Arc::new(gateway(&uptime.gateway_url, &uptime.contract, uptime.schedule())?);
            let aggregation = UptimeAggregationJob::new(
                self.store.clone(),
                gateway,
                epochs,
                self.clock.clone(),
                uptime.threshold,
            );
            let sampler = UptimeSamplerJob::new(self.store.clone(), ledger, self.clock.clone());
            let (schedule, sampler_schedule) = (uptime.schedule(), uptime.sampler_schedule());
            self.spawn_job(aggregation, schedule);
            self.spawn_job(sampler, sampler_schedule);
        }

        if self.config.metrics.enabled {
            let addr = self.config.metrics.listen;
            let metrics = self.metrics.clone();
            let shutdown = self.shutdown.subscribe();
            self.task_handles.push(tokio::spawn(async move {
                if let Err(e) = serve_metrics(addr, metrics, shutdown).await {
                    tracing::error!(error = %e, "metrics endpoint failed");
                }
            }));
        }

        Ok(())
    }

    fn spawn_job<J>(&mut self, job: J, schedule: Schedule)
    where
        J: Cronjob + 'static,
    {
        tracing::info!(job = job.name(), interval_secs = schedule.interval.as_secs(), "job started");
        let metrics = self.metrics.clone();
        self.task_handles.push(tokio::spawn(run_job(
            job,
            schedule,
            self.shutdown.subscribe(),
            move |name, report| metrics.observe_job(name, report),
        )));
    }

    /// Run until SIGINT/SIGTERM, then stop.
    pub async fn run_until_signal(self) {
        let reason = self.shutdown.wait_for_signal().await;
        tracing::info!(%reason, "shutdown signal received");
        self.stop().await;
    }

    /// Signal every loop and wait for the cycles in flight to finish.
    pub async fn stop(self) {
        self.shutdown.request(StopReason::Requested);
        for handle in self.task_handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "task ended abnormally");
            }
        }
        tracing::info!("indexer service stopped");
    }
}

fn gateway(url: &str, contract: &str, schedule: Schedule) -> Result<HttpContractGateway, NodeError> {
    Ok(HttpContractGateway::new(url, contract, schedule.timeout)?)
}
