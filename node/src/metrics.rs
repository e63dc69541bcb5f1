//! Prometheus metrics for the indexer service.
//!
//! [`IndexerMetrics`] owns a dedicated [`Registry`]; the optional `/metrics`
//! endpoint encodes it into the Prometheus text exposition format.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use prometheus::{
    register_int_counter_with_registry, register_int_gauge_vec_with_registry, Encoder, IntCounter,
    IntGaugeVec, Opts, Registry, TextEncoder,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use attest_cronjobs::{JobReport, MIRROR_JOB, UPTIME_JOB, VOTING_JOB};

use crate::NodeError;

pub struct IndexerMetrics {
    /// The Prometheus registry that owns every metric below.
    pub registry: Registry,

    // ── Counters ────────────────────────────────────────────────────────
    pub containers_indexed: IntCounter,
    pub indexing_cycles_failed: IntCounter,
    pub epochs_voted: IntCounter,
    pub stakes_mirrored: IntCounter,
    /// Mirroring calls rejected with a known benign reason.
    pub mirror_benign: IntCounter,
    pub uptime_epochs_aggregated: IntCounter,
    pub job_cycles_failed: IntCounter,

    // ── Gauges ──────────────────────────────────────────────────────────
    /// Next container index of each stream.
    pub stream_next_index: IntGaugeVec,
}

impl IndexerMetrics {
    pub fn new() -> Result<Self, NodeError> {
        let registry = Registry::new();

        let containers_indexed = register_int_counter_with_registry!(
            Opts::new("attest_containers_indexed_total", "Total containers persisted"),
            registry
        )?;
        let indexing_cycles_failed = register_int_counter_with_registry!(
            Opts::new(
                "attest_indexing_cycles_failed_total",
                "Indexing cycles that ended in an error or timeout"
            ),
            registry
        )?;
        let epochs_voted = register_int_counter_with_registry!(
            Opts::new("attest_epochs_voted_total", "Epoch Merkle roots submitted"),
            registry
        )?;
        let stakes_mirrored = register_int_counter_with_registry!(
            Opts::new("attest_stakes_mirrored_total", "Stakes mirrored"),
            registry
        )?;
        let mirror_benign = register_int_counter_with_registry!(
            Opts::new(
                "attest_mirror_benign_total",
                "Mirroring calls rejected with a benign reason"
            ),
            registry
        )?;
        let uptime_epochs_aggregated = register_int_counter_with_registry!(
            Opts::new(
                "attest_uptime_epochs_aggregated_total",
                "Epochs aggregated and voted by the uptime job"
            ),
            registry
        )?;
        let job_cycles_failed = register_int_counter_with_registry!(
            Opts::new(
                "attest_job_cycles_failed_total",
                "Cronjob cycles that ended in an error or timeout"
            ),
            registry
        )?;
        let stream_next_index = register_int_gauge_vec_with_registry!(
            Opts::new("attest_stream_next_index", "Next container index per stream"),
            &["stream"],
            registry
        )?;

        Ok(Self {
            registry,
            containers_indexed,
            indexing_cycles_failed,
            epochs_voted,
            stakes_mirrored,
            mirror_benign,
            uptime_epochs_aggregated,
            job_cycles_failed,
            stream_next_index,
        })
    }

    /// Fold one cronjob cycle into the counters.
    pub fn observe_job(&self, job: &str, report: Option<&JobReport>) {
        let Some(report) = report else {
            self.job_cycles_failed.inc();
            return;
        };
        match job {
            VOTING_JOB => self.epochs_voted.inc_by(report.submitted),
            MIRROR_JOB => {
                self.stakes_mirrored.inc_by(report.submitted);
                self.mirror_benign.inc_by(report.benign);
            }
            UPTIME_JOB => self.uptime_epochs_aggregated.inc_by(report.epochs),
            _ => {}
        }
    }

    /// Encode every metric in the text exposition format.
    pub fn encode(&self) -> Result<String, NodeError> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| NodeError::Metrics(e.to_string()))
    }
}

async fn metrics_handler(State(metrics): State<Arc<IndexerMetrics>>) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

pub fn metrics_router(metrics: Arc<IndexerMetrics>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metrics)
}

/// Serve `/metrics` on `addr` until shutdown.
pub async fn serve_metrics(
    addr: SocketAddr,
    metrics: Arc<IndexerMetrics>,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<(), NodeError> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "metrics endpoint listening");
    axum::serve(listener, metrics_router(metrics))
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await?;
    Ok(())
}
