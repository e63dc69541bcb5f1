//! Stopping the indexer loops.
//!
//! Every stream, job and the metrics server holds a receiver and checks it
//! only between cycles. A stop request therefore lets each cycle in flight
//! commit or fail on its own before the loop returns; nothing is cancelled
//! half way through a write batch.

use std::fmt;
use std::sync::OnceLock;

use tokio::signal;
use tokio::sync::broadcast;

/// Why the service is stopping. The first request wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// `IndexerService::stop` or a test.
    Requested,
    Interrupt,
    Terminate,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StopReason::Requested => "requested",
            StopReason::Interrupt => "SIGINT",
            StopReason::Terminate => "SIGTERM",
        })
    }
}

pub struct ShutdownController {
    tx: broadcast::Sender<()>,
    reason: OnceLock<StopReason>,
}

impl ShutdownController {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            tx,
            reason: OnceLock::new(),
        }
    }

    /// Receiver for a loop started before the stop request. Loops spawned
    /// afterwards should check [`is_stopping`](Self::is_stopping) instead.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Ask every loop to stop after its current cycle. Later requests are
    /// ignored and return false.
    pub fn request(&self, reason: StopReason) -> bool {
        if self.reason.set(reason).is_err() {
            return false;
        }
        tracing::info!(%reason, loops = self.tx.receiver_count(), "stopping indexer loops");
        let _ = self.tx.send(());
        true
    }

    pub fn is_stopping(&self) -> bool {
        self.reason.get().is_some()
    }

    pub fn reason(&self) -> Option<StopReason> {
        self.reason.get().copied()
    }

    /// Block until SIGINT or SIGTERM, then request a stop with that reason.
    pub async fn wait_for_signal(&self) -> StopReason {
        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "SIGTERM handler unavailable, waiting for SIGINT only");
                    std::future::pending::<()>().await;
                }
            }
        };
        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        let reason = tokio::select! {
            _ = signal::ctrl_c() => StopReason::Interrupt,
            _ = terminate => StopReason::Terminate,
        };
        self.request(reason);
        reason
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn first_request_wins() {
        let controller = ShutdownController::new();
        let mut rx = controller.subscribe();
        assert!(!controller.is_stopping());

        assert!(controller.request(StopReason::Terminate));
        assert!(!controller.request(StopReason::Requested));
        assert_eq!(controller.reason(), Some(StopReason::Terminate));
        assert!(rx.recv().await.is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn late_loops_see_the_flag_not_the_message() {
        let controller = ShutdownController::new();
        controller.request(StopReason::Requested);
        let mut rx = controller.subscribe();
        assert!(rx.try_recv().is_err());
        assert!(controller.is_stopping());
    }

    #[tokio::test]
    async fn cycle_in_flight_completes_before_the_loop_exits() {
        let controller = ShutdownController::new();
        let mut rx = controller.subscribe();
        let (cycle_started_tx, cycle_started_rx) = tokio::sync::oneshot::channel();
        let looped = tokio::spawn(async move {
            let mut cycles = 0;
            let mut started = Some(cycle_started_tx);
            loop {
                tokio::select! {
                    biased;
                    _ = rx.recv() => break cycles,
                    _ = tokio::time::sleep(Duration::from_millis(1)) => {
                        if let Some(tx) = started.take() {
                            let _ = tx.send(());
                        }
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        cycles += 1;
                    }
                }
            }
        });

        cycle_started_rx.await.unwrap();
        controller.request(StopReason::Requested);
        assert_eq!(looped.await.unwrap(), 1);
    }
}
