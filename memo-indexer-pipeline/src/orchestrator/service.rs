use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{error, info};

use crate::errors::ScannerError;
use crate::orchestrator::{Scanner, ScannerTotals};

/// Health of the background scanner, published after every cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScannerHealth {
    pub running: bool,
    /// Highest block height scanned so far by the service.
    pub last_height: Option<u64>,
    /// Error of the most recent cycle, cleared by a successful one.
    pub last_error: Option<String>,
    pub last_run_at: Option<DateTime<Utc>>,
    pub totals: ScannerTotals,
}

/// Shortest interval the service accepts; shorter ones are raised to it.
pub const MIN_SCAN_INTERVAL: Duration = Duration::from_millis(1);

/// Runs incremental scans and backfills on a fixed interval.
pub struct ScannerService;

impl ScannerService {
    /// Starts the background loop. The first cycle runs immediately.
    pub fn spawn(scanner: Arc<Scanner>, every: Duration) -> ScannerHandle {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let (health_tx, health_rx) = watch::channel(ScannerHealth {
            running: true,
            ..ScannerHealth::default()
        });
        let task = tokio::spawn(run(Arc::clone(&scanner), every, shutdown_rx, health_tx));

        ScannerHandle {
            scanner,
            shutdown_tx,
            health: health_rx,
            task,
        }
    }
}

async fn run(
    scanner: Arc<Scanner>,
    every: Duration,
    mut shutdown: broadcast::Receiver<()>,
    health: watch::Sender<ScannerHealth>,
) {
    info!(interval_secs = every.as_secs(), "Starting scanner service");
    let mut ticker = interval(every.max(MIN_SCAN_INTERVAL));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                info!("Scanner service received shutdown signal");
                break;
            }
            _ = ticker.tick() => {
                let outcome = run_cycle(&scanner).await;
                if let Err(e) = &outcome {
                    error!(error = %e, "Scan cycle failed");
                }
                health.send_modify(|state| {
                    match outcome {
                        Ok(last_height) => {
                            state.last_height = last_height.or(state.last_height);
                            state.last_error = None;
                        }
                        Err(e) => state.last_error = Some(e.to_string()),
                    }
                    state.last_run_at = Some(Utc::now());
                    state.totals = scanner.totals();
                });
            }
        }
    }

    health.send_modify(|state| state.running = false);
    info!("Scanner service stopped");
}

async fn run_cycle(scanner: &Scanner) -> Result<Option<u64>, ScannerError> {
    let report = scanner.incremental_scan().await?;
    if !report.interrupted {
        scanner.backfill_roots().await?;
    }
    Ok(report.last_height)
}

/// Handle to a running [`ScannerService`].
pub struct ScannerHandle {
    scanner: Arc<Scanner>,
    shutdown_tx: broadcast::Sender<()>,
    health: watch::Receiver<ScannerHealth>,
    task: JoinHandle<()>,
}

impl ScannerHandle {
    /// Stops the loop; a scan in progress ends at its next block boundary.
    pub fn stop(&self) {
        self.scanner.request_stop();
        let _ = self.shutdown_tx.send(());
    }

    pub fn health(&self) -> ScannerHealth {
        self.health.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ScannerHealth> {
        self.health.clone()
    }

    /// Waits for the background loop to exit and returns its final health.
    pub async fn join(self) -> Result<ScannerHealth, ScannerError> {
        self.task
            .await
            .map_err(|e| ScannerError::Task(e.to_string()))?;
        Ok(self.health.borrow().clone())
    }
}
