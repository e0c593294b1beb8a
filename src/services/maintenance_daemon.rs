//! Trail maintenance background daemon.
//!
//! Runs scheduled sweeps over the trail ledger:
//! - Evaporating every edge down to its current decayed strength
//! - Pruning edges that fell below the retention floor
//! - Flushing the surviving edges to the persistence adapter, if configured

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tokio::time::{interval, Instant};

use crate::domain::errors::DomainResult;
use crate::domain::models::MaintenanceConfig;
use crate::domain::ports::TrailRepository;
use crate::services::trail_store::{EvaporationReport, TrailStore};

/// Event emitted by the maintenance daemon.
#[derive(Debug, Clone)]
pub enum MaintenanceEvent {
    /// Daemon started.
    Started,
    /// Sweep started.
    SweepStarted { run_number: u64 },
    /// Sweep completed.
    SweepCompleted {
        run_number: u64,
        report: EvaporationReport,
        duration_ms: u64,
    },
    /// Sweep failed.
    SweepFailed { run_number: u64, error: String },
    /// Daemon stopped.
    Stopped { reason: StopReason },
}

/// Reason the daemon stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// Requested to stop.
    Requested,
    /// Too many consecutive failures.
    TooManyFailures,
}

/// Status of the maintenance daemon.
#[derive(Debug, Clone, Default)]
pub struct MaintenanceStatus {
    /// Whether the daemon is running.
    pub running: bool,
    /// Total sweeps attempted.
    pub total_runs: u64,
    /// Successful sweeps.
    pub successful_runs: u64,
    /// Failed sweeps.
    pub failed_runs: u64,
    /// Last sweep time.
    pub last_run: Option<Instant>,
    /// Total edges pruned across all sweeps.
    pub total_pruned: u64,
}

/// Handle to control the maintenance daemon.
pub struct MaintenanceHandle {
    stop_flag: Arc<AtomicBool>,
    status: Arc<RwLock<MaintenanceStatus>>,
}

impl MaintenanceHandle {
    /// Request the daemon to stop.
    pub fn stop(&self) {
        self.stop_flag.store(true, Ordering::Release);
    }

    /// Check if stop was requested.
    pub fn is_stop_requested(&self) -> bool {
        self.stop_flag.load(Ordering::Acquire)
    }

    /// Get current daemon status.
    pub async fn status(&self) -> MaintenanceStatus {
        self.status.read().await.clone()
    }
}

/// Trail maintenance background daemon.
///
/// Evaporation is lazy at read time, so the ledger stays correct without
/// this daemon; its job is keeping memory bounded by actually deleting
/// edges that decayed below the floor, and keeping the persisted copy
/// current.
pub struct TrailMaintenanceDaemon {
    trail: Arc<TrailStore>,
    repository: Option<Arc<dyn TrailRepository>>,
    config: MaintenanceConfig,
    status: Arc<RwLock<MaintenanceStatus>>,
    stop_flag: Arc<AtomicBool>,
}

impl TrailMaintenanceDaemon {
    /// Create a new maintenance daemon.
    pub fn new(trail: Arc<TrailStore>, config: MaintenanceConfig) -> Self {
        Self {
            trail,
            repository: None,
            config,
            status: Arc::new(RwLock::new(MaintenanceStatus::default())),
            stop_flag: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Create with default configuration.
    pub fn with_defaults(trail: Arc<TrailStore>) -> Self {
        Self::new(trail, MaintenanceConfig::default())
    }

    /// Set the repository to flush surviving edges to after each sweep.
    pub fn with_repository(mut self, repository: Arc<dyn TrailRepository>) -> Self {
        self.repository = Some(repository);
        self
    }

    /// Get a handle to control the daemon.
    pub fn handle(&self) -> MaintenanceHandle {
        MaintenanceHandle {
            stop_flag: self.stop_flag.clone(),
            status: self.status.clone(),
        }
    }

    /// Run the daemon, returning a channel for events.
    pub async fn run(self) -> mpsc::Receiver<MaintenanceEvent> {
        let (tx, rx) = mpsc::channel(100);

        tokio::spawn(async move {
            self.run_loop(tx).await;
        });

        rx
    }

    /// Main daemon loop.
    async fn run_loop(self, tx: mpsc::Sender<MaintenanceEvent>) {
        {
            let mut status = self.status.write().await;
            status.running = true;
        }

        let _ = tx.send(MaintenanceEvent::Started).await;
        tracing::info!(
            interval_secs = self.config.sweep_interval_secs,
            "Trail maintenance daemon started"
        );

        let mut consecutive_failures = 0u32;
        let mut interval_timer = interval(Duration::from_secs(self.config.sweep_interval_secs));

        if self.config.run_on_startup {
            self.run_sweep(&tx, &mut consecutive_failures).await;
        }

        let reason = loop {
            interval_timer.tick().await;
            if self.stop_flag.load(Ordering::Acquire) {
                break StopReason::Requested;
            }

            self.run_sweep(&tx, &mut consecutive_failures).await;

            if consecutive_failures >= self.config.max_consecutive_failures {
                tracing::error!(
                    failures = consecutive_failures,
                    "Trail maintenance stopping after repeated failures"
                );
                break StopReason::TooManyFailures;
            }
            if self.stop_flag.load(Ordering::Acquire) {
                break StopReason::Requested;
            }
        };

        {
            let mut status = self.status.write().await;
            status.running = false;
        }
        let _ = tx.send(MaintenanceEvent::Stopped { reason }).await;
    }

    /// Run a single sweep.
    async fn run_sweep(
        &self,
        tx: &mpsc::Sender<MaintenanceEvent>,
        consecutive_failures: &mut u32,
    ) {
        let run_number = {
            let mut status = self.status.write().await;
            status.total_runs += 1;
            status.total_runs
        };

        let _ = tx.send(MaintenanceEvent::SweepStarted { run_number }).await;

        let start = Instant::now();
        let result = self.sweep_once().await;
        let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

        match result {
            Ok(report) => {
                *consecutive_failures = 0;
                {
                    let mut status = self.status.write().await;
                    status.successful_runs += 1;
                    status.last_run = Some(Instant::now());
                    status.total_pruned += report.pruned as u64;
                }
                tracing::debug!(
                    run_number,
                    decayed = report.decayed,
                    pruned = report.pruned,
                    duration_ms,
                    "Trail sweep completed"
                );
                let _ = tx
                    .send(MaintenanceEvent::SweepCompleted {
                        run_number,
                        report,
                        duration_ms,
                    })
                    .await;
            }
            Err(e) => {
                *consecutive_failures += 1;
                {
                    let mut status = self.status.write().await;
                    status.failed_runs += 1;
                }
                tracing::warn!(run_number, error = %e, "Trail sweep failed");
                let _ = tx
                    .send(MaintenanceEvent::SweepFailed {
                        run_number,
                        error: e.to_string(),
                    })
                    .await;
            }
        }
    }

    /// Run one sweep immediately (for testing or manual invocation).
    pub async fn sweep_once(&self) -> DomainResult<EvaporationReport> {
        let report = self.trail.evaporate_all(chrono::Utc::now()).await;
        if let Some(ref repository) = self.repository {
            self.trail.flush_to(repository.as_ref()).await?;
        }
        Ok(report)
    }

    /// Get current status.
    pub async fn status(&self) -> MaintenanceStatus {
        self.status.read().await.clone()
    }

    /// Get configuration.
    pub fn config(&self) -> &MaintenanceConfig {
        &self.config
    }
}
