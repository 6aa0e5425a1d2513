//! Eviction timer: background task that keeps the scheduler moving.
//!
//! Calls [`Scheduler::tick`] on a fixed cadence so an overrun budget or a
//! vanished client is reclaimed within one interval even when no request
//! arrives. The tick is idempotent and guarded by grant ids, so racing a
//! manual release is harmless.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::scheduler::Scheduler;

/// Periodically expires overdue sessions on one scheduler.
pub struct Evictor {
    scheduler: Arc<Scheduler>,
    interval: Duration,
}

/// A running evictor. Dropping the handle closes the shutdown channel,
/// which also ends the task; [`EvictorHandle::stop`] additionally waits
/// for it to finish.
pub struct EvictorHandle {
    handle: JoinHandle<()>,
    shutdown_tx: watch::Sender<bool>,
}

impl Evictor {
    pub fn new(scheduler: Arc<Scheduler>, interval: Duration) -> Self {
        Self {
            scheduler,
            interval,
        }
    }

    /// Run until `shutdown` flips or its sender is dropped.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(interval_ms = self.interval.as_millis() as u64, "evictor started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let report = self.scheduler.tick();
                    if !report.is_quiet() {
                        debug!(
                            evicted = ?report.evicted.as_ref().map(|(id, _)| id.as_str()),
                            promoted = ?report.promoted.as_ref().map(|id| id.as_str()),
                            collected = report.collected.len(),
                            "evictor tick"
                        );
                    }
                }
                _ = shutdown.changed() => {
                    info!("evictor shutting down");
                    break;
                }
            }
        }
    }

    /// Spawn on the current tokio runtime.
    pub fn spawn(self) -> EvictorHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            self.run(shutdown_rx).await;
        });
        EvictorHandle {
            handle,
            shutdown_tx,
        }
    }
}

impl EvictorHandle {
    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Signal shutdown and wait for the task to finish.
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.handle.await {
            tracing::error!(error = %e, "evictor task failed");
        }
    }
}
