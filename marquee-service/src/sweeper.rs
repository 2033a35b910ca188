use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use marquee_core::error::StoreError;
use marquee_core::store::{LockStore, LOCK_PREFIX};

use crate::metrics::Metrics;
use crate::signal::OpsSignal;

/// Periodic reconciliation of expired seat locks.
///
/// The store's native TTL expiry is the primary mechanism; the sweep is a
/// safety net and the audit point for abandonment volume. A failed pass is
/// logged and retried on the next tick, and never blocks acquisition.
pub struct Sweeper {
    store: Arc<dyn LockStore>,
    interval: Duration,
    warn_threshold: usize,
    signal: Arc<dyn OpsSignal>,
    metrics: Arc<Metrics>,
}

/// Lifecycle handle for the spawned sweeper task.
pub struct SweeperHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            error!("sweeper task join failed: {}", e);
        }
    }
}

impl Sweeper {
    pub fn new(
        store: Arc<dyn LockStore>,
        interval: Duration,
        warn_threshold: usize,
        signal: Arc<dyn OpsSignal>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            store,
            interval: interval.max(Duration::from_secs(1)),
            warn_threshold,
            signal,
            metrics,
        }
    }

    /// One reconciliation pass. Public so tests and operators can force a
    /// sweep outside the schedule.
    pub async fn run_once(&self) -> Result<usize, StoreError> {
        let now = Utc::now().timestamp();
        let locks = self.store.scan_locks(LOCK_PREFIX).await?;

        let mut reclaimed = 0usize;
        for (key, entry) in locks {
            if !entry.is_expired_at(now) {
                continue;
            }
            // Re-checked atomically inside the store; an extend racing the
            // scan keeps its lock.
            match self.store.remove_expired(&key, now).await {
                Ok(true) => {
                    reclaimed += 1;
                    debug!(key = %key, holder = %entry.holder_id, "reclaimed expired seat lock");
                }
                Ok(false) => {}
                Err(e) => warn!("failed to reclaim {}: {}", key, e),
            }
        }

        self.metrics.locks_reclaimed.inc_by(reclaimed as u64);
        if reclaimed > self.warn_threshold {
            self.metrics.reclaim_spikes.inc();
            self.signal.abandonment_spike(reclaimed, self.warn_threshold);
        }
        debug!(reclaimed, "sweep pass complete");
        Ok(reclaimed)
    }

    /// Spawns the periodic task. The first pass runs immediately so a
    /// restarted process reconciles without waiting a full interval.
    pub fn start(self) -> SweeperHandle {
        let (tx, mut rx) = watch::channel(false);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = self.run_once().await {
                            error!("sweep pass failed, retrying next interval: {}", e);
                        }
                    }
                    _ = rx.changed() => {
                        info!("sweeper stopping");
                        break;
                    }
                }
            }
        });
        SweeperHandle { shutdown: tx, task }
    }
}
