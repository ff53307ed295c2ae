/*!
 * Rotation Scheduler
 *
 * Periodically rotates every key the manager reports as due and runs the
 * callback registered for the key's type. One failing key never stops the
 * rest of the sweep; failures are collected into the sweep report.
 */

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::config::PqcConfig;
use crate::error::CryptoResult;
use crate::key_management::manager::KeyManager;
use crate::key_management::types::{KeyType, RotationResult};

/// Sweep reports buffered for [`SchedulerHandle::next_report`] before new
/// ones are dropped
pub const REPORT_BUFFER: usize = 16;

/// Callback run after a key of its type has been rotated
pub type RotationCallback = Arc<dyn Fn(&KeyManager, &RotationResult) -> CryptoResult<()> + Send + Sync>;

/// Where in the sweep a failure happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SweepStage {
    /// Listing keys due for rotation
    Scan,
    /// Rotating a key
    Rotation,
    /// Running the type's callback after a successful rotation
    Callback,
}

#[derive(Debug, Clone, Serialize)]
pub struct RotationFailure {
    pub key_id: Option<String>,
    pub stage: SweepStage,
    pub error: String,
}

/// Outcome of one sweep
#[derive(Debug, Clone, Default, Serialize)]
pub struct RotationSweepReport {
    pub rotated: Vec<RotationResult>,
    pub failures: Vec<RotationFailure>,
    /// Set when the sweep did not run because another was in progress
    pub skipped: bool,
}

impl RotationSweepReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Nothing rotated and nothing failed
    pub fn is_empty(&self) -> bool {
        self.rotated.is_empty() && self.failures.is_empty()
    }
}

/// Periodic rotation driver over a shared [`KeyManager`]
pub struct RotationScheduler {
    manager: Arc<KeyManager>,
    callbacks: RwLock<HashMap<KeyType, RotationCallback>>,
    check_interval: Duration,
    sweeping: AtomicBool,
}

/// Clears the in-progress flag when a sweep ends, however it ends
struct SweepGuard<'a>(&'a AtomicBool);

impl Drop for SweepGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl RotationScheduler {
    pub fn new(manager: Arc<KeyManager>, check_interval: Duration) -> Self {
        Self {
            manager,
            callbacks: RwLock::new(HashMap::new()),
            check_interval,
            sweeping: AtomicBool::new(false),
        }
    }

    pub fn from_config(manager: Arc<KeyManager>, config: &PqcConfig) -> CryptoResult<Self> {
        config.validate()?;
        Ok(Self::new(manager, config.rotation.check_interval()))
    }

    pub fn check_interval(&self) -> Duration {
        self.check_interval
    }

    /// Register the callback for `key_type`, replacing any previous one
    pub fn register_callback<F>(&self, key_type: KeyType, callback: F)
    where
        F: Fn(&KeyManager, &RotationResult) -> CryptoResult<()> + Send + Sync + 'static,
    {
        match self.callbacks.write() {
            Ok(mut callbacks) => {
                callbacks.insert(key_type, Arc::new(callback));
            }
            Err(poisoned) => {
                poisoned.into_inner().insert(key_type, Arc::new(callback));
            }
        }
    }

    fn callback_for(&self, key_type: KeyType) -> Option<RotationCallback> {
        match self.callbacks.read() {
            Ok(callbacks) => callbacks.get(&key_type).cloned(),
            Err(poisoned) => poisoned.into_inner().get(&key_type).cloned(),
        }
    }

    /// Run one sweep now
    ///
    /// Returns a skipped report if another sweep is still running.
    pub fn run_once(&self) -> RotationSweepReport {
        let mut report = RotationSweepReport::default();

        if self
            .sweeping
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            log::debug!("Rotation sweep already in progress, skipping");
            report.skipped = true;
            return report;
        }
        let _guard = SweepGuard(&self.sweeping);

        let due = match self.manager.get_keys_needing_rotation() {
            Ok(due) => due,
            Err(e) => {
                log::error!("Failed to list keys due for rotation: {}", e);
                report.failures.push(RotationFailure {
                    key_id: None,
                    stage: SweepStage::Scan,
                    error: e.to_string(),
                });
                return report;
            }
        };

        for key in due {
            let key_type = key.metadata.key_type;
            let result = match self.manager.rotate_key(key.key_id()) {
                Ok(result) => result,
                Err(e) => {
                    log::error!("Failed to rotate key {}: {}", key.key_id(), e);
                    report.failures.push(RotationFailure {
                        key_id: Some(key.key_id().to_string()),
                        stage: SweepStage::Rotation,
                        error: e.to_string(),
                    });
                    continue;
                }
            };

            if let Some(callback) = self.callback_for(key_type) {
                if let Err(e) = callback(&self.manager, &result) {
                    log::error!(
                        "Rotation callback for {} failed after rotating {}: {}",
                        key_type,
                        result.old_key_id,
                        e
                    );
                    report.failures.push(RotationFailure {
                        key_id: Some(result.old_key_id.clone()),
                        stage: SweepStage::Callback,
                        error: e.to_string(),
                    });
                }
            }
            report.rotated.push(result);
        }

        if !report.is_empty() {
            log::info!(
                "Rotation sweep finished: {} rotated, {} failures",
                report.rotated.len(),
                report.failures.len()
            );
        }
        report
    }

    /// Spawn the periodic sweep task on the current tokio runtime
    ///
    /// The first sweep runs immediately, on the blocking pool. Ticks missed
    /// while a sweep runs are dropped rather than queued. Only sweeps that
    /// rotated or failed something are reported, and at most
    /// [`REPORT_BUFFER`] of them wait for the handle.
    pub fn start(self: Arc<Self>) -> SchedulerHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let (report_tx, report_rx) = mpsc::channel(REPORT_BUFFER);
        let scheduler = self;

        let task = tokio::spawn(async move {
            let mut ticker = interval(scheduler.check_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        log::info!("Rotation scheduler received shutdown signal");
                        break;
                    }
                    _ = ticker.tick() => {
                        let sweeper = Arc::clone(&scheduler);
                        match tokio::task::spawn_blocking(move || sweeper.run_once()).await {
                            Ok(report) => publish_report(&report_tx, report),
                            Err(e) => log::error!("Rotation sweep panicked or was cancelled: {}", e),
                        }
                    }
                }
            }

            log::info!("Rotation scheduler stopped");
        });

        SchedulerHandle {
            shutdown_tx,
            reports: report_rx,
            task,
        }
    }
}

/// Queue a non-empty report, dropping it when the buffer is full
pub(crate) fn publish_report(report_tx: &mpsc::Sender<RotationSweepReport>, report: RotationSweepReport) {
    if report.is_empty() {
        return;
    }
    match report_tx.try_send(report) {
        Ok(()) => {}
        Err(TrySendError::Full(report)) => {
            log::warn!(
                "Rotation report buffer full, dropping report ({} rotated, {} failures)",
                report.rotated.len(),
                report.failures.len()
            );
        }
        // Receiver may already be dropped
        Err(TrySendError::Closed(_)) => {}
    }
}

/// Handle to a running scheduler task
pub struct SchedulerHandle {
    shutdown_tx: mpsc::Sender<()>,
    reports: mpsc::Receiver<RotationSweepReport>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Wait for the next sweep report
    pub async fn next_report(&mut self) -> Option<RotationSweepReport> {
        self.reports.recv().await
    }

    /// Stop the task and wait for it to finish
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        if let Err(e) = self.task.await {
            log::error!("Rotation scheduler task ended abnormally: {}", e);
        }
    }
}
