//! Tokio driver for the guidance executor.
//!
//! The executor itself never spawns anything: it keeps a set of deadlines
//! and fires them when asked. [`GuidanceRuntime`] owns the executor behind
//! a mutex and runs a task that sleeps until the next deadline (capped at
//! the poll interval) or until a command wakes it. [`SharedClockTicker`]
//! plays the external shared clock for tick-driven activities.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use uuid::Uuid;

use crate::guidance::{ExecutorStatus, GuidanceExecutor};

fn lock(executor: &Mutex<GuidanceExecutor>) -> MutexGuard<'_, GuidanceExecutor> {
    executor.lock().unwrap_or_else(|e| e.into_inner())
}

/// Runs a [`GuidanceExecutor`] on the tokio runtime.
///
/// Dropping the runtime stops the driver task.
#[derive(Debug)]
pub struct GuidanceRuntime {
    executor: Arc<Mutex<GuidanceExecutor>>,
    wake: Arc<Notify>,
    status_tx: watch::Sender<ExecutorStatus>,
    status_rx: watch::Receiver<ExecutorStatus>,
    driver: JoinHandle<()>,
}

impl GuidanceRuntime {
    /// Spawn the driver task. Must be called from within a tokio runtime.
    pub fn spawn(executor: GuidanceExecutor, poll_interval: Duration) -> Self {
        let (status_tx, status_rx) = watch::channel(executor.status());
        let executor = Arc::new(Mutex::new(executor));
        let wake = Arc::new(Notify::new());
        let poll_interval = poll_interval.max(Duration::from_millis(1));

        let driver = tokio::spawn(drive(
            Arc::clone(&executor),
            Arc::clone(&wake),
            status_tx.clone(),
            poll_interval,
        ));

        Self {
            executor,
            wake,
            status_tx,
            status_rx,
            driver,
        }
    }

    /// Run a command against the executor and wake the driver so new
    /// deadlines are picked up.
    ///
    /// Callbacks run while the executor lock is held; a callback that calls
    /// back into `with` deadlocks.
    pub fn with<R>(&self, f: impl FnOnce(&mut GuidanceExecutor) -> R) -> R {
        let (out, status) = {
            let mut exec = lock(&self.executor);
            let out = f(&mut exec);
            (out, exec.status())
        };
        self.status_tx.send_replace(status);
        self.wake.notify_one();
        out
    }

    pub fn executor(&self) -> Arc<Mutex<GuidanceExecutor>> {
        Arc::clone(&self.executor)
    }

    pub fn status(&self) -> ExecutorStatus {
        *self.status_rx.borrow()
    }

    /// Status updates as observed by the driver and by [`with`](Self::with).
    pub fn subscribe(&self) -> watch::Receiver<ExecutorStatus> {
        self.status_rx.clone()
    }

    /// Resolves once the executor reports `Completed`.
    pub async fn wait_for_completion(&self) {
        let mut rx = self.status_rx.clone();
        let _ = rx.wait_for(|s| *s == ExecutorStatus::Completed).await;
    }

    pub fn shutdown(self) {
        drop(self);
    }
}

impl Drop for GuidanceRuntime {
    fn drop(&mut self) {
        self.driver.abort();
    }
}

async fn drive(
    executor: Arc<Mutex<GuidanceExecutor>>,
    wake: Arc<Notify>,
    status_tx: watch::Sender<ExecutorStatus>,
    poll_interval: Duration,
) {
    tracing::debug!(poll_ms = poll_interval.as_millis() as u64, "guidance driver started");

    loop {
        let (wait, status) = {
            let mut exec = lock(&executor);
            let fired = exec.run_due();
            if fired > 0 {
                tracing::trace!(fired, "driver fired cues");
            }
            let now = exec.now_ms();
            let wait = exec
                .next_deadline_ms()
                .map(|deadline| Duration::from_millis(deadline.saturating_sub(now)))
                .unwrap_or(poll_interval)
                .min(poll_interval);
            (wait, exec.status())
        };
        status_tx.send_replace(status);

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = wake.notified() => {}
        }
    }
}

/// Feeds `update_progress_from_timer` from a tokio interval, standing in
/// for the shared UI clock of a tick-driven activity.
///
/// Elapsed time starts from the executor's own elapsed time (non-zero for
/// a restored session) and only accumulates while the executor is active,
/// so pausing the executor pauses this clock too. The ticker stops by
/// itself once the executor completes.
#[derive(Debug)]
pub struct SharedClockTicker {
    session_id: String,
    handle: JoinHandle<()>,
}

impl SharedClockTicker {
    pub fn spawn(runtime: &GuidanceRuntime, period: Duration) -> Self {
        let session_id = Uuid::new_v4().to_string();
        let executor = runtime.executor();
        let status_tx = runtime.status_tx.clone();
        let id = session_id.clone();
        let period = period.max(Duration::from_millis(1));

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut last = Instant::now();
            let mut elapsed = Duration::from_millis(lock(&executor).elapsed_ms());

            loop {
                interval.tick().await;
                let now = Instant::now();
                let delta = now - last;
                last = now;

                let status = {
                    let mut exec = lock(&executor);
                    if exec.status() == ExecutorStatus::Active {
                        elapsed += delta;
                        let plan_end_ms = exec.plan().iter().map(|c| c.timing_ms).max().unwrap_or(0);
                        let total_secs = plan_end_ms as f64 / 1000.0 * exec.pace_multiplier();
                        let elapsed_secs = elapsed.as_secs_f64();
                        let remaining_secs = (total_secs - elapsed_secs).max(0.0);
                        exec.update_progress_from_timer(&id, elapsed_secs, remaining_secs, None);
                    }
                    exec.status()
                };
                status_tx.send_replace(status);

                if status == ExecutorStatus::Completed {
                    tracing::debug!(session_id = %id, "shared clock finished");
                    break;
                }
            }
        });

        Self { session_id, handle }
    }

    /// Source id the ticks are tagged with.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn stop(self) {
        self.handle.abort();
    }
}
