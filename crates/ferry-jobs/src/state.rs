//! The job-state machine.
//!
//! One [`JobTracker`] per job is the single source of truth for status.
//! Transitions are serialised through its lock; the execution layer only
//! ever reports [`ExecEvent`]s, it never mutates status itself.

use std::sync::Arc;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use ferry_core::{FerryError, JobSnapshot, JobStatus};

/// Progress report from the execution layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecEvent {
    TransferDone { bytes: u64 },
    TransferFailed,
    TransferSkipped,
    /// No outstanding orders remain in the execution layer.
    Drained,
}

/// Outcome of a cancel request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The job is winding down; `Cancelled` follows once the execution layer
    /// drains.
    Cancelling,
    /// The job was never started and is cancelled outright.
    Cancelled,
    /// The job had already reached this terminal status.
    AlreadyTerminal(JobStatus),
}

struct Inner {
    status: JobStatus,
    total: u64,
    completed: u64,
    failed: u64,
    skipped: u64,
    bytes: u64,
    final_part_seen: bool,
    drained: bool,
    last_progress: Instant,
}

/// Owns one job's lifecycle.
pub struct JobTracker {
    inner: Mutex<Inner>,
}

impl Default for JobTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl JobTracker {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                status: JobStatus::Queued,
                total: 0,
                completed: 0,
                failed: 0,
                skipped: 0,
                bytes: 0,
                final_part_seen: false,
                drained: false,
                last_progress: Instant::now(),
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queued -> InProgress.
    pub fn start(&self) -> Result<(), FerryError> {
        let mut inner = self.lock();
        if inner.status != JobStatus::Queued {
            return Err(FerryError::InvalidArgument(format!(
                "job cannot start from {}",
                inner.status
            )));
        }
        inner.status = JobStatus::InProgress;
        inner.last_progress = Instant::now();
        Ok(())
    }

    /// Account for a dispatched part's orders.
    pub fn add_total(&self, orders: u64) {
        self.lock().total += orders;
    }

    /// The final part reached the execution layer; the job can complete once
    /// the layer drains.
    pub fn on_final_part(&self) {
        let mut inner = self.lock();
        inner.final_part_seen = true;
        maybe_finish(&mut inner);
    }

    pub fn observe(&self, event: ExecEvent) {
        let mut inner = self.lock();
        match event {
            ExecEvent::TransferDone { bytes } => {
                inner.completed += 1;
                inner.bytes += bytes;
                inner.last_progress = Instant::now();
            }
            ExecEvent::TransferFailed => {
                // Counted, never a status change by itself.
                inner.failed += 1;
                inner.last_progress = Instant::now();
            }
            ExecEvent::TransferSkipped => {
                inner.skipped += 1;
                inner.last_progress = Instant::now();
            }
            ExecEvent::Drained => {
                inner.drained = true;
                maybe_finish(&mut inner);
            }
        }
    }

    /// Request cancellation. Idempotent: a terminal job reports its final
    /// status instead of transitioning.
    pub fn cancel(&self) -> CancelOutcome {
        let mut inner = self.lock();
        match inner.status {
            status if status.is_terminal() => CancelOutcome::AlreadyTerminal(status),
            JobStatus::Queued => {
                inner.status = JobStatus::Cancelled;
                info!("job cancelled before start");
                CancelOutcome::Cancelled
            }
            JobStatus::Cancelling => CancelOutcome::Cancelling,
            _ => {
                inner.status = JobStatus::Cancelling;
                info!("job cancelling; waiting for the execution layer to drain");
                CancelOutcome::Cancelling
            }
        }
    }

    /// Fatal error: plan persistence, first-part creation, execution-layer
    /// init, or the stall watchdog.
    pub fn fail(&self, reason: &str) {
        let mut inner = self.lock();
        if !inner.status.is_terminal() {
            warn!(reason, "job failed");
            inner.status = JobStatus::Failed;
        }
    }

    pub fn status(&self) -> JobStatus {
        self.lock().status
    }

    pub fn snapshot(&self) -> JobSnapshot {
        let inner = self.lock();
        JobSnapshot {
            status: inner.status,
            total_transfers: inner.total,
            completed: inner.completed,
            failed: inner.failed,
            skipped: inner.skipped,
            bytes_over_wire: inner.bytes,
        }
    }

    /// Time since the execution layer last reported forward progress.
    pub fn stalled_for(&self) -> Duration {
        self.lock().last_progress.elapsed()
    }
}

fn maybe_finish(inner: &mut Inner) {
    if !(inner.final_part_seen && inner.drained) || inner.status.is_terminal() {
        return;
    }
    inner.status = match inner.status {
        JobStatus::Cancelling => JobStatus::Cancelled,
        _ if inner.failed > 0 => JobStatus::CompletedWithErrors,
        _ => JobStatus::Completed,
    };
    info!(status = %inner.status, completed = inner.completed, failed = inner.failed, "job finished");
}

/// Surfaces a point-in-time snapshot to `sink` on a fixed interval until
/// the job reaches a terminal state. The sink decides how to render; a
/// snapshot may lag reality by at most one tick.
pub async fn run_progress_reporter<F>(
    tracker: Arc<JobTracker>,
    interval: Duration,
    cancel: CancellationToken,
    mut sink: F,
) where
    F: FnMut(ferry_core::JobSnapshot) + Send,
{
    let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(50)));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = ticker.tick() => {
                let snapshot = tracker.snapshot();
                sink(snapshot);
                if snapshot.status.is_terminal() {
                    return;
                }
            }
        }
    }
}

/// Wall-clock no-progress watchdog. If an in-progress job reports nothing
/// for `limit`, the job fails with a stall. Any transfer event resets the
/// clock; the watchdog exits once the job reaches a terminal state.
pub async fn run_watchdog(tracker: Arc<JobTracker>, limit: Duration, cancel: CancellationToken) {
    let tick = (limit / 4).max(Duration::from_millis(50));
    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = interval.tick() => {
                let status = tracker.status();
                if status.is_terminal() {
                    return;
                }
                if status == JobStatus::InProgress && tracker.stalled_for() >= limit {
                    warn!(limit = ?limit, "no forward progress; stalling the job");
                    tracker.fail(&FerryError::Stalled(limit).to_string());
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completes_after_final_part_and_drain() {
        let tracker = JobTracker::new();
        tracker.start().unwrap();
        tracker.add_total(2);
        tracker.observe(ExecEvent::TransferDone { bytes: 10 });
        tracker.observe(ExecEvent::TransferDone { bytes: 20 });
        assert_eq!(tracker.status(), JobStatus::InProgress);

        tracker.on_final_part();
        assert_eq!(tracker.status(), JobStatus::InProgress);
        tracker.observe(ExecEvent::Drained);
        assert_eq!(tracker.status(), JobStatus::Completed);

        let snap = tracker.snapshot();
        assert_eq!(snap.completed, 2);
        assert_eq!(snap.bytes_over_wire, 30);
    }

    #[test]
    fn per_transfer_failures_only_change_the_tally() {
        let tracker = JobTracker::new();
        tracker.start().unwrap();
        tracker.add_total(2);
        tracker.observe(ExecEvent::TransferFailed);
        assert_eq!(tracker.status(), JobStatus::InProgress);
        tracker.observe(ExecEvent::TransferDone { bytes: 1 });
        tracker.on_final_part();
        tracker.observe(ExecEvent::Drained);
        assert_eq!(tracker.status(), JobStatus::CompletedWithErrors);
    }

    #[test]
    fn cancel_is_idempotent_and_terminal_aware() {
        let tracker = JobTracker::new();
        tracker.start().unwrap();
        assert_eq!(tracker.cancel(), CancelOutcome::Cancelling);
        assert_eq!(tracker.cancel(), CancelOutcome::Cancelling);
        assert_eq!(tracker.status(), JobStatus::Cancelling);

        tracker.on_final_part();
        tracker.observe(ExecEvent::Drained);
        assert_eq!(tracker.status(), JobStatus::Cancelled);
        assert_eq!(
            tracker.cancel(),
            CancelOutcome::AlreadyTerminal(JobStatus::Cancelled)
        );
    }

    #[test]
    fn cancel_before_start_is_immediate() {
        let tracker = JobTracker::new();
        assert_eq!(tracker.cancel(), CancelOutcome::Cancelled);
        assert_eq!(tracker.status(), JobStatus::Cancelled);
        assert!(tracker.start().is_err());
    }

    #[test]
    fn cancel_racing_the_final_part_still_drains_through_cancelling() {
        let tracker = JobTracker::new();
        tracker.start().unwrap();
        tracker.cancel();
        tracker.on_final_part();
        assert_eq!(tracker.status(), JobStatus::Cancelling);
        tracker.observe(ExecEvent::Drained);
        assert_eq!(tracker.status(), JobStatus::Cancelled);
    }

    #[test]
    fn fail_is_terminal() {
        let tracker = JobTracker::new();
        tracker.start().unwrap();
        tracker.fail("plan write failed");
        assert_eq!(tracker.status(), JobStatus::Failed);
        // A late drain cannot resurrect the job.
        tracker.on_final_part();
        tracker.observe(ExecEvent::Drained);
        assert_eq!(tracker.status(), JobStatus::Failed);
    }

    #[tokio::test]
    async fn progress_reporter_runs_until_terminal() {
        let tracker = Arc::new(JobTracker::new());
        tracker.start().unwrap();
        tracker.add_total(1);

        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink_seen = seen.clone();
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_progress_reporter(
            tracker.clone(),
            Duration::from_millis(50),
            cancel.clone(),
            move |snap| sink_seen.lock().unwrap().push(snap),
        ));

        tracker.observe(ExecEvent::TransferDone { bytes: 7 });
        tracker.on_final_part();
        tracker.observe(ExecEvent::Drained);
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("reporter should stop on a terminal snapshot")
            .unwrap();

        let snapshots = seen.lock().unwrap();
        let last = snapshots.last().unwrap();
        assert_eq!(last.status, JobStatus::Completed);
        assert_eq!(last.completed, 1);
        assert_eq!(last.bytes_over_wire, 7);
    }

    #[tokio::test]
    async fn watchdog_stalls_an_idle_job() {
        let tracker = Arc::new(JobTracker::new());
        tracker.start().unwrap();
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_watchdog(
            tracker.clone(),
            Duration::from_millis(50),
            cancel.clone(),
        ));
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("watchdog should fire")
            .unwrap();
        assert_eq!(tracker.status(), JobStatus::Failed);
    }

    #[tokio::test]
    async fn watchdog_exits_quietly_when_the_job_finishes() {
        let tracker = Arc::new(JobTracker::new());
        tracker.start().unwrap();
        tracker.on_final_part();
        tracker.observe(ExecEvent::Drained);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_watchdog(
            tracker.clone(),
            Duration::from_secs(60),
            cancel.clone(),
        ));
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("watchdog should exit on a terminal job")
            .unwrap();
        assert_eq!(tracker.status(), JobStatus::Completed);
    }
}
