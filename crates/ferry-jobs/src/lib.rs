//! # Ferry Jobs - Batching, Lifecycle, and Plan Persistence
//!
//! This crate owns everything that happens to an accepted object after the
//! filters and the comparator are done with it: the part batcher that groups
//! transfer orders into numbered [`JobPart`]s, the job-state machine that
//! coordinates pause/cancel/resume, the plan store that persists parts for
//! the execution layer and for resume, and the jobs admin surface behind
//! `jobs list` / `jobs show`.
//!
//! [`JobPart`]: ferry_core::JobPart

pub mod admin;
pub mod batcher;
pub mod pid;
pub mod plan;
pub mod state;

pub use admin::{
    cancel_job, list_jobs, load_resumable, remaining_orders, show_job, JobSummary, ShowJobResult,
    TransferRow,
};
pub use batcher::{
    JobHeader, PartBatcher, ScheduleProcessor, SharedBatcher, DEFAULT_TRANSFERS_PER_PART,
};
pub use pid::PidGuard;
pub use plan::{FilePlanStore, PlanDispatcher, PlanStore};
pub use state::{run_progress_reporter, run_watchdog, CancelOutcome, ExecEvent, JobTracker};
