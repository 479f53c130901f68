//! The jobs admin surface: list, show, cancel, resume.

use ferry_core::{FerryError, JobDetails, JobId, JobPart, JobStatus, TransferStatus};
use tracing::info;

use crate::plan::PlanStore;

/// All known jobs, newest first; ties broken by job id.
pub fn list_jobs(store: &dyn PlanStore) -> Result<Vec<JobDetails>, FerryError> {
    let mut jobs = store.list_jobs()?;
    jobs.sort_by(|a, b| {
        b.start_time
            .cmp(&a.start_time)
            .then_with(|| a.job_id.to_string().cmp(&b.job_id.to_string()))
    });
    Ok(jobs)
}

/// One transfer row for `jobs show --with-status`.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferRow {
    pub source: String,
    pub destination: String,
    pub status: TransferStatus,
}

/// Aggregate counters for `jobs show`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobSummary {
    pub job_id: JobId,
    pub status: JobStatus,
    pub total_transfers: u64,
    pub completed: u64,
    pub failed: u64,
    pub skipped: u64,
}

pub enum ShowJobResult {
    Summary(JobSummary),
    Transfers(Vec<TransferRow>),
}

/// Either a progress summary, or the transfers whose recorded status equals
/// the filter.
pub fn show_job(
    store: &dyn PlanStore,
    job: JobId,
    status_filter: Option<TransferStatus>,
) -> Result<ShowJobResult, FerryError> {
    let parts = store.read_parts(job)?;
    if parts.is_empty() {
        return Err(FerryError::InvalidArgument(format!(
            "no job with ID {job} was found"
        )));
    }
    match status_filter {
        Some(wanted) => {
            let mut rows = Vec::new();
            for part in &parts {
                for order in &part.orders {
                    if order.status == wanted {
                        rows.push(TransferRow {
                            source: part.source_display(order),
                            destination: part.dest_display(order),
                            status: order.status,
                        });
                    }
                }
            }
            Ok(ShowJobResult::Transfers(rows))
        }
        None => {
            let mut summary = JobSummary {
                job_id: job,
                status: store.job_status(job)?,
                total_transfers: 0,
                completed: 0,
                failed: 0,
                skipped: 0,
            };
            for part in &parts {
                for order in &part.orders {
                    summary.total_transfers += 1;
                    match order.status {
                        TransferStatus::Success => summary.completed += 1,
                        TransferStatus::Failed => summary.failed += 1,
                        s if s.is_skipped() => summary.skipped += 1,
                        _ => {}
                    }
                }
            }
            Ok(ShowJobResult::Summary(summary))
        }
    }
}

/// Mark a job cancelled. Idempotent: a terminal job is returned as-is when
/// `ignore_completed` is set and rejected otherwise.
pub fn cancel_job(
    store: &dyn PlanStore,
    job: JobId,
    ignore_completed: bool,
) -> Result<JobStatus, FerryError> {
    if store.read_parts(job)?.is_empty() {
        return Err(FerryError::InvalidArgument(format!(
            "no job with ID {job} was found"
        )));
    }
    let status = store.job_status(job)?;
    if status.is_terminal() {
        if ignore_completed {
            info!(%job, %status, "cancel requested for an already-terminal job");
            return Ok(status);
        }
        return Err(FerryError::InvalidArgument(format!(
            "job {job} is already in a terminal state ({status})"
        )));
    }
    store.record_status(job, JobStatus::Cancelled)?;
    Ok(JobStatus::Cancelled)
}

/// Rehydrate a resumable plan. Only `Cancelled` and `Failed` jobs qualify;
/// credentials are not part of the plan and must be recomputed by the caller
/// before the parts are re-dispatched.
pub fn load_resumable(store: &dyn PlanStore, job: JobId) -> Result<Vec<JobPart>, FerryError> {
    let parts = store.read_parts(job)?;
    if parts.is_empty() {
        return Err(FerryError::InvalidArgument(format!(
            "no job with ID {job} was found"
        )));
    }
    let status = store.job_status(job)?;
    if !status.is_resumable() {
        return Err(FerryError::InvalidArgument(format!(
            "job {job} is {status}; only Cancelled or Failed jobs can be resumed"
        )));
    }
    Ok(parts)
}

/// Orders in the plan that still need work: everything the execution layer
/// has not driven to success. Resume re-enters at the first of these.
pub fn remaining_orders(parts: &[JobPart]) -> u64 {
    parts
        .iter()
        .flat_map(|p| p.orders.iter())
        .filter(|o| o.status != TransferStatus::Success)
        .count() as u64
}
