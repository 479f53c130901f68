//! The jobs admin verbs: list, show, resume, cancel.

use ferry_core::{
    ExitKind, FerryError, JobId, JobStatus, LifecycleManager, SasToken, TransferStatus,
};
use ferry_jobs::{
    cancel_job, list_jobs, load_resumable, remaining_orders, show_job, PlanStore, ShowJobResult,
};

use crate::args::ResumeArgs;

pub fn run_jobs_list(
    store: &dyn PlanStore,
    lifecycle: &LifecycleManager,
    with_status: Option<&str>,
) -> Result<ExitKind, FerryError> {
    let filter: Option<JobStatus> = with_status.map(str::parse).transpose()?;
    let mut shown = 0u64;
    for details in list_jobs(store)? {
        if let Some(wanted) = filter {
            if details.status != wanted {
                continue;
            }
        }
        shown += 1;
        lifecycle.item(
            &format!(
                "JobId: {}\nStart Time: {}\nStatus: {}\nCommand: {}\n",
                details.job_id,
                details.start_time.to_rfc3339(),
                details.status,
                details.command
            ),
            &serde_json::json!({
                "JobId": details.job_id,
                "StartTime": details.start_time,
                "JobStatus": details.status,
                "Command": details.command,
            }),
        );
    }
    lifecycle.info(&format!("{shown} job(s)"));
    Ok(ExitKind::Success)
}

pub fn run_jobs_show(
    store: &dyn PlanStore,
    lifecycle: &LifecycleManager,
    job_id: &str,
    with_status: Option<&str>,
) -> Result<ExitKind, FerryError> {
    let job: JobId = job_id.parse()?;
    let filter: Option<TransferStatus> = with_status.map(str::parse).transpose()?;
    match show_job(store, job, filter)? {
        ShowJobResult::Summary(summary) => {
            lifecycle.item(
                &format!(
                    "Job {} ({})\nTotal transfers: {}\nCompleted: {}\nFailed: {}\nSkipped: {}",
                    summary.job_id,
                    summary.status,
                    summary.total_transfers,
                    summary.completed,
                    summary.failed,
                    summary.skipped
                ),
                &serde_json::json!({
                    "JobId": summary.job_id,
                    "JobStatus": summary.status,
                    "TotalTransfers": summary.total_transfers,
                    "TransfersCompleted": summary.completed,
                    "TransfersFailed": summary.failed,
                    "TransfersSkipped": summary.skipped,
                }),
            );
        }
        ShowJobResult::Transfers(rows) => {
            for row in rows {
                lifecycle.item(
                    &format!("{} -> {} ({})", row.source, row.destination, row.status),
                    &serde_json::json!({
                        "Source": row.source,
                        "Destination": row.destination,
                        "TransferStatus": row.status,
                    }),
                );
            }
        }
    }
    Ok(ExitKind::Success)
}

/// Rehydrate a resumable plan, refresh its credentials, and hand it back to
/// the execution layer by re-recording it as in progress.
pub fn run_resume(
    store: &dyn PlanStore,
    lifecycle: &LifecycleManager,
    args: &ResumeArgs,
) -> Result<ExitKind, FerryError> {
    let job: JobId = args.job_id.parse()?;
    let mut parts = load_resumable(store, job)?;

    // Tokens in the plan may have expired; swap in the fresh ones.
    if args.source_sas.is_some() || args.destination_sas.is_some() {
        for part in &mut parts {
            if let Some(sas) = &args.source_sas {
                part.source_sas = Some(SasToken::new(sas.clone()));
            }
            if let Some(sas) = &args.destination_sas {
                part.dest_sas = Some(SasToken::new(sas.clone()));
            }
            store.write_part(part)?;
        }
    }
    let remaining = remaining_orders(&parts);
    store.record_status(job, JobStatus::InProgress)?;
    lifecycle.essential(&format!(
        "Job {job} resumed: {remaining} transfer(s) pending in {} part(s).",
        parts.len()
    ));
    Ok(ExitKind::Success)
}

pub fn run_cancel(
    store: &dyn PlanStore,
    lifecycle: &LifecycleManager,
    job_id: &str,
) -> Result<ExitKind, FerryError> {
    let job: JobId = job_id.parse()?;
    let status = cancel_job(store, job, true)?;
    lifecycle.essential(&format!("Job {job} is now {status}."));
    Ok(ExitKind::Success)
}
