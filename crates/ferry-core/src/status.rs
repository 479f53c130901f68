//! Job and transfer status values.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::FerryError;
use crate::order::JobId;

/// Lifecycle state of a job. Transitions are owned by the job tracker and
/// serialised there; nothing else mutates status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Queued,
    InProgress,
    Cancelling,
    Cancelled,
    Completed,
    CompletedWithErrors,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Cancelled
                | JobStatus::Completed
                | JobStatus::CompletedWithErrors
                | JobStatus::Failed
        )
    }

    /// Whether a plan in this state may be resumed.
    pub fn is_resumable(&self) -> bool {
        matches!(self, JobStatus::Cancelled | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            JobStatus::Queued => "Queued",
            JobStatus::InProgress => "InProgress",
            JobStatus::Cancelling => "Cancelling",
            JobStatus::Cancelled => "Cancelled",
            JobStatus::Completed => "Completed",
            JobStatus::CompletedWithErrors => "CompletedWithErrors",
            JobStatus::Failed => "Failed",
        })
    }
}

impl FromStr for JobStatus {
    type Err = FerryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "queued" => Ok(JobStatus::Queued),
            "inprogress" => Ok(JobStatus::InProgress),
            "cancelling" => Ok(JobStatus::Cancelling),
            "cancelled" => Ok(JobStatus::Cancelled),
            "completed" => Ok(JobStatus::Completed),
            "completedwitherrors" => Ok(JobStatus::CompletedWithErrors),
            "failed" => Ok(JobStatus::Failed),
            _ => Err(FerryError::InvalidArgument(format!(
                "unknown job status '{s}'"
            ))),
        }
    }
}

/// Status of one transfer order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferStatus {
    #[default]
    NotStarted,
    Started,
    Success,
    Failed,
    SkippedEntityAlreadyExists,
    SkippedBlobHasSnapshots,
    Cancelled,
}

impl TransferStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransferStatus::NotStarted | TransferStatus::Started)
    }

    pub fn is_skipped(&self) -> bool {
        matches!(
            self,
            TransferStatus::SkippedEntityAlreadyExists | TransferStatus::SkippedBlobHasSnapshots
        )
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TransferStatus::NotStarted => "NotStarted",
            TransferStatus::Started => "Started",
            TransferStatus::Success => "Success",
            TransferStatus::Failed => "Failed",
            TransferStatus::SkippedEntityAlreadyExists => "SkippedEntityAlreadyExists",
            TransferStatus::SkippedBlobHasSnapshots => "SkippedBlobHasSnapshots",
            TransferStatus::Cancelled => "Cancelled",
        })
    }
}

impl FromStr for TransferStatus {
    type Err = FerryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "notstarted" => Ok(TransferStatus::NotStarted),
            "started" => Ok(TransferStatus::Started),
            "success" => Ok(TransferStatus::Success),
            "failed" => Ok(TransferStatus::Failed),
            "skippedentityalreadyexists" => Ok(TransferStatus::SkippedEntityAlreadyExists),
            "skippedblobhassnapshots" => Ok(TransferStatus::SkippedBlobHasSnapshots),
            "cancelled" => Ok(TransferStatus::Cancelled),
            _ => Err(FerryError::InvalidArgument(format!(
                "unknown transfer status '{s}'"
            ))),
        }
    }
}

/// Point-in-time view of a job, fetched by the progress reporter. Consistent
/// within one job; may lag reality by at most one reporting tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub status: JobStatus,
    pub total_transfers: u64,
    pub completed: u64,
    pub failed: u64,
    pub skipped: u64,
    pub bytes_over_wire: u64,
}

/// Summary record for `jobs list` / `jobs show`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDetails {
    pub job_id: JobId,
    pub command: String,
    pub status: JobStatus,
    pub start_time: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::CompletedWithErrors.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Cancelling.is_terminal());
        assert!(!JobStatus::InProgress.is_terminal());
    }

    #[test]
    fn resumable_states() {
        assert!(JobStatus::Cancelled.is_resumable());
        assert!(JobStatus::Failed.is_resumable());
        assert!(!JobStatus::Completed.is_resumable());
    }

    #[test]
    fn status_strings_round_trip() {
        for status in [
            JobStatus::Queued,
            JobStatus::InProgress,
            JobStatus::Cancelling,
            JobStatus::Cancelled,
            JobStatus::Completed,
            JobStatus::CompletedWithErrors,
            JobStatus::Failed,
        ] {
            assert_eq!(status.to_string().parse::<JobStatus>().unwrap(), status);
        }
        assert_eq!(
            "SkippedEntityAlreadyExists".parse::<TransferStatus>().unwrap(),
            TransferStatus::SkippedEntityAlreadyExists
        );
    }
}
