//! Error types for the transfer-planning pipeline.
//!
//! Every failure that crosses a component boundary is a tagged variant of
//! [`FerryError`], never a bare string or a panic. Per-transfer failures are
//! tallied by the job tracker and surface as a count, not as a job-level
//! error.

use std::fmt;
use std::time::Duration;

/// Which side of a transfer an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Source,
    Destination,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Side::Source => "source",
            Side::Destination => "destination",
        })
    }
}

/// The error taxonomy of the planning core.
#[derive(Debug, thiserror::Error)]
pub enum FerryError {
    /// Malformed URL, unknown from-to, invalid flag combination, wildcard in
    /// a non-final segment.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Location could not be inferred and no override was given, or the
    /// inferred pair is not in the supported set.
    #[error("unsupported endpoint: {0}")]
    UnsupportedEndpoint(String),

    /// Credential acquisition or SAS validation failed.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// A traverser aborted before completing enumeration.
    #[error("enumeration of the {side} aborted after {partial} objects: {reason}")]
    EnumerationFailed {
        side: Side,
        partial: u64,
        reason: String,
    },

    /// The destination index could not be built; sync aborts with no orders
    /// emitted, because deletion decisions over a partial index are unsafe.
    #[error("destination index build failed: {0}")]
    SyncIndexBuildFailed(String),

    /// `dispatch_final_part` was called more than once.
    #[error("job parts were already finalized")]
    PartsAlreadyFinalized,

    /// The plan file could not be written or rotated.
    #[error("failed to persist job plan: {0}")]
    PlanPersistFailed(String),

    /// The cancellation token fired.
    #[error("cancelled")]
    Cancelled,

    /// The no-progress watchdog fired.
    #[error("no forward progress for {0:?}; job stalled")]
    Stalled(Duration),

    /// The single-instance guard found another live process.
    #[error("another instance is already running (pid {0})")]
    MultipleProcesses(u32),

    /// Per-order failures, bubbled up as a count once all parts drain.
    #[error("{failed} of {total} transfers failed")]
    TransferFailed { failed: u64, total: u64 },

    /// A pipeline channel was dropped by its consumer.
    #[error("channel closed: {0}")]
    ChannelClosed(&'static str),

    /// Generic error wrapper for collaborator failures crossing the rim.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl FerryError {
    /// Whether this error means the operation was cancelled rather than
    /// having failed on its own account.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, FerryError::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_context() {
        let err = FerryError::EnumerationFailed {
            side: Side::Destination,
            partial: 42,
            reason: "listing page failed".into(),
        };
        let text = err.to_string();
        assert!(text.contains("destination"));
        assert!(text.contains("42"));
    }

    #[test]
    fn cancellation_is_distinguished() {
        assert!(FerryError::Cancelled.is_cancellation());
        assert!(!FerryError::PartsAlreadyFinalized.is_cancellation());
    }
}
