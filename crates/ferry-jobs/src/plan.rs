//! Plan persistence.
//!
//! The core treats the on-disk format as opaque: every read and write goes
//! through [`PlanStore`]. The file implementation keeps one file per part
//! plus a small status sidecar per job; a job is visible to `jobs list`
//! exactly as long as its plan files are present.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use ferry_core::{
    DispatchPart, FerryError, JobDetails, JobId, JobPart, JobStatus, PartNum,
};

use crate::state::JobTracker;

/// Serialised access to the persisted job plans.
pub trait PlanStore: Send + Sync {
    fn write_part(&self, part: &JobPart) -> Result<(), FerryError>;

    /// All parts of a job, in part-number order. Empty when the job is
    /// unknown.
    fn read_parts(&self, job: JobId) -> Result<Vec<JobPart>, FerryError>;

    /// Every job with plan files still on disk, in no particular order.
    fn list_jobs(&self) -> Result<Vec<JobDetails>, FerryError>;

    fn remove_job(&self, job: JobId) -> Result<(), FerryError>;

    /// Record the job's last known status.
    fn record_status(&self, job: JobId, status: JobStatus) -> Result<(), FerryError>;

    fn job_status(&self, job: JobId) -> Result<JobStatus, FerryError>;

    /// Path of the job's sidecar log.
    fn log_path(&self, job: JobId) -> PathBuf;
}

/// One `<jobID>-<partNum>.plan` file per part under the plan directory.
pub struct FilePlanStore {
    dir: PathBuf,
}

impl FilePlanStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn part_path(&self, job: JobId, part: PartNum) -> PathBuf {
        self.dir.join(format!("{job}-{part}.plan"))
    }

    fn status_path(&self, job: JobId) -> PathBuf {
        self.dir.join(format!("{job}.status"))
    }

    fn persist_err(context: &str, err: impl std::fmt::Display) -> FerryError {
        FerryError::PlanPersistFailed(format!("{context}: {err}"))
    }
}

impl PlanStore for FilePlanStore {
    fn write_part(&self, part: &JobPart) -> Result<(), FerryError> {
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| Self::persist_err("creating plan directory", e))?;
        let payload = serde_json::to_vec(part)
            .map_err(|e| Self::persist_err("encoding job part", e))?;
        let path = self.part_path(part.job_id, part.part_num);
        std::fs::write(&path, payload)
            .map_err(|e| Self::persist_err(&format!("writing {}", path.display()), e))?;
        debug!(path = %path.display(), orders = part.orders.len(), "job part persisted");
        Ok(())
    }

    fn read_parts(&self, job: JobId) -> Result<Vec<JobPart>, FerryError> {
        let prefix = format!("{job}-");
        let mut numbered: Vec<(PartNum, PathBuf)> = Vec::new();
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Self::persist_err("reading plan directory", e)),
        };
        for entry in entries {
            let entry = entry.map_err(|e| Self::persist_err("reading plan directory", e))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let Some(rest) = name.strip_prefix(&prefix) else {
                continue;
            };
            let Some(num) = rest.strip_suffix(".plan") else {
                continue;
            };
            if let Ok(num) = num.parse::<PartNum>() {
                numbered.push((num, entry.path()));
            }
        }
        numbered.sort_by_key(|(num, _)| *num);
        let mut parts = Vec::with_capacity(numbered.len());
        for (_, path) in numbered {
            let bytes = std::fs::read(&path)
                .map_err(|e| Self::persist_err(&format!("reading {}", path.display()), e))?;
            let part: JobPart = serde_json::from_slice(&bytes)
                .map_err(|e| Self::persist_err(&format!("decoding {}", path.display()), e))?;
            parts.push(part);
        }
        Ok(parts)
    }

    fn list_jobs(&self) -> Result<Vec<JobDetails>, FerryError> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Self::persist_err("reading plan directory", e)),
        };
        let mut jobs = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| Self::persist_err("reading plan directory", e))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            // Part 0 carries the job header.
            let Some(job_text) = name.strip_suffix("-0.plan") else {
                continue;
            };
            let Ok(job_id) = job_text.parse::<JobId>() else {
                continue;
            };
            let bytes = std::fs::read(entry.path())
                .map_err(|e| Self::persist_err(&format!("reading {}", name), e))?;
            let part: JobPart = serde_json::from_slice(&bytes)
                .map_err(|e| Self::persist_err(&format!("decoding {}", name), e))?;
            jobs.push(JobDetails {
                job_id,
                command: part.command.clone(),
                status: self.job_status(job_id)?,
                start_time: part.created,
            });
        }
        Ok(jobs)
    }

    fn remove_job(&self, job: JobId) -> Result<(), FerryError> {
        for part in self.read_parts(job)? {
            let path = self.part_path(job, part.part_num);
            std::fs::remove_file(&path)
                .map_err(|e| Self::persist_err(&format!("removing {}", path.display()), e))?;
        }
        let status = self.status_path(job);
        if status.exists() {
            std::fs::remove_file(&status)
                .map_err(|e| Self::persist_err("removing status sidecar", e))?;
        }
        Ok(())
    }

    fn record_status(&self, job: JobId, status: JobStatus) -> Result<(), FerryError> {
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| Self::persist_err("creating plan directory", e))?;
        std::fs::write(self.status_path(job), status.to_string())
            .map_err(|e| Self::persist_err("writing status sidecar", e))
    }

    fn job_status(&self, job: JobId) -> Result<JobStatus, FerryError> {
        match std::fs::read_to_string(self.status_path(job)) {
            Ok(text) => text.trim().parse::<JobStatus>(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(JobStatus::InProgress),
            Err(e) => Err(Self::persist_err("reading status sidecar", e)),
        }
    }

    fn log_path(&self, job: JobId) -> PathBuf {
        self.dir.join(format!("{job}.log"))
    }
}

/// The production dispatcher: persists each part through the plan store and
/// keeps the tracker's totals current. The byte-moving layer consumes the
/// persisted parts from there.
pub struct PlanDispatcher {
    store: Arc<dyn PlanStore>,
    tracker: Arc<JobTracker>,
}

impl PlanDispatcher {
    pub fn new(store: Arc<dyn PlanStore>, tracker: Arc<JobTracker>) -> Self {
        Self { store, tracker }
    }
}

#[async_trait]
impl DispatchPart for PlanDispatcher {
    async fn dispatch(&mut self, part: JobPart) -> Result<(), FerryError> {
        self.store.write_part(&part)?;
        self.tracker.add_total(part.orders.len() as u64);
        if part.is_final {
            self.tracker.on_final_part();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ferry_core::{
        CredentialKind, FromTo, JobPartFlags, RelativePath, StoredObject, TransferAction,
        TransferOrder,
    };

    fn part(job_id: JobId, part_num: PartNum, is_final: bool, orders: usize) -> JobPart {
        JobPart {
            job_id,
            part_num,
            from_to: FromTo::LocalBlob,
            command: "copy /data https://acct.blob.core.windows.net/c".into(),
            created: Utc::now(),
            source_root: "/data".into(),
            dest_root: "https://acct.blob.core.windows.net/c".into(),
            source_sas: None,
            dest_sas: None,
            credential: CredentialKind::Anonymous,
            flags: JobPartFlags::default(),
            is_final,
            orders: (0..orders)
                .map(|i| {
                    let obj = StoredObject::file(
                        RelativePath::parse(&format!("f{i}.bin")).unwrap(),
                        i as u64,
                        None,
                    );
                    TransferOrder::from_object(TransferAction::Copy, &obj)
                })
                .collect(),
        }
    }

    #[test]
    fn parts_round_trip_identically() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilePlanStore::new(dir.path());
        let job = JobId::new();
        let written = vec![part(job, 0, false, 3), part(job, 1, true, 1)];
        for p in &written {
            store.write_part(p).unwrap();
        }
        let read = store.read_parts(job).unwrap();
        assert_eq!(read, written);
    }

    #[test]
    fn unknown_job_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilePlanStore::new(dir.path());
        assert!(store.read_parts(JobId::new()).unwrap().is_empty());
        assert!(store.list_jobs().unwrap().is_empty());
    }

    #[test]
    fn listed_while_plan_present_only() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilePlanStore::new(dir.path());
        let job = JobId::new();
        store.write_part(&part(job, 0, true, 1)).unwrap();
        assert_eq!(store.list_jobs().unwrap().len(), 1);
        store.remove_job(job).unwrap();
        assert!(store.list_jobs().unwrap().is_empty());
    }

    #[test]
    fn status_sidecar_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilePlanStore::new(dir.path());
        let job = JobId::new();
        assert_eq!(store.job_status(job).unwrap(), JobStatus::InProgress);
        store.record_status(job, JobStatus::Cancelled).unwrap();
        assert_eq!(store.job_status(job).unwrap(), JobStatus::Cancelled);
    }

    #[tokio::test]
    async fn plan_dispatcher_updates_tracker() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn PlanStore> = Arc::new(FilePlanStore::new(dir.path()));
        let tracker = Arc::new(JobTracker::new());
        tracker.start().unwrap();
        let mut dispatcher = PlanDispatcher::new(store.clone(), tracker.clone());

        let job = JobId::new();
        dispatcher.dispatch(part(job, 0, false, 2)).await.unwrap();
        dispatcher.dispatch(part(job, 1, true, 1)).await.unwrap();

        let snap = tracker.snapshot();
        assert_eq!(snap.total_transfers, 3);
        assert_eq!(store.read_parts(job).unwrap().len(), 2);
    }
}
