//! Single-instance guard.
//!
//! Each running invocation drops a `<pid>.pid` file into the app's pid
//! directory; finding someone else's file there aborts startup. The file is
//! removed when the guard drops.

use std::path::{Path, PathBuf};

use tracing::warn;

use ferry_core::FerryError;

#[derive(Debug)]
pub struct PidGuard {
    path: PathBuf,
}

impl PidGuard {
    pub fn acquire(dir: &Path) -> Result<Self, FerryError> {
        std::fs::create_dir_all(dir).map_err(|e| {
            FerryError::Other(anyhow::anyhow!(
                "cannot create pid directory {}: {e}",
                dir.display()
            ))
        })?;
        let own_pid = std::process::id();
        let entries = std::fs::read_dir(dir).map_err(|e| {
            FerryError::Other(anyhow::anyhow!(
                "cannot read pid directory {}: {e}",
                dir.display()
            ))
        })?;
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            let Some(stem) = name.strip_suffix(".pid") else {
                continue;
            };
            if let Ok(pid) = stem.parse::<u32>() {
                if pid != own_pid {
                    return Err(FerryError::MultipleProcesses(pid));
                }
            }
        }
        let path = dir.join(format!("{own_pid}.pid"));
        std::fs::write(&path, own_pid.to_string()).map_err(|e| {
            FerryError::Other(anyhow::anyhow!(
                "cannot write pid file {}: {e}",
                path.display()
            ))
        })?;
        Ok(Self { path })
    }
}

impl Drop for PidGuard {
    fn drop(&mut self) {
        if let Err(err) = std::fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %err, "pid file not removed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_acquires_and_releases() {
        let dir = tempfile::tempdir().unwrap();
        let guard = PidGuard::acquire(dir.path()).unwrap();
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
        drop(guard);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn foreign_pid_file_trips_the_guard() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("99999999.pid"), "99999999").unwrap();
        let err = PidGuard::acquire(dir.path()).unwrap_err();
        match err {
            FerryError::MultipleProcesses(pid) => assert_eq!(pid, 99_999_999),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn stray_non_pid_files_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("readme.txt"), "not a pid").unwrap();
        assert!(PidGuard::acquire(dir.path()).is_ok());
    }
}
