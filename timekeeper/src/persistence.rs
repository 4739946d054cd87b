//! Snapshot of runtime-added schedules
//!
//! One JSON file per instance: `{"version": 1, "schedules": [...]}`. Only
//! dynamic tasks are written. Writes are synchronous and best-effort; the
//! scheduler logs failures and carries on.

use crate::constants::persistence::SNAPSHOT_VERSION;
use crate::errors::PersistenceError;
use crate::schedule::ScheduleSpec;
use crate::task::TaskExport;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Serialize)]
struct SnapshotOut<'a> {
    version: u32,
    schedules: &'a [TaskExport],
}

#[derive(Debug, Deserialize)]
struct SnapshotIn {
    #[serde(default)]
    version: u32,
    #[serde(default)]
    schedules: Vec<ScheduleSpec>,
}

#[derive(Debug, Clone)]
pub struct PersistenceStore {
    path: PathBuf,
}

impl PersistenceStore {
    /// Snapshot at `<dir>/<instance_id>.json`
    pub fn new(dir: impl AsRef<Path>, instance_id: &str) -> Self {
        Self {
            path: dir.as_ref().join(format!("{}.json", instance_id)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn display_path(&self) -> String {
        self.path.display().to_string()
    }

    pub fn save(&self, schedules: &[TaskExport]) -> Result<(), PersistenceError> {
        let fail = |reason: String| PersistenceError::WriteFailed {
            path: self.display_path(),
            reason,
        };
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).map_err(|e| fail(e.to_string()))?;
        }
        let data = serde_json::to_string(&SnapshotOut {
            version: SNAPSHOT_VERSION,
            schedules,
        })
        .map_err(|e| fail(e.to_string()))?;
        fs::write(&self.path, data).map_err(|e| fail(e.to_string()))?;
        debug!("Saved {} dynamic schedules to {}", schedules.len(), self.display_path());
        Ok(())
    }

    /// Read the snapshot. A missing file yields `Ok(None)`; a version other
    /// than the current one is an error and nothing is restored.
    pub fn load(&self) -> Result<Option<Vec<ScheduleSpec>>, PersistenceError> {
        if !self.path.exists() {
            info!("No persisted schedules found at {}", self.display_path());
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path).map_err(|e| PersistenceError::ReadFailed {
            path: self.display_path(),
            reason: e.to_string(),
        })?;
        let snapshot: SnapshotIn =
            serde_json::from_str(&content).map_err(|e| PersistenceError::DecodeFailed {
                path: self.display_path(),
                reason: e.to_string(),
            })?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(PersistenceError::VersionMismatch {
                path: self.display_path(),
                found: snapshot.version,
            });
        }
        Ok(Some(snapshot.schedules))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_not_an_error() {
        let dir = TempDir::new().unwrap();
        let store = PersistenceStore::new(dir.path(), "node-1");
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn test_version_mismatch_rejected() {
        let dir = TempDir::new().unwrap();
        let store = PersistenceStore::new(dir.path(), "node-1");
        fs::write(store.path(), r#"{"version": 2, "schedules": []}"#).unwrap();
        assert!(matches!(
            store.load(),
            Err(PersistenceError::VersionMismatch { found: 2, .. })
        ));
    }

    #[test]
    fn test_garbage_is_decode_error() {
        let dir = TempDir::new().unwrap();
        let store = PersistenceStore::new(dir.path(), "node-1");
        fs::write(store.path(), "not json").unwrap();
        assert!(matches!(store.load(), Err(PersistenceError::DecodeFailed { .. })));
    }
}
