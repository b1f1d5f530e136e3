//! JSON state file adapter.
//!
//! Writes are atomic: serialize to a process-unique sibling `.tmp`, fsync,
//! rename over the target. A reader never observes a half-written file, even
//! when two runs overlap or a run is killed mid-write.

use super::state::{CrashState, SCHEMA_VERSION};
use serde::Deserialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("failed to read state file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("state file {path} is not valid state JSON: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write state file {path}: {reason}")]
    Write { path: String, reason: String },
}

/// Layouts accepted on read.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredState {
    Current(CrashState),
    /// Earlier layout: one flag per planned tranche.
    Legacy { deployed: Vec<bool> },
}

impl From<StoredState> for CrashState {
    fn from(stored: StoredState) -> Self {
        match stored {
            StoredState::Current(state) => state,
            StoredState::Legacy { deployed } => CrashState {
                schema_version: SCHEMA_VERSION,
                last_crash_date: None,
                tranche_index: deployed.iter().filter(|d| **d).count() as u32,
            },
        }
    }
}

/// Reads and atomically writes the crash state file.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    /// Store backed by the JSON file at `path`; nothing is touched until load/save.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn display_path(&self) -> String {
        self.path.display().to_string()
    }

    /// Read the state file, migrating the legacy `deployed` layout.
    pub fn load(&self) -> Result<CrashState, PersistenceError> {
        let content = fs::read_to_string(&self.path).map_err(|source| PersistenceError::Read {
            path: self.display_path(),
            source,
        })?;
        let stored: StoredState =
            serde_json::from_str(&content).map_err(|source| PersistenceError::Parse {
                path: self.display_path(),
                source,
            })?;
        Ok(stored.into())
    }

    /// Load the state, falling back to the seed state with a warning on any error.
    pub fn load_or_seed(&self) -> CrashState {
        match self.load() {
            Ok(state) => state,
            Err(e) => {
                warn!(error = %e, "starting from seed crash state");
                CrashState::seed()
            }
        }
    }

    /// Atomically replace the state file. On error the previous file is intact.
    pub fn save(&self, state: &CrashState) -> Result<(), PersistenceError> {
        let write_err = |reason: String| PersistenceError::Write {
            path: self.display_path(),
            reason,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| write_err(format!("create dir: {e}")))?;
        }

        let mut json =
            serde_json::to_string_pretty(state).map_err(|e| write_err(format!("serialize: {e}")))?;
        json.push('\n');

        let tmp_path = self.tmp_path();
        let written = fs::File::create(&tmp_path).and_then(|mut file| {
            file.write_all(json.as_bytes())?;
            file.sync_all()
        });
        if let Err(e) = written {
            let _ = fs::remove_file(&tmp_path);
            return Err(write_err(format!("temp write: {e}")));
        }

        fs::rename(&tmp_path, &self.path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            write_err(format!("atomic rename failed: {e}"))
        })?;

        info!(
            path = %self.path.display(),
            tranche_index = state.tranche_index,
            last_crash_date = ?state.last_crash_date,
            "crash state saved"
        );
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "crash_state.json".into());
        self.path
            .with_file_name(format!(".{file_name}.{}.tmp", std::process::id()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("crash_state.json"));
        let state = CrashState {
            last_crash_date: NaiveDate::from_ymd_opt(2024, 3, 1),
            tranche_index: 3,
            ..CrashState::seed()
        };
        store.save(&state).unwrap();
        assert_eq!(store.load().unwrap(), state);
    }

    #[test]
    fn save_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("crash_state.json"));
        store.save(&CrashState::seed()).unwrap();
        store.save(&CrashState::seed()).unwrap();
        let names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["crash_state.json".to_string()]);
    }

    #[test]
    fn save_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("state/nested/crash_state.json"));
        store.save(&CrashState::seed()).unwrap();
        assert!(store.path().exists());
    }

    #[test]
    fn missing_file_is_read_error_and_seeds() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("absent.json"));
        assert!(matches!(store.load(), Err(PersistenceError::Read { .. })));
        assert_eq!(store.load_or_seed(), CrashState::seed());
    }

    #[test]
    fn corrupt_file_is_parse_error_and_seeds() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crash_state.json");
        fs::write(&path, "not valid json {{{").unwrap();
        let store = StateStore::new(&path);
        assert!(matches!(store.load(), Err(PersistenceError::Parse { .. })));
        assert_eq!(store.load_or_seed(), CrashState::seed());
    }

    #[test]
    fn legacy_deployed_flags_are_migrated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crash_state.json");
        fs::write(
            &path,
            r#"{"deployed": [true, true, false, false, false, false]}"#,
        )
        .unwrap();
        let state = StateStore::new(&path).load().unwrap();
        assert_eq!(state.tranche_index, 2);
        assert_eq!(state.last_crash_date, None);
    }

    #[test]
    fn failed_write_keeps_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crash_state.json");
        let store = StateStore::new(&path);
        store.save(&CrashState::seed()).unwrap();

        // A directory where the temp file should go makes the write fail.
        fs::create_dir(store.tmp_path()).unwrap();
        let next = CrashState {
            tranche_index: 1,
            ..CrashState::seed()
        };
        assert!(matches!(store.save(&next), Err(PersistenceError::Write { .. })));
        assert_eq!(store.load().unwrap(), CrashState::seed());
    }
}
