use crate::error::ProgressError;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Progress key for the table drop/select-into loop.
pub const TABLE_OPERATIONS: &str = "table_operations";

/// Progress key for the primary key loop.
pub const PK_CREATION: &str = "pk_creation";

/// Last completed 1-based item index per named loop.
pub trait ProgressStore: Send {
    /// Returns 0 for loops that have not started.
    fn get(&self, key: &str) -> usize;
    fn update(&mut self, key: &str, index: usize) -> Result<(), ProgressError>;
    fn clear(&mut self) -> Result<(), ProgressError>;
}

/// Progress persisted as a flat JSON object, e.g. `{"table_operations": 12}`.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    path: PathBuf,
    state: BTreeMap<String, usize>,
}

impl ProgressTracker {
    /// An unreadable or malformed file is treated as empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let state = read_state(&path);
        Self { path, state }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(&self) -> Result<(), ProgressError> {
        let to_err = |e: &dyn std::fmt::Display| ProgressError::Write {
            path: self.path.display().to_string(),
            message: e.to_string(),
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| to_err(&e))?;
            }
        }
        let body = serde_json::to_string(&self.state).map_err(|e| to_err(&e))?;
        fs::write(&self.path, body).map_err(|e| to_err(&e))
    }
}

fn read_state(path: &Path) -> BTreeMap<String, usize> {
    let Ok(text) = fs::read_to_string(path) else {
        return BTreeMap::new();
    };

    match serde_json::from_str::<BTreeMap<String, serde_json::Value>>(&text) {
        Ok(raw) => raw
            .into_iter()
            .filter_map(|(k, v)| {
                let n = v
                    .as_u64()
                    .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))?;
                Some((k, usize::try_from(n).ok()?))
            })
            .collect(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring unreadable progress file");
            BTreeMap::new()
        }
    }
}

impl ProgressStore for ProgressTracker {
    fn get(&self, key: &str) -> usize {
        self.state.get(key).copied().unwrap_or(0)
    }

    fn update(&mut self, key: &str, index: usize) -> Result<(), ProgressError> {
        self.state.insert(key.to_string(), index);
        self.write()
    }

    fn clear(&mut self) -> Result<(), ProgressError> {
        self.state.clear();
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ProgressError::Remove {
                path: self.path.display().to_string(),
                message: e.to_string(),
            }),
        }
    }
}

/// Progress kept only for the lifetime of the process.
#[derive(Debug, Clone, Default)]
pub struct MemoryProgress {
    state: BTreeMap<String, usize>,
}

impl MemoryProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, index: usize) -> Self {
        self.state.insert(key.to_string(), index);
        self
    }
}

impl ProgressStore for MemoryProgress {
    fn get(&self, key: &str) -> usize {
        self.state.get(key).copied().unwrap_or(0)
    }

    fn update(&mut self, key: &str, index: usize) -> Result<(), ProgressError> {
        self.state.insert(key.to_string(), index);
        Ok(())
    }

    fn clear(&mut self) -> Result<(), ProgressError> {
        self.state.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{ProgressStore, ProgressTracker, TABLE_OPERATIONS};
    use std::fs;

    #[test]
    fn missing_file_starts_at_zero() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = ProgressTracker::open(dir.path().join("justice_progress.json"));
        assert_eq!(tracker.get(TABLE_OPERATIONS), 0);
    }

    #[test]
    fn updates_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("progress.json");

        let mut tracker = ProgressTracker::open(&path);
        tracker.update(TABLE_OPERATIONS, 4).unwrap();
        tracker.update("pk_creation", 2).unwrap();

        let reopened = ProgressTracker::open(&path);
        assert_eq!(reopened.get(TABLE_OPERATIONS), 4);
        assert_eq!(reopened.get("pk_creation"), 2);
    }

    #[test]
    fn clear_removes_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress.json");
        let mut tracker = ProgressTracker::open(&path);
        tracker.update(TABLE_OPERATIONS, 1).unwrap();

        tracker.clear().unwrap();
        assert!(!path.exists());
        assert_eq!(tracker.get(TABLE_OPERATIONS), 0);
        tracker.clear().unwrap();
    }

    #[test]
    fn malformed_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress.json");
        fs::write(&path, "{not json").unwrap();
        assert_eq!(ProgressTracker::open(&path).get(TABLE_OPERATIONS), 0);

        fs::write(&path, r#"{"table_operations": "7", "other": -1}"#).unwrap();
        let tracker = ProgressTracker::open(&path);
        assert_eq!(tracker.get(TABLE_OPERATIONS), 7);
        assert_eq!(tracker.get("other"), 0);
    }
}
