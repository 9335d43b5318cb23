use crate::profile::DatabaseKind;
use chrono::Local;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::error;

/// Append-only file of failures that were logged and skipped.
///
/// Each entry is one `[YYYY-mm-dd HH:MM:SS] details` line. Write failures are
/// reported through tracing and never interrupt the run.
#[derive(Debug, Clone)]
pub struct ErrorLog {
    path: PathBuf,
}

impl ErrorLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<log_dir>/<kind>_errors.log`
    pub fn for_kind(log_dir: impl AsRef<Path>, kind: DatabaseKind) -> Self {
        Self::new(log_dir.as_ref().join(format!("{}_errors.log", kind.slug())))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, details: &str) {
        if let Err(e) = self.write_entry(details) {
            error!(path = %self.path.display(), error = %e, "failed to write to error log");
        }
    }

    fn write_entry(&self, details: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let stamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        writeln!(file, "[{stamp}] {details}")
    }
}
