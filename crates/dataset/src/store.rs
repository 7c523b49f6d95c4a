//! File-backed dataset store.
//!
//! The whole table lives in a single CSV file. Every append reads the file,
//! reconciles and concatenates in memory, then rewrites the file in full;
//! cost is linear in the accumulated size. Writes go to a temporary file in
//! the same directory and are renamed over the target, so a crash leaves
//! either the previous or the new table on disk.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::csv_codec::{read_csv, write_csv};
use crate::dataset::Dataset;
use crate::errors::{PipelineError, Result};

/// Summary of a successful append.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AppendOutcome {
    pub rows_added: usize,
    pub total_rows: usize,
    pub total_columns: usize,
}

/// Single-file table guarded by one exclusive lock for all reads and writes.
pub struct DatasetStore {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl DatasetStore {
    /// Store at `path` with its own lock.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self::with_lock(path, Arc::new(Mutex::new(())))
    }

    /// Store at `path` sharing an externally owned lock handle.
    pub fn with_lock<P: AsRef<Path>>(path: P, lock: Arc<Mutex<()>>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the storage directory and an empty dataset file if absent.
    pub fn initialize(&self) -> Result<()> {
        let _guard = self.lock.lock();
        if let Some(dir) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|err| {
                PipelineError::storage(format!(
                    "failed to create storage directory {}: {err}",
                    dir.display()
                ))
            })?;
        }
        if !self.path.exists() {
            File::create(&self.path).map_err(|err| {
                PipelineError::storage(format!(
                    "failed to create dataset file {}: {err}",
                    self.path.display()
                ))
            })?;
            info!("Initialized empty dataset at {}", self.path.display());
        }
        Ok(())
    }

    /// Load the full persisted table.
    pub fn read_all(&self) -> Result<Dataset> {
        let _guard = self.lock.lock();
        self.read_unlocked()
    }

    /// True when the file is absent or holds no rows.
    pub fn is_empty(&self) -> Result<bool> {
        let _guard = self.lock.lock();
        if !self.path.exists() {
            return Ok(true);
        }
        Ok(self.read_unlocked()?.is_empty())
    }

    /// Reconcile `rows` against the stored schema, concatenate, and rewrite
    /// the file. Nothing is written if any step fails.
    pub fn append(&self, rows: Dataset) -> Result<AppendOutcome> {
        let _guard = self.lock.lock();
        let mut table = self.read_unlocked()?;
        let rows_added = table.append(rows);
        self.write_unlocked(&table)?;

        let outcome = AppendOutcome {
            rows_added,
            total_rows: table.len(),
            total_columns: table.columns().len(),
        };
        debug!(
            rows_added = outcome.rows_added,
            total_rows = outcome.total_rows,
            "appended rows to dataset"
        );
        Ok(outcome)
    }

    /// Overwrite the store wholesale.
    pub fn replace_all(&self, rows: &Dataset) -> Result<()> {
        let _guard = self.lock.lock();
        self.write_unlocked(rows)
    }

    fn read_unlocked(&self) -> Result<Dataset> {
        let file = File::open(&self.path).map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                PipelineError::storage(format!(
                    "dataset file {} is missing",
                    self.path.display()
                ))
            } else {
                PipelineError::storage(format!(
                    "failed to open dataset file {}: {err}",
                    self.path.display()
                ))
            }
        })?;

        read_csv(BufReader::new(file)).map_err(|err| {
            PipelineError::storage(format!(
                "dataset file {} is unreadable: {err}",
                self.path.display()
            ))
        })
    }

    fn write_unlocked(&self, dataset: &Dataset) -> Result<()> {
        let dir = self
            .path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let mut temp = NamedTempFile::new_in(dir).map_err(|err| {
            PipelineError::storage(format!(
                "failed to create temporary file in {}: {err}",
                dir.display()
            ))
        })?;
        {
            let mut writer = BufWriter::new(temp.as_file_mut());
            write_csv(dataset, &mut writer)?;
            writer.flush()?;
        }
        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|err| {
            PipelineError::storage(format!(
                "failed to replace dataset file {}: {}",
                self.path.display(),
                err.error
            ))
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csv_codec::read_csv_bytes;
    use tempfile::TempDir;

    #[test]
    fn initialize_creates_directory_and_empty_file() {
        let dir = TempDir::new().unwrap();
        let store = DatasetStore::new(dir.path().join("data").join("main.csv"));
        store.initialize().unwrap();

        assert!(store.path().exists());
        assert!(store.is_empty().unwrap());
        assert!(store.read_all().unwrap().columns().is_empty());
    }

    #[test]
    fn read_all_fails_when_file_is_missing() {
        let dir = TempDir::new().unwrap();
        let store = DatasetStore::new(dir.path().join("absent.csv"));
        assert!(matches!(store.read_all(), Err(PipelineError::Storage(_))));
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn failed_append_does_not_mutate() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("main.csv");
        fs::write(&path, "a\nG2V\n").unwrap();
        let store = DatasetStore::new(&path);

        let rows = read_csv_bytes(b"a\n1\n").unwrap();
        assert!(store.append(rows).is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), "a\nG2V\n");
    }
}
