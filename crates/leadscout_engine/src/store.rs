//! Local fallback for scrape results that could not reach the coordinator.

use std::fs;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use leadscout_core::{Contact, JobId};
use scout_logging::{scout_info, scout_warn};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;

const PENDING_FILENAME: &str = "pending_results.ron";

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("state directory unusable: {0}")]
    StateDir(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("failed to serialize pending results: {0}")]
    Serialize(String),
    #[error("failed to parse pending results: {0}")]
    Deserialize(String),
}

/// Creates the state directory if needed and checks that it accepts new files.
pub fn ensure_state_dir(dir: &Path) -> Result<(), PersistError> {
    match fs::metadata(dir) {
        Ok(meta) if !meta.is_dir() => {
            return Err(PersistError::StateDir(format!(
                "{} is not a directory",
                dir.display()
            )))
        }
        Ok(_) => {}
        Err(err) if err.kind() == ErrorKind::NotFound => {
            fs::create_dir_all(dir).map_err(|err| PersistError::StateDir(err.to_string()))?
        }
        Err(err) => return Err(PersistError::StateDir(err.to_string())),
    }
    NamedTempFile::new_in(dir)
        .map(drop)
        .map_err(|err| PersistError::StateDir(format!("{} is not writable: {err}", dir.display())))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingBatch {
    pub job_id: JobId,
    pub contacts: Vec<Contact>,
    /// RFC 3339 timestamp of when the batch was parked.
    pub saved_at: String,
}

impl PendingBatch {
    pub fn now(job_id: JobId, contacts: Vec<Contact>) -> Self {
        Self {
            job_id,
            contacts,
            saved_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct PendingFile {
    batches: Vec<PendingBatch>,
}

/// RON-backed list of undelivered batches. Clones share one file lock.
#[derive(Debug, Clone)]
pub struct PendingStore {
    dir: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl PendingStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(PENDING_FILENAME)
    }

    pub fn append(&self, batch: PendingBatch) -> Result<(), PersistError> {
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut file = read_file(&self.path())?;
        file.batches.push(batch);
        write_file(&self.dir, &file)
    }

    pub fn load(&self) -> Result<Vec<PendingBatch>, PersistError> {
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(read_file(&self.path())?.batches)
    }

    /// Removes and returns every parked batch.
    pub fn take_all(&self) -> Result<Vec<PendingBatch>, PersistError> {
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let path = self.path();
        let file = read_file(&path)?;
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
        if !file.batches.is_empty() {
            scout_info!("Recovered {} pending batch(es) from {:?}", file.batches.len(), path);
        }
        Ok(file.batches)
    }
}

fn read_file(path: &Path) -> Result<PendingFile, PersistError> {
    let content = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(PendingFile::default()),
        Err(err) => return Err(err.into()),
    };
    ron::from_str(&content).map_err(|err| {
        scout_warn!("Failed to parse pending results from {:?}: {}", path, err);
        PersistError::Deserialize(err.to_string())
    })
}

/// Serializes `file` next to its target and renames it into place, so a
/// crash never leaves a half-written pending file.
fn write_file(dir: &Path, file: &PendingFile) -> Result<(), PersistError> {
    let pretty = ron::ser::PrettyConfig::new();
    let content = ron::ser::to_string_pretty(file, pretty)
        .map_err(|err| PersistError::Serialize(err.to_string()))?;

    ensure_state_dir(dir)?;
    let mut staged = NamedTempFile::new_in(dir)?;
    staged.write_all(content.as_bytes())?;
    staged.as_file_mut().sync_all()?;
    staged
        .persist(dir.join(PENDING_FILENAME))
        .map_err(|err| PersistError::Io(err.error))?;
    Ok(())
}
