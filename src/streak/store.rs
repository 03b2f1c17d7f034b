//! Durable JSON persistence for the streak population.
//!
//! The whole population lives in one file and is always replaced whole:
//! [`StreakStore::save`] stages the new content in a sibling temp file, fsyncs
//! it, renames it over the target and then reads the target back to verify.
//! A crash before the rename leaves the previous content, a crash after it
//! leaves the new content. `load` never sees a half-written file.

use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};

use super::error::StoreError;
use super::types::{Population, StreakRecord};

/// Handle to the streaks file. Holds no data itself; callers serialize
/// read-modify-write cycles (see [`super::service`]).
#[derive(Debug, Clone)]
pub struct StreakStore {
    path: PathBuf,
}

/// A fully written and synced temp file that has not replaced the target yet.
#[must_use = "a staged save does nothing until committed"]
#[derive(Debug)]
pub struct StagedSave {
    tmp: PathBuf,
    target: PathBuf,
}

impl StreakStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sibling path used for staging, e.g. `streaks.json.tmp`.
    pub fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "streaks.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Read the full population.
    ///
    /// A missing file is an empty population (and the file is created). An
    /// unparseable file is logged as data loss and also yields an empty
    /// population. Only genuine I/O failures are returned as errors.
    pub fn load(&self) -> Result<Population, StoreError> {
        match self.read()? {
            Some(population) => Ok(population),
            None => {
                info!(path = %self.path.display(), "streaks file does not exist, creating empty file");
                let empty = Population::new();
                if let Err(e) = self.save(&empty) {
                    warn!(path = %self.path.display(), error = %e, "could not create streaks file");
                }
                Ok(empty)
            }
        }
    }

    /// Like [`load`](Self::load) but never writes: a missing file is just an
    /// empty population.
    pub fn load_read_only(&self) -> Result<Population, StoreError> {
        Ok(self.read()?.unwrap_or_default())
    }

    /// `None` when the file does not exist.
    fn read(&self) -> Result<Option<Population>, StoreError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io(&self.path, e)),
        };

        match serde_json::from_slice::<Population>(&bytes) {
            Ok(population) => {
                debug!(path = %self.path.display(), users = population.len(), "streaks loaded");
                Ok(Some(population))
            }
            Err(e) => {
                error!(
                    path = %self.path.display(),
                    bytes = bytes.len(),
                    error = %e,
                    "streaks file is corrupt, continuing with an empty population (existing data lost)"
                );
                Ok(Some(Population::new()))
            }
        }
    }

    /// Look up one user's record without mutating anything.
    pub fn get_record(&self, user_id: &str) -> Result<Option<StreakRecord>, StoreError> {
        Ok(self.load()?.swap_remove(user_id))
    }

    /// Atomically replace the file with `population`, then verify it reads back
    /// identically.
    pub fn save(&self, population: &Population) -> Result<(), StoreError> {
        self.stage(population)?.commit()?;
        self.verify(population)?;
        debug!(path = %self.path.display(), users = population.len(), "streaks saved");
        Ok(())
    }

    /// Write and fsync the temp file without touching the target.
    pub fn stage(&self, population: &Population) -> Result<StagedSave, StoreError> {
        let encoded = serde_json::to_vec_pretty(population)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }

        let tmp = self.temp_path();
        let write = || -> std::io::Result<()> {
            let mut file = File::create(&tmp)?;
            file.write_all(&encoded)?;
            file.write_all(b"\n")?;
            file.sync_all()
        };
        if let Err(e) = write() {
            let _ = fs::remove_file(&tmp);
            return Err(StoreError::io(&tmp, e));
        }

        Ok(StagedSave {
            tmp,
            target: self.path.clone(),
        })
    }

    fn verify(&self, expected: &Population) -> Result<(), StoreError> {
        let bytes = fs::read(&self.path).map_err(|e| StoreError::io(&self.path, e))?;
        match serde_json::from_slice::<Population>(&bytes) {
            Ok(actual) if actual == *expected => Ok(()),
            Ok(_) => {
                error!(path = %self.path.display(), "streaks file differs from saved data");
                Err(StoreError::VerificationMismatch {
                    path: self.path.clone(),
                })
            }
            Err(e) => {
                error!(path = %self.path.display(), error = %e, "streaks file unreadable right after save");
                Err(StoreError::VerificationMismatch {
                    path: self.path.clone(),
                })
            }
        }
    }
}

impl StagedSave {
    /// Rename the temp file over the target and make the rename durable.
    pub fn commit(self) -> Result<(), StoreError> {
        if let Err(e) = fs::rename(&self.tmp, &self.target) {
            let _ = fs::remove_file(&self.tmp);
            return Err(StoreError::io(&self.target, e));
        }
        sync_parent_dir(&self.target);
        Ok(())
    }

    pub fn temp_path(&self) -> &Path {
        &self.tmp
    }
}

#[cfg(unix)]
fn sync_parent_dir(path: &Path) {
    let parent = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(p) => p,
        None => Path::new("."),
    };
    if let Err(e) = File::open(parent).and_then(|dir| dir.sync_all()) {
        warn!(dir = %parent.display(), error = %e, "failed to fsync directory after rename");
    }
}

#[cfg(not(unix))]
fn sync_parent_dir(_path: &Path) {}
