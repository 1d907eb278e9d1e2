//! Persistent cache snapshot
//!
//! The whole cache is mirrored to a single JSON object,
//! `<cache_dir>/description.json`, mapping lookup key to record. The file
//! is rewritten after every mutation and read back once at startup.
//!
//! ## Startup checks
//!
//! [`SnapshotStore::prepare`] refuses to start unless:
//! - the client source directory exists
//! - the cache directory exists (created `0700` if missing) and is a directory
//! - a probe file can be written into it and removed again
//!
//! ## Load failures
//!
//! A missing or unreadable snapshot is not fatal. The cache starts empty
//! and any artifact files referenced by the old snapshot are orphaned.

use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::{CacheError, CacheResult};
use crate::record::ArtifactRecord;

/// File name of the snapshot inside the cache directory.
pub const SNAPSHOT_FILENAME: &str = "description.json";

/// Probe file written and removed at startup.
const PROBE_FILENAME: &str = "test";

/// In-memory cache contents, keyed by lookup name.
pub type Snapshot = HashMap<String, ArtifactRecord>;

/// Snapshot persistence errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to serialize snapshot: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write snapshot {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl From<StoreError> for CacheError {
    fn from(e: StoreError) -> Self {
        CacheError::Persistence(e.to_string())
    }
}

/// Reads and writes the snapshot of one cache directory.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    /// Validate the environment and open the cache directory.
    ///
    /// The stored directory path is canonicalized so artifact paths derived
    /// from it are absolute.
    pub fn prepare(cache_dir: &Path, client_source: &Path) -> CacheResult<Self> {
        match fs::metadata(client_source) {
            Ok(meta) if meta.is_dir() => {}
            _ => {
                return Err(CacheError::Config(format!(
                    "client source {} not found; the server must be run from inside the project tree",
                    client_source.display()
                )))
            }
        }

        match fs::metadata(cache_dir) {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => {
                return Err(CacheError::Config(format!(
                    "cache path '{}' already exists, but is a file instead of directory",
                    cache_dir.display()
                )))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                create_private_dir(cache_dir)?;
                info!(path = %cache_dir.display(), "created cache directory");
            }
            Err(e) => return Err(CacheError::Io(e)),
        }

        let probe = cache_dir.join(PROBE_FILENAME);
        fs::write(&probe, PROBE_FILENAME).map_err(|e| {
            CacheError::Io(io::Error::new(
                e.kind(),
                format!("unable to write file into cache directory: {}", e),
            ))
        })?;
        fs::remove_file(&probe).map_err(|e| {
            CacheError::Io(io::Error::new(
                e.kind(),
                format!("unable to delete file in cache directory: {}", e),
            ))
        })?;

        Ok(Self {
            dir: fs::canonicalize(cache_dir)?,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.dir.join(SNAPSHOT_FILENAME)
    }

    /// Load the snapshot. Never fails; problems are logged and yield an
    /// empty cache.
    pub fn load(&self) -> Snapshot {
        let path = self.snapshot_path();
        let contents = match fs::read(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!(path = %path.display(), "no cache snapshot, starting empty");
                return Snapshot::new();
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "unable to load cache");
                return Snapshot::new();
            }
        };

        match serde_json::from_slice::<Snapshot>(&contents) {
            Ok(entries) => {
                info!(path = %path.display(), entries = entries.len(), "loaded cache snapshot");
                entries
            }
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "unable to load cache, previously built artifacts are unreachable"
                );
                Snapshot::new()
            }
        }
    }

    /// Overwrite the snapshot with `entries`.
    ///
    /// The file is written to a temporary name and renamed into place, so
    /// readers see either the old or the new snapshot.
    pub fn save(&self, entries: &Snapshot) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(entries)?;

        let path = self.snapshot_path();
        let temp_path = self.dir.join(format!(".{}.tmp", uuid::Uuid::new_v4()));
        let written = write_private(&temp_path, &json).and_then(|_| fs::rename(&temp_path, &path));
        if let Err(source) = written {
            let _ = fs::remove_file(&temp_path);
            return Err(StoreError::Write { path, source });
        }
        Ok(())
    }
}

#[cfg(unix)]
fn create_private_dir(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    fs::DirBuilder::new().recursive(true).mode(0o700).create(path)
}

#[cfg(not(unix))]
fn create_private_dir(path: &Path) -> io::Result<()> {
    fs::create_dir_all(path)
}

fn write_private(path: &Path, contents: &[u8]) -> io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(contents)?;
    file.sync_all()
}
