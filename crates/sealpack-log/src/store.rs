//! File-backed transparency log.
//!
//! `TransparencyLog` is the single owner of the durable log file. All
//! callers go through `append` and `read`; nothing else touches the file.
//!
//! Appends are read-modify-write under two locks: a `Mutex` for callers in
//! this process and an exclusive `flock` on the sidecar `<log>.lock` for
//! other processes. Inside both the current durable state is reloaded, the
//! entry pushed, the root recomputed, and the whole structure written to a
//! temp file in the same directory which is then renamed over the log. A
//! failure at any point leaves the previous file untouched.

use std::{
    ffi::OsString,
    fs::{self, File, OpenOptions},
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
    sync::Mutex,
};

use fs2::FileExt;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use sealpack_contracts::{
    digest::Digest,
    error::{SealpackError, SealpackResult},
    log::{LogEntry, LogState},
};
use sealpack_core::traits::TransparencySink;

use crate::merkle::{merkle_root, verify_log};

/// Append-only, Merkle-rooted log persisted as JSON.
///
/// # Thread safety
///
/// Share one instance behind an `Arc`, or open several on the same path.
/// `append` holds an internal mutex and an exclusive file lock for the whole
/// read-modify-write, so concurrent appends are never lost, including
/// appends from separate `sealpack` processes.
pub struct TransparencyLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl TransparencyLog {
    /// Open (lazily) the log at `path`. The file is created on first append.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the current durable state without mutating it.
    ///
    /// Returns `None` when the log file does not exist. A file that exists
    /// but is not a well-formed log reads as an empty log; callers needing
    /// strict integrity should use `read_strict`.
    ///
    /// # Errors
    ///
    /// `Io` only when the file exists but cannot be read.
    pub fn read(&self) -> SealpackResult<Option<LogState>> {
        match self.load()? {
            Loaded::Absent => Ok(None),
            Loaded::Malformed(reason) => {
                warn!(
                    path = %self.path.display(),
                    reason = %reason,
                    "malformed transparency log, reading as empty"
                );
                Ok(Some(LogState::default()))
            }
            Loaded::State(state) => Ok(Some(state)),
        }
    }

    /// Load the current durable state, refusing anything that is not an
    /// intact log.
    ///
    /// Returns `None` when the log file does not exist.
    ///
    /// # Errors
    ///
    /// `Io` when the file cannot be read, is malformed, or its stored
    /// `merkleRoot` does not match its entries.
    pub fn read_strict(&self) -> SealpackResult<Option<LogState>> {
        match self.load()? {
            Loaded::Absent => Ok(None),
            Loaded::Malformed(reason) => Err(SealpackError::Io {
                path: self.path.display().to_string(),
                reason: format!("malformed transparency log: {}", reason),
            }),
            Loaded::State(state) if verify_log(&state) => Ok(Some(state)),
            Loaded::State(_) => Err(SealpackError::Io {
                path: self.path.display().to_string(),
                reason: "stored merkleRoot does not match entries".to_string(),
            }),
        }
    }

    /// Append `entry`, recompute the root, and persist.
    ///
    /// Returns the full updated entry sequence and the new root.
    ///
    /// # Errors
    ///
    /// `Io` if the existing file cannot be read, is malformed, fails root
    /// verification, or the new state cannot be written. In every case the
    /// previous file is left as it was.
    pub fn append(&self, entry: LogEntry) -> SealpackResult<(Vec<LogEntry>, Digest)> {
        let _guard = self.lock.lock().map_err(|e| SealpackError::Io {
            path: self.path.display().to_string(),
            reason: format!("transparency log lock poisoned: {}", e),
        })?;
        // Released when dropped at the end of the append.
        let _file_lock = self.lock_file()?;

        let mut state = match self.load()? {
            Loaded::Absent => LogState::default(),
            Loaded::State(state) if verify_log(&state) => state,
            Loaded::State(_) => {
                return Err(SealpackError::Io {
                    path: self.path.display().to_string(),
                    reason: "refusing to append: stored merkleRoot does not match entries"
                        .to_string(),
                });
            }
            Loaded::Malformed(reason) => {
                // Overwriting would silently discard whatever is there.
                return Err(SealpackError::Io {
                    path: self.path.display().to_string(),
                    reason: format!("refusing to append to malformed log: {}", reason),
                });
            }
        };

        let action = entry.action;
        state.entries.push(entry);
        let root = merkle_root(&state.entries)
            .expect("a log with at least one entry always has a root");
        state.merkle_root = Some(root.clone());

        self.persist(&state)?;

        info!(
            path = %self.path.display(),
            action = action.as_str(),
            entry_count = state.entries.len(),
            merkle_root = %root,
            "transparency log entry appended"
        );

        Ok((state.entries, root))
    }

    fn load(&self) -> SealpackResult<Loaded> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Loaded::Absent),
            Err(e) if e.kind() == ErrorKind::InvalidData => {
                return Ok(Loaded::Malformed("not valid UTF-8".to_string()))
            }
            Err(e) => return Err(SealpackError::io(&self.path, e)),
        };
        match serde_json::from_str::<LogState>(&text) {
            Ok(state) => Ok(Loaded::State(state)),
            Err(e) => Ok(Loaded::Malformed(e.to_string())),
        }
    }

    fn dir(&self) -> SealpackResult<PathBuf> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(|e| SealpackError::io(&dir, e))?;
        Ok(dir)
    }

    /// Sidecar file whose exclusive lock guards the log across processes.
    pub fn lock_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| OsString::from("transparency-log"));
        name.push(".lock");
        self.path.with_file_name(name)
    }

    /// Block until this process holds the exclusive lock on `lock_path`.
    fn lock_file(&self) -> SealpackResult<File> {
        self.dir()?;
        let lock_path = self.lock_path();
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(|e| SealpackError::io(&lock_path, e))?;
        file.lock_exclusive().map_err(|e| SealpackError::Io {
            path: lock_path.display().to_string(),
            reason: format!("failed to lock transparency log: {}", e),
        })?;
        Ok(file)
    }

    fn persist(&self, state: &LogState) -> SealpackResult<()> {
        let dir = self.dir()?;

        let mut json = serde_json::to_string_pretty(state).map_err(|e| SealpackError::Io {
            path: self.path.display().to_string(),
            reason: format!("failed to serialize log: {}", e),
        })?;
        json.push('\n');

        let mut tmp = NamedTempFile::new_in(&dir).map_err(|e| SealpackError::io(&dir, e))?;
        tmp.write_all(json.as_bytes())
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| SealpackError::io(tmp.path(), e))?;
        tmp.persist(&self.path)
            .map_err(|e| SealpackError::io(&self.path, e.error))?;

        debug!(path = %self.path.display(), bytes = json.len(), "transparency log persisted");
        Ok(())
    }
}

impl TransparencySink for TransparencyLog {
    fn append(&self, entry: LogEntry) -> SealpackResult<Digest> {
        TransparencyLog::append(self, entry).map(|(_, root)| root)
    }
}

enum Loaded {
    Absent,
    Malformed(String),
    State(LogState),
}
