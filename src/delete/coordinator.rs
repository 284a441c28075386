//! Parallel removal of the deletion manifest
//!
//! # Protocol
//!
//! ```text
//!   manifest ──► DeletionBatcher ──► WorkerPool ("delete-N")
//!                                      │  remove files
//!                                      │  defer directories
//!                                      ▼
//!                          all batches settled (gather)
//!                                      │
//!                                      ▼
//!                 deferred dirs, sorted descending, removed
//!                 one by one on the calling thread
//! ```
//!
//! Directories are never removed concurrently; some network filesystems
//! reject concurrent removal within the same tree.

use crate::delete::batch::DeletionBatcher;
use crate::delete::DeleteConfig;
use crate::error::{RemovalError, Result, SyncError};
use crate::list::{RecordReader, NUL};
use crate::manifest::encode_path;
use crate::pool::{gather, WorkerPool, JOIN_TIMEOUT};
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Outcome of removing one batch
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// Files removed
    pub removed: u64,

    /// Entries already absent
    pub missing: u64,

    /// Relative paths that turned out to be directories
    pub deferred: Vec<Vec<u8>>,
}

/// Totals for a whole deletion run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteReport {
    /// Non-directory entries removed
    pub files_removed: u64,

    /// Directories removed
    pub dirs_removed: u64,

    /// Entries (files or directories) that were already gone
    pub missing: u64,

    /// Manifest records skipped as unsafe
    pub skipped: u64,

    /// Batches submitted to the pool
    pub batches: u64,
}

/// Coordinator for one destination root
pub struct ParallelDelete {
    dest: PathBuf,
    config: DeleteConfig,
    shutdown: Option<Arc<AtomicBool>>,
    timeout: Duration,
}

impl ParallelDelete {
    pub fn new(dest: impl Into<PathBuf>, config: DeleteConfig) -> Self {
        Self {
            dest: dest.into(),
            config,
            shutdown: None,
            timeout: JOIN_TIMEOUT,
        }
    }

    /// Stop submitting batches once `flag` is set
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown = Some(flag);
        self
    }

    /// Per-batch wait limit
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn is_shutdown(&self) -> bool {
        self.shutdown
            .as_ref()
            .map(|f| f.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    /// Remove every path listed in `manifest`
    pub fn run(&self, manifest: &Path) -> Result<DeleteReport> {
        let mut report = DeleteReport::default();
        let mut pool = WorkerPool::new("delete", self.config.workers, self.config.workers * 2)?;
        let mut batcher = DeletionBatcher::new(self.config.batch_size);
        let mut handles = Vec::new();
        let dest = Arc::new(self.dest.clone());
        let mut interrupted = false;

        info!(
            dest = %self.dest.display(),
            workers = pool.size(),
            batch_size = self.config.batch_size,
            "Starting parallel deletion"
        );

        for record in RecordReader::open(manifest, NUL, &self.config.codec)? {
            let record = record?;

            if !is_safe_relative(&record) {
                warn!(
                    path = %String::from_utf8_lossy(&encode_path(&record)),
                    "Skipping unsafe deletion path"
                );
                report.skipped += 1;
                continue;
            }

            if let Some(batch) = batcher.push(record) {
                if self.is_shutdown() {
                    interrupted = true;
                    break;
                }
                let dest = Arc::clone(&dest);
                handles.push(pool.submit(move || remove_batch(&dest, batch))?);
            }
        }

        if !interrupted {
            if let Some(batch) = batcher.flush() {
                let dest = Arc::clone(&dest);
                handles.push(pool.submit(move || remove_batch(&dest, batch))?);
            }
        }

        report.batches = handles.len() as u64;
        debug!(batches = report.batches, "Waiting for deletion batches");

        let mut deferred = Vec::new();
        let mut first_error: Option<SyncError> = None;

        let outcomes = gather(handles, self.timeout);
        pool.finish(&outcomes)?;

        for outcome in outcomes {
            match outcome {
                Ok(Ok(batch)) => {
                    report.files_removed += batch.removed;
                    report.missing += batch.missing;
                    deferred.extend(batch.deferred);
                }
                Ok(Err(e)) => {
                    warn!(error = %e, "Deletion batch failed");
                    first_error.get_or_insert(e.into());
                }
                Err(e) => {
                    warn!(error = %e, "Deletion batch did not complete");
                    first_error.get_or_insert(e.into());
                }
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }
        if interrupted {
            warn!("Deletion interrupted before the manifest was exhausted");
            return Err(SyncError::Interrupted);
        }

        remove_directories(&self.dest, deferred, &mut report)?;

        info!(
            files = report.files_removed,
            dirs = report.dirs_removed,
            missing = report.missing,
            "Parallel deletion complete"
        );

        Ok(report)
    }
}

/// Remove the files of one batch, deferring directories
pub fn remove_batch(dest: &Path, batch: Vec<Vec<u8>>) -> std::result::Result<BatchOutcome, RemovalError> {
    let mut outcome = BatchOutcome::default();

    for relative in batch {
        let path = dest.join(path_from_bytes(&relative));

        match fs::remove_file(&path) {
            Ok(()) => {
                trace!(path = %path.display(), "Removed");
                outcome.removed += 1;
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                outcome.missing += 1;
            }
            Err(e) => {
                // unlink(2) on a directory fails with EISDIR or EPERM
                if fs::symlink_metadata(&path).map(|m| m.is_dir()).unwrap_or(false) {
                    outcome.deferred.push(relative);
                } else {
                    return Err(RemovalError { path, source: e });
                }
            }
        }
    }

    Ok(outcome)
}

/// Remove deferred directories deepest-first on the calling thread.
///
/// Descending byte order puts `a/b/` before `a/` only when both are
/// listed; an unlisted intermediate directory is not handled.
fn remove_directories(
    dest: &Path,
    mut deferred: Vec<Vec<u8>>,
    report: &mut DeleteReport,
) -> std::result::Result<(), RemovalError> {
    deferred.sort_unstable_by(|a, b| b.cmp(a));
    debug!(dirs = deferred.len(), "Removing deferred directories");

    for relative in deferred {
        let path = dest.join(path_from_bytes(&relative));
        match fs::remove_dir(&path) {
            Ok(()) => report.dirs_removed += 1,
            Err(e) if e.kind() == io::ErrorKind::NotFound => report.missing += 1,
            Err(e) => return Err(RemovalError { path, source: e }),
        }
    }

    Ok(())
}

/// Reject anything that could resolve outside the destination
fn is_safe_relative(record: &[u8]) -> bool {
    if record.is_empty() {
        return false;
    }
    path_from_bytes(record)
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

#[cfg(unix)]
fn path_from_bytes(bytes: &[u8]) -> PathBuf {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;
    PathBuf::from(OsStr::from_bytes(bytes))
}

#[cfg(not(unix))]
fn path_from_bytes(bytes: &[u8]) -> PathBuf {
    PathBuf::from(String::from_utf8_lossy(bytes).into_owned())
}
