//! Error types for split-rsync
//!
//! This module defines the error hierarchy that covers:
//! - rsync subprocess failures
//! - NUL-delimited list file I/O and corruption
//! - Configuration and CLI errors
//! - Worker pool errors
//! - Removal failures during parallel deletion
//!
//! Parse-level anomalies (`MalformedRecord`) are never propagated: they are
//! logged and the offending record is skipped. Everything else is fatal to
//! the operation that raised it.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for split-rsync
#[derive(Error, Debug)]
pub enum SyncError {
    /// rsync could not be started or exited non-zero
    #[error("rsync error: {0}")]
    Tool(#[from] ToolError),

    /// List file errors (I/O, corruption)
    #[error("List error: {0}")]
    List(#[from] ListError),

    /// Removal failure during parallel deletion
    #[error("Deletion error: {0}")]
    Removal(#[from] RemovalError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Worker pool errors
    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    /// A delete option was passed to a parallel invocation
    #[error("Option '{option}' is forbidden during parallel rsync, deletions are handled separately")]
    ForbiddenOption { option: String },

    /// One or more shard invocations failed
    #[error("Shard {shard} failed: {source}")]
    ShardFailed {
        shard: usize,
        #[source]
        source: ToolError,
    },

    /// Interrupted by signal
    #[error("Operation interrupted by signal")]
    Interrupted,
}

/// rsync subprocess errors
#[derive(Error, Debug, Clone)]
pub enum ToolError {
    /// The process could not be started
    #[error("Failed to start '{program}': {reason}")]
    Spawn { program: String, reason: String },

    /// The process exited with a failure status
    #[error("{program} terminated with {}{}", exit_display(.code), stderr_display(.stderr))]
    Exit {
        program: String,
        code: Option<i32>,
        stderr: String,
    },
}

impl ToolError {
    /// Captured standard error, if any
    pub fn stderr(&self) -> Option<&str> {
        match self {
            ToolError::Exit { stderr, .. } if !stderr.is_empty() => Some(stderr),
            _ => None,
        }
    }
}

fn exit_display(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("returncode {}", c),
        None => "a signal".to_string(),
    }
}

fn stderr_display(stderr: &str) -> String {
    let stderr = stderr.trim_end();
    if stderr.is_empty() {
        String::new()
    } else {
        format!("\n\nrsync output / error:\n{}\n", stderr)
    }
}

/// List file errors
#[derive(Error, Debug)]
pub enum ListError {
    /// A record grew past the sanity limit without a separator
    #[error(
        "Possible corrupt input file '{}'. Cannot find an end of record separator {} \
         after {max_len} bytes. If the list was built with NUL separators it must be read \
         with \\0 as separator (--from0), otherwise it must not. If the list was created \
         internally, the scratch file was likely corrupted",
        .path.display(),
        separator_display(.separator)
    )]
    Corrupt {
        path: PathBuf,
        separator: u8,
        max_len: usize,
    },

    /// Failed to open, read or write a list file
    #[error("I/O error on list '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Printable form of a record separator for diagnostics
pub fn separator_display(separator: &u8) -> String {
    match *separator {
        0 => "\\0".to_string(),
        other => other.escape_ascii().to_string(),
    }
}

impl ListError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ListError::Io {
            path: path.into(),
            source,
        }
    }
}

/// A manifest line or list record that did not match the expected grammar.
///
/// Only ever logged; the record is skipped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{reason}: {record}")]
pub struct MalformedRecord {
    /// Lossy, printable rendition of the offending record
    pub record: String,
    pub reason: &'static str,
}

impl MalformedRecord {
    pub fn new(record: &[u8], reason: &'static str) -> Self {
        Self {
            record: String::from_utf8_lossy(record).into_owned(),
            reason,
        }
    }
}

/// A removal that failed for a reason other than "already absent"
#[derive(Error, Debug)]
#[error("Failed to remove '{}': {source}", .path.display())]
pub struct RemovalError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// Configuration and CLI errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Invalid shard count
    #[error("Invalid process count {count}: must be between 1 and {max}")]
    InvalidShardCount { count: usize, max: usize },

    /// Invalid worker count for deletion
    #[error("Invalid delete worker count {count}: must be between 1 and {max}")]
    InvalidWorkerCount { count: usize, max: usize },

    /// Invalid deletion batch size
    #[error("Invalid batch size {size}: must be between {min} and {max}")]
    InvalidBatchSize { size: usize, min: usize, max: usize },

    /// Invalid read buffer size
    #[error("Invalid buffer size {size}: must be at least {min}")]
    InvalidBufferSize { size: usize, min: usize },

    /// Invalid sanity path length
    #[error("Invalid maximum path length {len}: must be at least {min}")]
    InvalidPathLimit { len: usize, min: usize },

    /// Scratch directory error
    #[error("Invalid temporary directory '{}': {reason}", .path.display())]
    InvalidTmpDir { path: PathBuf, reason: String },

    /// Parallel deletion needs the destination on a local filesystem
    #[error("Parallel deletion requires a local destination, got '{dest}'")]
    RemoteDeleteDest { dest: String },
}

/// Worker pool errors
#[derive(Error, Debug)]
pub enum WorkerError {
    /// Failed to spawn a pool thread
    #[error("Failed to spawn worker {id} of pool '{pool}': {reason}")]
    Spawn {
        pool: String,
        id: usize,
        reason: String,
    },

    /// A task panicked
    #[error("Task {task} of pool '{pool}' panicked")]
    Panicked { pool: String, task: usize },

    /// A task did not settle within the join timeout
    #[error("Task {task} of pool '{pool}' did not finish within {secs}s")]
    TimedOut { pool: String, task: usize, secs: u64 },

    /// The job queue was closed before the task could be submitted
    #[error("Job queue of pool '{pool}' is closed")]
    QueueClosed { pool: String },

    /// A pool thread terminated abnormally
    #[error("Worker {id} of pool '{pool}' terminated abnormally")]
    Died { pool: String, id: usize },
}

/// Result type alias for SyncError
pub type Result<T> = std::result::Result<T, SyncError>;

/// Result type alias for ToolError
pub type ToolResult<T> = std::result::Result<T, ToolError>;

/// Result type alias for ListError
pub type ListResult<T> = std::result::Result<T, ListError>;
