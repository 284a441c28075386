//! Configuration types for split-rsync
//!
//! This module defines:
//! - CLI argument parsing using clap derive macros
//! - Runtime configuration with validation
//! - The narrow per-component configs handed to the core

use crate::delete::{DeleteConfig, DEFAULT_BATCH_SIZE};
use crate::error::ConfigError;
use crate::list::{CodecConfig, DEFAULT_BUFFER_SIZE, SANE_PATH_LEN};
use crate::rsync::{is_remote, RSYNC_CMD};
use crate::split::{SplitConfig, SplitStrategy, DEFAULT_SIZE_FLOOR};
use clap::Parser;
use std::ffi::OsString;
use std::path::PathBuf;

/// Maximum shard count
const MAX_SHARDS: usize = 1024;

/// Maximum deletion worker count
const MAX_WORKERS: usize = 512;

/// Deletion batch size limits
const MIN_BATCH_SIZE: usize = 1;
const MAX_BATCH_SIZE: usize = 1_000_000;

/// Smallest accepted read buffer
const MIN_BUFFER_SIZE: usize = 4096;

/// Smallest accepted corruption threshold
const MIN_PATH_LEN: usize = 256;

/// Run one rsync job as N concurrent rsync processes
#[derive(Parser, Debug, Clone)]
#[command(
    name = "split-rsync",
    version,
    about = "Run one rsync job as N concurrent rsync processes",
    long_about = "Splits the file list of an rsync job into balanced shards and syncs them \
                  with concurrent rsync processes.\n\n\
                  A dry run lists what would change. Directories are synced first in a single \
                  pass, then every shard runs in parallel. Extraneous destination entries are \
                  removed by a separate parallel deletion pass, never by the shards.",
    after_help = "EXAMPLES:\n    \
        split-rsync -n 8 /data/src/ /data/dst/ -- -a --numeric-ids\n    \
        split-rsync --strategy round-robin host:/export/ /mnt/copy/ -- -aH\n    \
        split-rsync --delete --delete-workers 16 src/ dst/ -- -a\n    \
        split-rsync --tmpdir /var/tmp --keep-lists src/ dst/ -- -a  # inspect lists"
)]
pub struct CliArgs {
    /// Source, as given to rsync
    #[arg(value_name = "SOURCE")]
    pub source: OsString,

    /// Destination, as given to rsync
    #[arg(value_name = "DEST")]
    pub dest: OsString,

    /// Options forwarded to every rsync invocation (after --)
    #[arg(last = true, value_name = "RSYNC_ARGS")]
    pub rsync_args: Vec<OsString>,

    /// Number of concurrent rsync processes
    #[arg(short = 'n', long, default_value_t = num_cpus::get(), value_name = "NUM")]
    pub nproc: usize,

    /// How files are spread over the processes
    #[arg(long, value_enum, default_value_t = SplitStrategy::LeastLoaded)]
    pub strategy: SplitStrategy,

    /// Remove extraneous destination entries with a parallel deletion pass
    #[arg(long)]
    pub delete: bool,

    /// Worker threads for the deletion pass (default: --nproc)
    #[arg(long, value_name = "NUM")]
    pub delete_workers: Option<usize>,

    /// Paths per deletion batch
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE, value_name = "NUM")]
    pub delete_batch_size: usize,

    /// Minimum weight in bytes of a single file when balancing by size
    #[arg(long, default_value_t = DEFAULT_SIZE_FLOOR, value_name = "BYTES")]
    pub size_floor: u64,

    /// Read buffer size for list files
    #[arg(long, default_value_t = DEFAULT_BUFFER_SIZE, value_name = "BYTES")]
    pub buffer_size: usize,

    /// Longest path accepted before a list file is considered corrupt
    #[arg(long, default_value_t = SANE_PATH_LEN, value_name = "BYTES")]
    pub max_path_len: usize,

    /// Directory in which the job's scratch directory is created
    #[arg(long, value_name = "DIR")]
    pub tmpdir: Option<PathBuf>,

    /// Keep the scratch directory and its lists after the job
    #[arg(long)]
    pub keep_lists: bool,

    /// rsync binary
    #[arg(long, default_value = RSYNC_CMD, value_name = "PATH")]
    pub rsync: OsString,

    /// Quiet mode - suppress progress output
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Verbose output (debug logging)
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

/// Validated runtime configuration
#[derive(Debug, Clone)]
pub struct JobConfig {
    pub source: OsString,
    pub dest: OsString,

    /// rsync binary
    pub rsync_program: OsString,

    /// Options forwarded to every invocation
    pub rsync_opts: Vec<OsString>,

    /// Partitioning settings
    pub split: SplitConfig,

    /// Deletion settings, `None` when deletion is off
    pub delete: Option<DeleteConfig>,

    /// Parent of the scratch directory
    pub tmpdir: Option<PathBuf>,

    /// Keep the scratch directory
    pub keep_lists: bool,

    /// Show progress indicator
    pub show_progress: bool,

    /// Verbose logging
    pub verbose: bool,
}

impl JobConfig {
    /// Create and validate configuration from CLI arguments
    pub fn from_args(args: CliArgs) -> Result<Self, ConfigError> {
        if args.nproc == 0 || args.nproc > MAX_SHARDS {
            return Err(ConfigError::InvalidShardCount {
                count: args.nproc,
                max: MAX_SHARDS,
            });
        }

        let delete_workers = args.delete_workers.unwrap_or(args.nproc);
        if delete_workers == 0 || delete_workers > MAX_WORKERS {
            return Err(ConfigError::InvalidWorkerCount {
                count: delete_workers,
                max: MAX_WORKERS,
            });
        }

        if args.delete_batch_size < MIN_BATCH_SIZE || args.delete_batch_size > MAX_BATCH_SIZE {
            return Err(ConfigError::InvalidBatchSize {
                size: args.delete_batch_size,
                min: MIN_BATCH_SIZE,
                max: MAX_BATCH_SIZE,
            });
        }

        if args.buffer_size < MIN_BUFFER_SIZE {
            return Err(ConfigError::InvalidBufferSize {
                size: args.buffer_size,
                min: MIN_BUFFER_SIZE,
            });
        }

        if args.max_path_len < MIN_PATH_LEN {
            return Err(ConfigError::InvalidPathLimit {
                len: args.max_path_len,
                min: MIN_PATH_LEN,
            });
        }

        if let Some(ref dir) = args.tmpdir {
            if !dir.is_dir() {
                return Err(ConfigError::InvalidTmpDir {
                    path: dir.clone(),
                    reason: "Not an existing directory".to_string(),
                });
            }
        }

        if args.delete && is_remote(&args.dest) {
            return Err(ConfigError::RemoteDeleteDest {
                dest: args.dest.to_string_lossy().into_owned(),
            });
        }

        let codec = CodecConfig {
            buffer_size: args.buffer_size,
            max_record_len: args.max_path_len,
        };

        let split = SplitConfig {
            shards: args.nproc,
            strategy: args.strategy,
            size_floor: args.size_floor,
            codec,
        };

        let delete = args.delete.then_some(DeleteConfig {
            workers: delete_workers,
            batch_size: args.delete_batch_size,
            codec,
        });

        Ok(Self {
            source: args.source,
            dest: args.dest,
            rsync_program: args.rsync,
            rsync_opts: args.rsync_args,
            split,
            delete,
            tmpdir: args.tmpdir,
            keep_lists: args.keep_lists,
            show_progress: !args.quiet,
            verbose: args.verbose,
        })
    }

    /// Options for the dry run: the forwarded options plus `--delete` when
    /// deletions should be reported
    pub fn dry_run_opts(&self) -> Vec<OsString> {
        let mut opts = self.rsync_opts.clone();
        if self.delete.is_some() {
            opts.push("--delete".into());
        }
        opts
    }
}
