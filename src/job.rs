//! One split-rsync job from dry run to last shard
//!
//! Phases, in order:
//!
//! 1. dry run, producing the item list and the deletion manifest
//! 2. split of the item list into shard lists and the directory list
//! 3. parallel deletion (only with `--delete`)
//! 4. directory-tree sync
//! 5. concurrent shard syncs
//!
//! Deletion runs before any transfer so an entry that changed between file
//! and directory is gone before rsync recreates it. Delete options among the
//! forwarded rsync options are rejected before the dry run starts.

use crate::config::JobConfig;
use crate::delete::{DeleteReport, ParallelDelete};
use crate::dispatch::{ParallelSync, SyncReport};
use crate::error::{Result, SyncError};
use crate::manifest::{generate_lists, ParseStats};
use crate::progress::ProgressReporter;
use crate::rsync::SyncTool;
use crate::split::{split_and_dump, SplitStats};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

/// Name of the full item list inside the job directory
pub const ITEM_LIST_NAME: &str = "list-all";

/// Name of the deletion manifest inside the job directory
pub const DELETE_LIST_NAME: &str = "list-delete";

/// Outcome of a completed job
#[derive(Debug, Clone)]
pub struct JobResult {
    pub parse: ParseStats,
    pub split: SplitStats,

    /// `None` when deletion was off
    pub delete: Option<DeleteReport>,

    pub sync: SyncReport,
    pub duration: Duration,
}

/// Runs every phase of a job against one tool
pub struct SyncJob {
    config: JobConfig,
    tool: Arc<dyn SyncTool>,
    shutdown: Arc<AtomicBool>,
}

impl SyncJob {
    pub fn new(config: JobConfig, tool: Arc<dyn SyncTool>) -> Self {
        Self {
            config,
            tool,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag that stops the job between phases once set
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    fn check_shutdown(&self) -> Result<()> {
        if self.shutdown.load(Ordering::SeqCst) {
            info!("Shutdown requested");
            return Err(SyncError::Interrupted);
        }
        Ok(())
    }

    /// Run the job, keeping every list file in `work_dir`
    pub fn run(&self, work_dir: &Path, progress: Option<&ProgressReporter>) -> Result<JobResult> {
        let start = Instant::now();
        let status = |msg: &str| {
            if let Some(p) = progress {
                p.set_status(msg);
            }
        };

        let sync = ParallelSync::new(
            Arc::clone(&self.tool),
            self.config.rsync_opts.clone(),
            self.config.source.clone(),
            self.config.dest.clone(),
        )?
        .with_shutdown_flag(self.shutdown_flag());

        status("Generating file list (rsync dry run)...");
        let item_list = work_dir.join(ITEM_LIST_NAME);
        let delete_list = work_dir.join(DELETE_LIST_NAME);
        let parse = generate_lists(
            self.tool.as_ref(),
            &self.config.dry_run_opts(),
            &self.config.source,
            &self.config.dest,
            &item_list,
            &delete_list,
            self.config.split.codec.buffer_size,
        )?;
        self.check_shutdown()?;

        status("Splitting file list...");
        let lists = split_and_dump(&item_list, work_dir, &self.config.split)?;
        if let Some(p) = progress {
            p.split_done(&parse, &lists.stats);
        }
        self.check_shutdown()?;

        let delete = match self.config.delete {
            Some(delete_config) => {
                status("Deleting extraneous entries...");
                let report = ParallelDelete::new(PathBuf::from(&self.config.dest), delete_config)
                    .with_shutdown_flag(self.shutdown_flag())
                    .run(&delete_list)?;
                self.check_shutdown()?;
                Some(report)
            }
            None => None,
        };

        status(&format!("Syncing {} shards...", lists.shard_files.len()));
        let sync_report = sync.run(&lists.dir_list, &lists.shard_files)?;

        let duration = start.elapsed();
        info!(
            files = lists.stats.total_items(),
            bytes = parse.bytes,
            elapsed_ms = duration.as_millis() as u64,
            "Job complete"
        );

        Ok(JobResult {
            parse,
            split: lists.stats,
            delete,
            sync: sync_report,
            duration,
        })
    }
}
