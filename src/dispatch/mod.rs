//! Parallel rsync dispatch
//!
//! A job is synced in two phases:
//!
//! ```text
//!   ┌───────────────────────────────┐
//!   │ Directory-tree phase (1 call) │  -f+ */ -f- * --files-from=list-dir
//!   └───────────────┬───────────────┘
//!                   │ must succeed first
//!      ┌────────────┼─────────────┐
//!  ┌───▼───┐    ┌───▼───┐     ┌───▼───┐
//!  │shard 0│    │shard 1│ ... │shard N│   --files-from=list-i, concurrent
//!  └───┬───┘    └───┬───┘     └───┬───┘
//!      └────────────┼─────────────┘
//!                   ▼
//!        every shard settles, failures
//!        are collected and reported
//! ```
//!
//! Creating every directory before any shard starts means no shard ever
//! writes into a parent that does not exist yet. A failing shard does not
//! cancel its siblings.

use crate::error::{Result, SyncError, ToolError};
use crate::pool::{gather, WorkerPool, JOIN_TIMEOUT};
use crate::rsync::{dir_tree_args, reject_delete_options, shard_args, SyncTool};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Timings of a completed sync
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    /// Wall time of the directory-tree phase
    pub dir_tree_elapsed: Duration,

    /// Wall time of each shard, index order
    pub shard_elapsed: Vec<Duration>,

    /// Wall time of the whole shard phase
    pub shard_phase_elapsed: Duration,
}

/// Runs the two sync phases for one source/destination pair
pub struct ParallelSync {
    tool: Arc<dyn SyncTool>,
    rsync_opts: Arc<[OsString]>,
    source: OsString,
    dest: OsString,
    shutdown: Option<Arc<AtomicBool>>,
    timeout: Duration,
}

impl ParallelSync {
    /// Fails with [`SyncError::ForbiddenOption`] if `rsync_opts` contains a
    /// delete option; nothing has been run at that point.
    pub fn new(
        tool: Arc<dyn SyncTool>,
        rsync_opts: Vec<OsString>,
        source: impl Into<OsString>,
        dest: impl Into<OsString>,
    ) -> Result<Self> {
        reject_delete_options(&rsync_opts)?;

        Ok(Self {
            tool,
            rsync_opts: rsync_opts.into(),
            source: source.into(),
            dest: dest.into(),
            shutdown: None,
            timeout: JOIN_TIMEOUT,
        })
    }

    /// Do not start the shard phase once `flag` is set
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown = Some(flag);
        self
    }

    /// Per-shard wait limit
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

    /// Run the directory-tree phase, then every shard concurrently
    pub fn run(&self, dir_list: &Path, shard_files: &[PathBuf]) -> Result<SyncReport> {
        let dir_tree_elapsed = self.sync_dir_tree(dir_list)?;

        if self.is_shutdown() {
            info!("Shutdown requested, not starting shard phase");
            return Err(SyncError::Interrupted);
        }

        let start = Instant::now();
        let shard_elapsed = self.sync_shards(shard_files)?;

        Ok(SyncReport {
            dir_tree_elapsed,
            shard_elapsed,
            shard_phase_elapsed: start.elapsed(),
        })
    }

    /// Create the destination directory skeleton from the directory list
    pub fn sync_dir_tree(&self, dir_list: &Path) -> Result<Duration> {
        let args = dir_tree_args(&self.rsync_opts, dir_list, &self.source, &self.dest);
        info!("Syncing directory tree");
        debug!(args = ?args, "Directory-tree arguments");

        let start = Instant::now();
        self.tool.run(&args)?;
        let elapsed = start.elapsed();

        info!(elapsed_ms = elapsed.as_millis() as u64, "Directory tree synced");
        Ok(elapsed)
    }

    /// Sync every shard list concurrently, one invocation each.
    ///
    /// Waits for all of them; the lowest-index failure is returned after
    /// every failure has been logged.
    pub fn sync_shards(&self, shard_files: &[PathBuf]) -> Result<Vec<Duration>> {
        let count = shard_files.len();
        if count == 0 {
            return Ok(Vec::new());
        }

        let mut pool = WorkerPool::new("shard", count, count)?;
        info!(shards = count, "Starting shard phase");

        let mut handles = Vec::with_capacity(count);
        for (shard, list) in shard_files.iter().enumerate() {
            let tool = Arc::clone(&self.tool);
            let args = shard_args(&self.rsync_opts, list, &self.source, &self.dest);
            debug!(shard = shard, args = ?args, "Queueing shard");

            handles.push(pool.submit(move || {
                let start = Instant::now();
                tool.run(&args).map(|_| start.elapsed())
            })?);
        }

        let outcomes = gather(handles, self.timeout);
        pool.finish(&outcomes)?;

        let mut elapsed = Vec::with_capacity(count);
        let mut first_error: Option<SyncError> = None;

        for (shard, outcome) in outcomes.into_iter().enumerate() {
            match outcome {
                Ok(Ok(took)) => {
                    debug!(shard = shard, elapsed_ms = took.as_millis() as u64, "Shard finished");
                    elapsed.push(took);
                }
                Ok(Err(e)) => {
                    error!(shard = shard, error = %e, "Shard failed");
                    elapsed.push(Duration::ZERO);
                    first_error.get_or_insert_with(|| shard_failed(shard, e));
                }
                Err(e) => {
                    error!(shard = shard, error = %e, "Shard did not complete");
                    elapsed.push(Duration::ZERO);
                    first_error.get_or_insert(e.into());
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => {
                info!(shards = count, "All shards synced");
                Ok(elapsed)
            }
        }
    }
}

fn shard_failed(shard: usize, source: ToolError) -> SyncError {
    SyncError::ShardFailed { shard, source }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::{ToolResult, WorkerError};
    use crate::rsync::ToolOutput;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    /// Records every invocation; fails any whose arguments mention `fail_on`
    #[derive(Default)]
    pub(crate) struct CountingTool {
        pub calls: AtomicUsize,
        pub invocations: Mutex<Vec<Vec<OsString>>>,
        pub fail_on: Option<String>,
    }

    impl CountingTool {
        pub fn failing_on(needle: &str) -> Self {
            Self {
                fail_on: Some(needle.to_string()),
                ..Default::default()
            }
        }

        pub fn invocations(&self) -> Vec<Vec<OsString>> {
            self.invocations.lock().unwrap().clone()
        }
    }

    impl SyncTool for CountingTool {
        fn name(&self) -> &str {
            "fake-rsync"
        }

        fn run(&self, args: &[OsString]) -> ToolResult<ToolOutput> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.invocations.lock().unwrap().push(args.to_vec());

            let fails = self
                .fail_on
                .as_ref()
                .map(|needle| args.iter().any(|a| a.to_string_lossy().contains(needle.as_str())))
                .unwrap_or(false);

            if fails {
                return Err(ToolError::Exit {
                    program: "fake-rsync".into(),
                    code: Some(23),
                    stderr: "some files could not be transferred".into(),
                });
            }
            Ok(ToolOutput::default())
        }
    }

    fn lists(n: usize) -> (PathBuf, Vec<PathBuf>) {
        let dir = PathBuf::from("/tmp/job");
        let shards = (0..n).map(|i| dir.join(format!("list-{}", i))).collect();
        (dir.join("list-dir"), shards)
    }

    #[test]
    fn test_forbidden_option_runs_nothing() {
        let tool = Arc::new(CountingTool::default());

        for opt in ["--delete", "--delete-during", "--del"] {
            let result = ParallelSync::new(tool.clone(), vec!["-a".into(), opt.into()], "src/", "dst/");
            assert!(matches!(result, Err(SyncError::ForbiddenOption { .. })));
        }

        assert_eq!(tool.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_dir_tree_runs_before_shards() {
        let tool = Arc::new(CountingTool::default());
        let sync = ParallelSync::new(tool.clone(), vec!["-a".into()], "src/", "dst/").unwrap();
        let (dir_list, shards) = lists(4);

        let report = sync.run(&dir_list, &shards).unwrap();
        assert_eq!(report.shard_elapsed.len(), 4);

        let calls = tool.invocations();
        assert_eq!(calls.len(), 5);
        assert_eq!(calls[0][0], "-f+ */");
        assert!(calls[0].contains(&OsString::from("--files-from=/tmp/job/list-dir")));

        let mut shard_lists: Vec<_> = calls[1..]
            .iter()
            .map(|args| args[1].to_string_lossy().into_owned())
            .collect();
        shard_lists.sort();
        assert_eq!(
            shard_lists,
            (0..4)
                .map(|i| format!("--files-from=/tmp/job/list-{}", i))
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_shard_failure_is_surfaced_and_siblings_run() {
        let tool = Arc::new(CountingTool::failing_on("list-2"));
        let sync = ParallelSync::new(tool.clone(), vec!["-a".into()], "src/", "dst/").unwrap();
        let (dir_list, shards) = lists(4);

        match sync.run(&dir_list, &shards) {
            Err(SyncError::ShardFailed { shard, source }) => {
                assert_eq!(shard, 2);
                assert!(source.stderr().is_some());
            }
            other => panic!("expected shard failure, got {:?}", other),
        }
        assert_eq!(tool.calls.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn test_dir_tree_failure_stops_before_shards() {
        let tool = Arc::new(CountingTool::failing_on("list-dir"));
        let sync = ParallelSync::new(tool.clone(), vec![], "src/", "dst/").unwrap();
        let (dir_list, shards) = lists(3);

        assert!(matches!(sync.run(&dir_list, &shards), Err(SyncError::Tool(_))));
        assert_eq!(tool.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_shutdown_skips_shard_phase() {
        let tool = Arc::new(CountingTool::default());
        let sync = ParallelSync::new(tool.clone(), vec![], "src/", "dst/")
            .unwrap()
            .with_shutdown_flag(Arc::new(AtomicBool::new(true)));
        let (dir_list, shards) = lists(2);

        assert!(matches!(sync.run(&dir_list, &shards), Err(SyncError::Interrupted)));
        assert_eq!(tool.calls.load(Ordering::SeqCst), 1);
    }

    /// Blocks for `delay` on any invocation mentioning `hang_on`
    struct HangingTool {
        hang_on: &'static str,
        delay: Duration,
    }

    impl SyncTool for HangingTool {
        fn name(&self) -> &str {
            "hanging-rsync"
        }

        fn run(&self, args: &[OsString]) -> ToolResult<ToolOutput> {
            if args.iter().any(|a| a.to_string_lossy().contains(self.hang_on)) {
                std::thread::sleep(self.delay);
            }
            Ok(ToolOutput::default())
        }
    }

    #[test]
    fn test_hung_shard_times_out_without_blocking() {
        let tool = Arc::new(HangingTool {
            hang_on: "list-0",
            delay: Duration::from_secs(4),
        });
        let sync = ParallelSync::new(tool, vec![], "src/", "dst/")
            .unwrap()
            .with_timeout(Duration::from_millis(50));
        let (_, shards) = lists(3);

        let start = Instant::now();
        let result = sync.sync_shards(&shards);

        assert!(matches!(
            result,
            Err(SyncError::Worker(WorkerError::TimedOut { task: 0, .. }))
        ));
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn test_no_shards() {
        let tool = Arc::new(CountingTool::default());
        let sync = ParallelSync::new(tool, vec![], "src/", "dst/").unwrap();
        assert!(sync.sync_shards(&[]).unwrap().is_empty());
    }
}
