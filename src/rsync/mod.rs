//! rsync subprocess invocation
//!
//! Every phase of a job talks to rsync through the [`SyncTool`] trait, so
//! the dispatcher and the list generator can be driven by a stand-in in
//! tests. [`Rsync`] is the real implementation: it runs the binary with
//! stdin closed, captures stdout and stderr, fails on a non-zero exit and
//! surfaces stderr of a successful run as warnings.

pub mod args;

pub use args::{dir_tree_args, dry_run_args, is_remote, reject_delete_options, shard_args, DRY_RUN_FORMAT};

use crate::error::{ToolError, ToolResult};
use std::ffi::OsString;
use std::process::{Command, Stdio};
use tracing::{debug, warn};

/// Default rsync binary
pub const RSYNC_CMD: &str = "rsync";

/// Captured output of a successful invocation
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    /// Raw standard output
    pub stdout: Vec<u8>,

    /// Standard error (lossy UTF-8)
    pub stderr: String,
}

/// Something that can run one rsync invocation to completion
pub trait SyncTool: Send + Sync {
    /// Program name for logs and errors
    fn name(&self) -> &str;

    /// Run with `args` appended to the base command and wait for exit
    fn run(&self, args: &[OsString]) -> ToolResult<ToolOutput>;
}

/// The rsync binary
#[derive(Debug, Clone)]
pub struct Rsync {
    program: OsString,
    name: String,

    /// Options placed before every argument list. Must not include `-q`,
    /// which would silence the itemized dry-run output.
    base_opts: Vec<OsString>,
}

impl Rsync {
    pub fn new(program: impl Into<OsString>) -> Self {
        let program = program.into();
        let name = program.to_string_lossy().into_owned();
        Self {
            program,
            name,
            base_opts: Vec::new(),
        }
    }

    /// Add options placed before every argument list
    pub fn with_base_opts(mut self, opts: Vec<OsString>) -> Self {
        self.base_opts = opts;
        self
    }
}

impl Default for Rsync {
    fn default() -> Self {
        Self::new(RSYNC_CMD)
    }
}

impl SyncTool for Rsync {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, args: &[OsString]) -> ToolResult<ToolOutput> {
        debug!(program = %self.name, args = ?args, "Calling rsync");

        let output = Command::new(&self.program)
            .args(&self.base_opts)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| ToolError::Spawn {
                program: self.name.clone(),
                reason: e.to_string(),
            })?;

        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            return Err(ToolError::Exit {
                program: self.name.clone(),
                code: output.status.code(),
                stderr,
            });
        }

        if !stderr.is_empty() {
            warn!(program = %self.name, "rsync output found on standard error");
            for line in stderr.lines().filter(|l| !l.is_empty()) {
                warn!("rsync standard error: {}", line);
            }
        }

        Ok(ToolOutput {
            stdout: output.stdout,
            stderr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_failure_is_tool_error() {
        let tool = Rsync::new("/nonexistent/split-rsync-test/rsync");
        match tool.run(&[]) {
            Err(ToolError::Spawn { program, .. }) => {
                assert_eq!(program, "/nonexistent/split-rsync-test/rsync");
            }
            other => panic!("expected spawn error, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_non_zero_exit_carries_stderr() {
        let tool = Rsync::new("sh").with_base_opts(vec!["-c".into()]);
        let err = tool
            .run(&["echo broken >&2; exit 3".into()])
            .unwrap_err();
        match err {
            ToolError::Exit { code, stderr, .. } => {
                assert_eq!(code, Some(3));
                assert_eq!(stderr.trim(), "broken");
            }
            other => panic!("expected exit error, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_stderr_on_success_is_not_fatal() {
        let tool = Rsync::new("sh").with_base_opts(vec!["-c".into()]);
        let out = tool.run(&["printf 'a\\nb'; echo note >&2".into()]).unwrap();
        assert_eq!(out.stdout, b"a\nb");
        assert_eq!(out.stderr.trim(), "note");
    }
}
