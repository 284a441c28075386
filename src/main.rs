//! split-rsync - Parallel rsync by balanced file-list sharding
//!
//! Entry point for the CLI application.

use anyhow::{Context, Result};
use clap::Parser;
use split_rsync::config::{CliArgs, JobConfig};
use split_rsync::progress::{print_header, print_summary, JobSummary, ProgressReporter};
use split_rsync::rsync::Rsync;
use split_rsync::SyncJob;
use std::process::ExitCode;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Prefix of the per-job scratch directory
const SCRATCH_PREFIX: &str = "splitrsync_";

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    // Parse CLI arguments
    let args = CliArgs::parse();

    // Setup logging
    setup_logging(args.verbose)?;

    // Validate and create config
    let config = JobConfig::from_args(args).context("Invalid configuration")?;

    if config.show_progress {
        print_header(
            &config.source.to_string_lossy(),
            &config.dest.to_string_lossy(),
            config.split.shards,
            config.split.strategy,
            config.delete.is_some(),
        );
    }

    // Scratch directory for every list of this job
    let mut builder = tempfile::Builder::new();
    builder.prefix(SCRATCH_PREFIX);
    let scratch = match config.tmpdir {
        Some(ref parent) => builder.tempdir_in(parent),
        None => builder.tempdir(),
    }
    .context("Failed to create scratch directory")?;

    let tool = Rsync::new(config.rsync_program.clone());
    let keep_lists = config.keep_lists;
    let show_progress = config.show_progress;
    let job = SyncJob::new(config, Arc::new(tool));

    // Setup signal handler for graceful shutdown
    let shutdown_flag = job.shutdown_flag();
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupt received, finishing running rsyncs...");
        shutdown_flag.store(true, Ordering::SeqCst);
    })
    .context("Failed to set signal handler")?;

    let progress = if show_progress {
        Some(ProgressReporter::new())
    } else {
        None
    };

    let result = job.run(scratch.path(), progress.as_ref());

    if keep_lists {
        let kept = scratch.into_path();
        info!(dir = %kept.display(), "Keeping list files");
    }

    let result = match result {
        Ok(result) => result,
        Err(e) => {
            if let Some(ref p) = progress {
                p.finish("Sync failed");
            }
            return Err(e).context("Sync failed");
        }
    };

    if let Some(ref p) = progress {
        p.finish_and_clear();
    }

    if show_progress {
        print_summary(&JobSummary {
            parse: &result.parse,
            split: &result.split,
            delete: result.delete.as_ref(),
            sync: &result.sync,
            duration: result.duration,
        });
    }

    Ok(())
}

fn setup_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("split_rsync=debug,warn")
    } else {
        EnvFilter::new("split_rsync=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}
