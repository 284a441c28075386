//! Progress reporting for split-rsync
//!
//! A spinner shows which phase of the job is running; a header and a
//! summary frame the job on stdout.

use crate::delete::DeleteReport;
use crate::dispatch::SyncReport;
use crate::manifest::ParseStats;
use crate::split::{SplitStats, SplitStrategy};
use console::style;
use humansize::{format_size, BINARY};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Spinner that displays the current phase
pub struct ProgressReporter {
    bar: ProgressBar,
}

impl ProgressReporter {
    /// Create a new progress reporter
    pub fn new() -> Self {
        let bar = ProgressBar::new_spinner();

        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .expect("Invalid progress template")
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
        );

        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// Set a status message
    pub fn set_status(&self, status: &str) {
        self.bar.set_message(status.to_string());
    }

    /// Report the lists produced by the split
    pub fn split_done(&self, parse: &ParseStats, split: &SplitStats) {
        self.bar.set_message(format!(
            "Listed {} files ({}) in {} shards, {} dirs, {} deletions",
            format_number(split.total_items()),
            format_size(parse.bytes, BINARY),
            split.shards.len(),
            format_number(split.directories),
            format_number(parse.deletions),
        ));
    }

    /// Finish the progress display with a final message
    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }

    /// Finish and clear the progress display
    pub fn finish_and_clear(&self) {
        self.bar.finish_and_clear();
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Format a number with thousands separators
pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let bytes: Vec<_> = s.bytes().rev().collect();

    let chunks: Vec<String> = bytes
        .chunks(3)
        .map(|chunk| chunk.iter().rev().map(|&b| b as char).collect::<String>())
        .collect();

    chunks.into_iter().rev().collect::<Vec<_>>().join(",")
}

/// Everything the summary reports on
pub struct JobSummary<'a> {
    pub parse: &'a ParseStats,
    pub split: &'a SplitStats,
    pub delete: Option<&'a DeleteReport>,
    pub sync: &'a SyncReport,
    pub duration: Duration,
}

/// Print a summary of the job
pub fn print_summary(summary: &JobSummary<'_>) {
    let duration_secs = summary.duration.as_secs_f64();
    let rate = if duration_secs > 0.0 {
        summary.parse.bytes as f64 / duration_secs
    } else {
        0.0
    };

    println!();
    println!("{}", style("Sync Complete").green().bold());
    println!("{}", style("─".repeat(50)).dim());
    println!(
        "  {} {}",
        style("Directories:").bold(),
        format_number(summary.split.directories)
    );
    println!(
        "  {} {}",
        style("Files:").bold(),
        format_number(summary.split.total_items())
    );
    println!(
        "  {} {}",
        style("Total Size:").bold(),
        format_size(summary.parse.bytes, BINARY)
    );

    for (i, shard) in summary.split.shards.iter().enumerate() {
        let took = summary
            .sync
            .shard_elapsed
            .get(i)
            .map(Duration::as_secs_f64)
            .unwrap_or(0.0);
        println!(
            "    {} {:>12} files {:>12} {:>8.1}s",
            style(format!("shard {:>3}:", i)).dim(),
            format_number(shard.items),
            format_size(shard.bytes, BINARY),
            took
        );
    }

    if let Some(delete) = summary.delete {
        println!(
            "  {} {} files, {} dirs ({} already gone)",
            style("Deleted:").bold(),
            format_number(delete.files_removed),
            format_number(delete.dirs_removed),
            format_number(delete.missing)
        );
    }

    println!(
        "  {} {:.1}s ({}/sec)",
        style("Duration:").bold(),
        duration_secs,
        format_size(rate as u64, BINARY)
    );

    let skipped = summary.parse.malformed + summary.split.malformed;
    if skipped > 0 {
        println!(
            "  {} {}",
            style("Skipped lines:").yellow().bold(),
            format_number(skipped)
        );
    }
    println!();
}

/// Print a header at the start of the job
pub fn print_header(source: &str, dest: &str, shards: usize, strategy: SplitStrategy, delete: bool) {
    println!();
    println!(
        "{} {}",
        style("split-rsync").cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!("{}", style("─".repeat(50)).dim());
    println!("  {} {}", style("Source:").bold(), source);
    println!("  {} {}", style("Destination:").bold(), dest);
    println!("  {} {} ({})", style("Processes:").bold(), shards, strategy);
    if delete {
        println!("  {} parallel", style("Delete:").bold());
    }
    println!();
}
