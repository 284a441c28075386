//! Dry-run output parsing
//!
//! rsync is run once with `--dry-run --out-format=%i %l %n`, which prints
//! one `<change code> <size> <path>` line per entry. Each line is split
//! straight into one of two list files while parsing:
//!
//! - the full item list, records `<F|D> <size> <path>`
//! - the deletion manifest, records `<path>`
//!
//! Lines that do not match the grammar are logged and skipped.

use crate::error::{ListResult, MalformedRecord, Result};
use crate::list::{RecordWriter, NUL};
use crate::manifest::escape::decode_path;
use crate::manifest::item::ChangeItem;
use crate::rsync::{self, SyncTool};
use regex::bytes::Regex;
use std::ffi::{OsStr, OsString};
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, info, warn};

/// Regex for one itemized dry-run line
static LINE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    // (?-u): the path is raw bytes, `.` must match any of them
    Regex::new(r"(?-u)^([\w.*<>+]+) +(\d+) (.*)$").expect("Invalid dry-run line regex")
});

/// Counters collected while parsing a dry run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseStats {
    /// Non-directory entries written to the item list
    pub files: u64,

    /// Directory entries written to the item list
    pub directories: u64,

    /// Paths written to the deletion manifest
    pub deletions: u64,

    /// Sum of reported sizes of non-directory entries
    pub bytes: u64,

    /// Lines skipped because they did not match the grammar
    pub malformed: u64,
}

/// Parse one dry-run line into a change item
pub fn parse_line(line: &[u8]) -> std::result::Result<ChangeItem, MalformedRecord> {
    let caps = LINE_REGEX
        .captures(line)
        .ok_or_else(|| MalformedRecord::new(line, "unrecognized rsync output line"))?;

    // Both groups are ASCII by construction
    let change_code = String::from_utf8_lossy(&caps[1]).into_owned();
    let size = std::str::from_utf8(&caps[2])
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .ok_or_else(|| MalformedRecord::new(line, "size out of range in rsync output line"))?;
    let path = decode_path(&caps[3]).into_owned();

    Ok(ChangeItem {
        change_code,
        size,
        path,
    })
}

/// Split captured dry-run output into the item list and deletion manifest
pub fn parse_dry_run(
    output: &[u8],
    items: &mut RecordWriter,
    deletions: &mut RecordWriter,
) -> ListResult<ParseStats> {
    let mut stats = ParseStats::default();

    for line in output.split(|&b| b == b'\n') {
        if line.is_empty() {
            continue;
        }

        let item = match parse_line(line) {
            Ok(item) => item,
            Err(e) => {
                warn!(error = %e, "Skipping dry-run line");
                stats.malformed += 1;
                continue;
            }
        };

        match item.list_entry() {
            None => {
                deletions.write_record(&item.path)?;
                stats.deletions += 1;
            }
            Some(entry) => {
                entry.write_to(items)?;
                if entry.kind.is_dir() {
                    stats.directories += 1;
                } else {
                    stats.files += 1;
                    stats.bytes = stats.bytes.saturating_add(entry.size);
                }
            }
        }
    }

    Ok(stats)
}

/// Run the dry run and write both lists.
///
/// `rsync_opts` are forwarded as given; they may include a delete option,
/// which only makes rsync report deletions here.
pub fn generate_lists(
    tool: &dyn SyncTool,
    rsync_opts: &[OsString],
    source: &OsStr,
    dest: &OsStr,
    list_path: &Path,
    delete_path: &Path,
    buffer_size: usize,
) -> Result<ParseStats> {
    let args = rsync::dry_run_args(rsync_opts, source, dest);
    info!("Generating file list with an rsync dry run");
    debug!(args = ?args, "Dry-run arguments");

    let output = tool.run(&args)?;

    let mut items = RecordWriter::create(list_path, NUL, buffer_size)?;
    let mut deletions = RecordWriter::create(delete_path, NUL, buffer_size)?;

    let stats = parse_dry_run(&output.stdout, &mut items, &mut deletions)?;

    items.finish()?;
    deletions.finish()?;

    info!(
        files = stats.files,
        dirs = stats.directories,
        deletions = stats.deletions,
        bytes = stats.bytes,
        malformed = stats.malformed,
        "File list generated"
    );

    Ok(stats)
}
