//! Argument lists for each kind of rsync invocation

use crate::error::{Result, SyncError};
use std::ffi::{OsStr, OsString};
use std::path::Path;

/// Itemized output format parsed by the manifest parser
pub const DRY_RUN_FORMAT: &str = "--out-format=%i %l %n";

/// Filter rules letting only directories through
const DIR_ONLY_FILTERS: [&str; 2] = ["-f+ */", "-f- *"];

/// Reject any delete option.
///
/// Shards running `--delete` concurrently would each delete what the others
/// are about to transfer; removals are done from the deletion manifest
/// instead.
pub fn reject_delete_options(opts: &[OsString]) -> Result<()> {
    if let Some(opt) = opts.iter().find(|o| is_delete_option(o)) {
        return Err(SyncError::ForbiddenOption {
            option: opt.to_string_lossy().into_owned(),
        });
    }
    Ok(())
}

fn is_delete_option(opt: &OsStr) -> bool {
    let opt = opt.as_encoded_bytes();
    opt == b"--delete" || opt == b"--del" || opt.starts_with(b"--delete-")
}

/// Whether an rsync endpoint names a remote location
/// (`host:path`, `user@host:path`, `host::module`, `rsync://...`)
pub fn is_remote(endpoint: &OsStr) -> bool {
    let bytes = endpoint.as_encoded_bytes();
    if bytes.starts_with(b"rsync://") {
        return true;
    }
    // A colon counts only before the first slash; `./a:b` is local
    match bytes.iter().position(|&b| b == b':' || b == b'/') {
        Some(i) => bytes[i] == b':' && i > 0,
        None => false,
    }
}

fn files_from(list: &Path) -> OsString {
    let mut arg = OsString::from("--files-from=");
    arg.push(list.as_os_str());
    arg
}

fn with_endpoints(mut args: Vec<OsString>, source: &OsStr, dest: &OsStr) -> Vec<OsString> {
    args.push(source.to_os_string());
    args.push(dest.to_os_string());
    args
}

/// `<opts> --dry-run --out-format=%i %l %n <source> <dest>`
pub fn dry_run_args(opts: &[OsString], source: &OsStr, dest: &OsStr) -> Vec<OsString> {
    let mut args = opts.to_vec();
    args.push("--dry-run".into());
    args.push(DRY_RUN_FORMAT.into());
    with_endpoints(args, source, dest)
}

/// `-f+ */ -f- * <opts> --files-from=<dir list> --from0 <source> <dest>`
pub fn dir_tree_args(opts: &[OsString], dir_list: &Path, source: &OsStr, dest: &OsStr) -> Vec<OsString> {
    let mut args: Vec<OsString> = DIR_ONLY_FILTERS.iter().map(OsString::from).collect();
    args.extend(opts.iter().cloned());
    args.push(files_from(dir_list));
    args.push("--from0".into());
    with_endpoints(args, source, dest)
}

/// `<opts> --files-from=<shard list> --from0 <source> <dest>`
pub fn shard_args(opts: &[OsString], shard_list: &Path, source: &OsStr, dest: &OsStr) -> Vec<OsString> {
    let mut args = opts.to_vec();
    args.push(files_from(shard_list));
    args.push("--from0".into());
    with_endpoints(args, source, dest)
}
