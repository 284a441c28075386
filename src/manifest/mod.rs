//! rsync dry-run manifest
//!
//! Turns the itemized output of an rsync dry run into the two list files
//! the rest of the job works from, decoding rsync's `\#ooo` path escapes on
//! the way.

pub mod escape;
pub mod item;
pub mod parser;

pub use escape::{decode_path, encode_path};
pub use item::{ChangeItem, EntryKind, ListEntry, DELETE_CODE, ENTRY_PREFIX_MAX};
pub use parser::{generate_lists, parse_dry_run, parse_line, ParseStats};
