//! Change items and full-list records

use crate::error::{ListResult, MalformedRecord};
use crate::list::RecordWriter;

/// Change code rsync reports for an entry that would be removed
pub const DELETE_CODE: &str = "*deleting";

/// Entry-type symbol for files in the full item list
pub const FILE_SYMBOL: &[u8] = b"F";

/// Entry-type symbol for directories in the full item list
pub const DIRECTORY_SYMBOL: &[u8] = b"D";

/// Longest `<symbol> <size> ` prefix in front of a path in the item list
pub const ENTRY_PREFIX_MAX: usize = 1 + 1 + 20 + 1;

/// Type of a listed entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    /// Anything rsync transfers as a non-directory (files, links, devices)
    File,
    /// Directory
    Directory,
}

impl EntryKind {
    /// Symbol written to the full item list
    pub fn symbol(&self) -> &'static [u8] {
        match self {
            EntryKind::File => FILE_SYMBOL,
            EntryKind::Directory => DIRECTORY_SYMBOL,
        }
    }

    /// Parse a list symbol
    pub fn from_symbol(symbol: &[u8]) -> Option<Self> {
        match symbol {
            FILE_SYMBOL => Some(EntryKind::File),
            DIRECTORY_SYMBOL => Some(EntryKind::Directory),
            _ => None,
        }
    }

    /// Check if this is a directory
    pub fn is_dir(&self) -> bool {
        *self == EntryKind::Directory
    }
}

/// One entry reported by an rsync dry run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeItem {
    /// Itemized change code (`>f+++++++++`, `cd+++++++++`, `*deleting`, ...)
    pub change_code: String,

    /// Transfer size in bytes
    pub size: u64,

    /// Relative path with rsync escapes already decoded
    pub path: Vec<u8>,
}

impl ChangeItem {
    pub fn new(change_code: impl Into<String>, size: u64, path: impl Into<Vec<u8>>) -> Self {
        Self {
            change_code: change_code.into(),
            size,
            path: path.into(),
        }
    }

    /// Entry would be removed from the destination
    pub fn is_deletion(&self) -> bool {
        self.change_code == DELETE_CODE
    }

    /// The second character of the change code is the file type
    pub fn is_directory(&self) -> bool {
        self.change_code.as_bytes().get(1) == Some(&b'd')
    }

    /// Anything but a `*` control line; a `.` update may still carry
    /// attribute changes, which must be synced too
    pub fn is_content_update(&self) -> bool {
        !self.change_code.starts_with('*')
    }

    pub fn kind(&self) -> EntryKind {
        if self.is_directory() {
            EntryKind::Directory
        } else {
            EntryKind::File
        }
    }

    /// Full-list form of this item, `None` for deletions
    pub fn list_entry(&self) -> Option<ListEntry> {
        if self.is_deletion() {
            return None;
        }
        Some(ListEntry {
            kind: self.kind(),
            size: self.size,
            path: self.path.clone(),
        })
    }
}

/// A record of the full item list: `<F|D> <size> <path>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListEntry {
    pub kind: EntryKind,
    pub size: u64,
    pub path: Vec<u8>,
}

impl ListEntry {
    pub fn new(kind: EntryKind, size: u64, path: impl Into<Vec<u8>>) -> Self {
        Self {
            kind,
            size,
            path: path.into(),
        }
    }

    /// Parse one full-list record
    pub fn parse(record: &[u8]) -> Result<Self, MalformedRecord> {
        let mut fields = record.splitn(3, |&b| b == b' ');

        let (symbol, size, path) = match (fields.next(), fields.next(), fields.next()) {
            (Some(symbol), Some(size), Some(path)) => (symbol, size, path),
            _ => return Err(MalformedRecord::new(record, "Input file list contains malformed line")),
        };

        let kind = EntryKind::from_symbol(symbol)
            .ok_or_else(|| MalformedRecord::new(record, "Unknown entry type in file list"))?;

        let size = std::str::from_utf8(size)
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .ok_or_else(|| MalformedRecord::new(record, "Invalid integer found for size in file list"))?;

        Ok(Self {
            kind,
            size,
            path: path.to_vec(),
        })
    }

    /// Append this entry to a full item list
    pub fn write_to(&self, writer: &mut RecordWriter) -> ListResult<()> {
        let size = self.size.to_string();
        let parts: [&[u8]; 5] = [self.kind.symbol(), b" ", size.as_bytes(), b" ", &self.path];
        writer.write_parts(&parts)
    }

    /// Size used for load balancing: never below `floor`
    pub fn weighted_size(&self, floor: u64) -> u64 {
        self.size.max(floor)
    }
}
