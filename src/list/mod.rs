//! NUL-delimited list files
//!
//! Every list handed between the phases of a job (the full item list, the
//! deletion manifest, the shard lists and the directory list) is a plain
//! sequence of separator-terminated byte records. Paths are never assumed
//! to be valid UTF-8.
//!
//! # Reading
//!
//! [`RecordReader`] pulls fixed-size chunks from the file and yields one
//! record at a time, carrying a partial record across chunk boundaries.
//! A record longer than [`CodecConfig::max_record_len`] aborts the read
//! with [`ListError::Corrupt`], wherever the chunk boundaries fall, so a
//! file written with the wrong separator cannot make the reader buffer it
//! whole.
//!
//! # Writing
//!
//! [`RecordWriter`] appends separator-terminated records through a buffered
//! writer; [`dump_records`] writes a whole sequence to a fresh file.
//!
//! [`ListError::Corrupt`]: crate::error::ListError::Corrupt

pub mod reader;
pub mod writer;

pub use reader::{stream_records, RecordReader};
pub use writer::{dump_records, RecordWriter};

/// Record separator used for every internally produced list
pub const NUL: u8 = b'\0';

/// Default read chunk size (128 KiB)
pub const DEFAULT_BUFFER_SIZE: usize = 128 * 1024;

/// Longest record accepted before a list is considered corrupt
pub const SANE_PATH_LEN: usize = 4096;

/// Buffering and corruption limits for list I/O
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecConfig {
    /// Size of each read chunk (and of the write buffer)
    pub buffer_size: usize,

    /// Longest record accepted
    pub max_record_len: usize,
}

impl CodecConfig {
    /// Same limits, for records carrying `overhead` bytes besides the path
    pub fn with_record_overhead(self, overhead: usize) -> Self {
        Self {
            max_record_len: self.max_record_len.saturating_add(overhead),
            ..self
        }
    }
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            max_record_len: SANE_PATH_LEN,
        }
    }
}
