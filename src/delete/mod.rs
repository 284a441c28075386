//! Parallel deletion of extraneous destination entries
//!
//! The deletion manifest is streamed, never loaded whole: paths are
//! grouped into batches that worker threads remove concurrently.
//! Directories found along the way are set aside and removed afterwards
//! from a single thread.

pub mod batch;
pub mod coordinator;

pub use batch::{DeletionBatcher, DEFAULT_BATCH_SIZE};
pub use coordinator::{remove_batch, BatchOutcome, DeleteReport, ParallelDelete};

use crate::list::CodecConfig;

/// Settings for a deletion run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteConfig {
    /// Worker threads removing files
    pub workers: usize,

    /// Paths per batch
    pub batch_size: usize,

    /// Buffering and corruption limits for the manifest
    pub codec: CodecConfig,
}

impl Default for DeleteConfig {
    fn default() -> Self {
        Self {
            workers: num_cpus::get(),
            batch_size: DEFAULT_BATCH_SIZE,
            codec: CodecConfig::default(),
        }
    }
}
