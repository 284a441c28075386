//! Balanced partitioning of the item list into shards
//!
//! Directories are never split: they all go to one directory list that is
//! synced before any shard starts. Every other entry is assigned to one
//! shard by a [`ShardPicker`], either cyclically or greedily by weighted
//! size.

pub mod partition;
pub mod strategy;

pub use partition::{
    dir_list_path, partition, shard_list_path, split_and_dump, ShardAssignment, ShardStats, SplitLists,
    SplitStats,
};
pub use strategy::{picker_for, LeastLoaded, RoundRobin, ShardPicker, SplitStrategy, DEFAULT_SIZE_FLOOR};

use crate::list::CodecConfig;

/// Settings for one split
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitConfig {
    /// Number of shards (at least 1)
    pub shards: usize,

    pub strategy: SplitStrategy,

    /// Minimum weight of a single entry
    pub size_floor: u64,

    /// Buffering and corruption limits for the lists
    pub codec: CodecConfig,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            shards: 1,
            strategy: SplitStrategy::default(),
            size_floor: DEFAULT_SIZE_FLOOR,
            codec: CodecConfig::default(),
        }
    }
}
