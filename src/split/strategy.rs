//! Shard selection strategies

use clap::ValueEnum;
use std::fmt;

/// Default weight floor for tiny and metadata-only changes
pub const DEFAULT_SIZE_FLOOR: u64 = 4096;

/// How files are spread over shards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum SplitStrategy {
    /// Cycle through the shards, ignoring sizes
    RoundRobin,

    /// Give each file to the shard with the fewest weighted bytes so far
    #[default]
    #[value(name = "size")]
    LeastLoaded,
}

impl fmt::Display for SplitStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SplitStrategy::RoundRobin => write!(f, "round-robin"),
            SplitStrategy::LeastLoaded => write!(f, "size"),
        }
    }
}

/// Chooses the shard for each file, one call per file in arrival order
pub trait ShardPicker: Send {
    /// Number of shards
    fn shards(&self) -> usize;

    /// Shard for a file of `size` bytes
    fn pick(&mut self, size: u64) -> usize;
}

/// Fixed cyclic assignment
#[derive(Debug, Clone)]
pub struct RoundRobin {
    shards: usize,
    next_index: usize,
}

impl RoundRobin {
    pub fn new(shards: usize) -> Self {
        Self {
            shards: shards.max(1),
            next_index: 0,
        }
    }
}

impl ShardPicker for RoundRobin {
    fn shards(&self) -> usize {
        self.shards
    }

    fn pick(&mut self, _size: u64) -> usize {
        let shard = self.next_index;
        self.next_index = (self.next_index + 1) % self.shards;
        shard
    }
}

/// Greedy least-loaded assignment.
///
/// Ties go to the lowest shard index. Each file weighs at least `floor`
/// bytes, so a flood of empty files still spreads evenly.
#[derive(Debug, Clone)]
pub struct LeastLoaded {
    loads: Vec<u64>,
    floor: u64,
}

impl LeastLoaded {
    pub fn new(shards: usize, floor: u64) -> Self {
        Self {
            loads: vec![0; shards.max(1)],
            floor,
        }
    }

    /// Weighted bytes assigned to each shard so far
    pub fn loads(&self) -> &[u64] {
        &self.loads
    }
}

impl ShardPicker for LeastLoaded {
    fn shards(&self) -> usize {
        self.loads.len()
    }

    fn pick(&mut self, size: u64) -> usize {
        // min_by_key keeps the first minimum, which is the lowest index
        let (shard, _) = self
            .loads
            .iter()
            .enumerate()
            .min_by_key(|(_, load)| **load)
            .unwrap_or((0, &0));

        self.loads[shard] = self.loads[shard].saturating_add(size.max(self.floor));
        shard
    }
}

/// Build the picker for a strategy
pub fn picker_for(strategy: SplitStrategy, shards: usize, floor: u64) -> Box<dyn ShardPicker> {
    match strategy {
        SplitStrategy::RoundRobin => Box::new(RoundRobin::new(shards)),
        SplitStrategy::LeastLoaded => Box::new(LeastLoaded::new(shards, floor)),
    }
}
