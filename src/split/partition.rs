//! Assigning list entries to shards
//!
//! [`split_and_dump`] is the production path: a single pass over the full
//! item list that writes every entry straight to its shard file, so memory
//! use does not grow with the number of entries. [`partition`] runs the
//! same assignment in memory.

use crate::error::{ListResult, Result};
use crate::list::{RecordReader, RecordWriter, NUL};
use crate::manifest::{ListEntry, ENTRY_PREFIX_MAX};
use crate::split::strategy::{picker_for, ShardPicker};
use crate::split::SplitConfig;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// File name of the directory list inside the job directory
pub const DIR_LIST_NAME: &str = "list-dir";

/// Path of shard `index`'s list inside `dir`
pub fn shard_list_path(dir: &Path, index: usize) -> PathBuf {
    dir.join(format!("list-{}", index))
}

/// Path of the directory list inside `dir`
pub fn dir_list_path(dir: &Path) -> PathBuf {
    dir.join(DIR_LIST_NAME)
}

/// Entries assigned to each shard plus the unsplit directory list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShardAssignment {
    /// Non-directory entries per shard, in arrival order
    pub shards: Vec<Vec<ListEntry>>,

    /// Directory entries, in arrival order
    pub directories: Vec<ListEntry>,
}

/// Partition entries in memory
pub fn partition<I>(entries: I, picker: &mut dyn ShardPicker) -> ShardAssignment
where
    I: IntoIterator<Item = ListEntry>,
{
    let mut assignment = ShardAssignment {
        shards: vec![Vec::new(); picker.shards()],
        directories: Vec::new(),
    };

    for entry in entries {
        if entry.kind.is_dir() {
            assignment.directories.push(entry);
        } else {
            let shard = picker.pick(entry.size);
            assignment.shards[shard].push(entry);
        }
    }

    assignment
}

/// Totals for one shard
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShardStats {
    /// Entries assigned
    pub items: u64,

    /// Reported bytes of those entries
    pub bytes: u64,

    /// Weighted bytes (each entry floored at the size floor)
    pub weighted_bytes: u64,
}

/// Totals for a whole split
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SplitStats {
    pub shards: Vec<ShardStats>,
    pub directories: u64,
    pub malformed: u64,
}

impl SplitStats {
    /// Entries over all shards
    pub fn total_items(&self) -> u64 {
        self.shards.iter().map(|s| s.items).sum()
    }

    /// Reported bytes over all shards
    pub fn total_bytes(&self) -> u64 {
        self.shards.iter().map(|s| s.bytes).sum()
    }

    /// Difference between the heaviest and lightest shard, in weighted bytes
    pub fn imbalance(&self) -> u64 {
        let max = self.shards.iter().map(|s| s.weighted_bytes).max().unwrap_or(0);
        let min = self.shards.iter().map(|s| s.weighted_bytes).min().unwrap_or(0);
        max - min
    }
}

/// The list files produced by a split
#[derive(Debug, Clone)]
pub struct SplitLists {
    /// One path list per shard, index order
    pub shard_files: Vec<PathBuf>,

    /// Directory path list
    pub dir_list: PathBuf,

    pub stats: SplitStats,
}

/// Stream the full item list and write one path list per shard plus the
/// directory list into `out_dir`.
///
/// Malformed records are logged and skipped; a corrupt list aborts.
pub fn split_and_dump(list_path: &Path, out_dir: &Path, config: &SplitConfig) -> Result<SplitLists> {
    let mut picker = picker_for(config.strategy, config.shards, config.size_floor);
    let buffer_size = config.codec.buffer_size;

    let shard_files: Vec<PathBuf> = (0..picker.shards()).map(|i| shard_list_path(out_dir, i)).collect();
    let dir_list = dir_list_path(out_dir);

    let mut shard_writers = shard_files
        .iter()
        .map(|path| RecordWriter::create(path, NUL, buffer_size))
        .collect::<ListResult<Vec<_>>>()?;
    let mut dir_writer = RecordWriter::create(&dir_list, NUL, buffer_size)?;

    let mut stats = SplitStats {
        shards: vec![ShardStats::default(); shard_writers.len()],
        ..Default::default()
    };

    debug!(
        list = %list_path.display(),
        shards = shard_writers.len(),
        strategy = %config.strategy,
        "Splitting item list"
    );

    let codec = config.codec.with_record_overhead(ENTRY_PREFIX_MAX);
    for record in RecordReader::open(list_path, NUL, &codec)? {
        let record = record?;

        let entry = match ListEntry::parse(&record) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "Skipping list record");
                stats.malformed += 1;
                continue;
            }
        };

        if entry.kind.is_dir() {
            dir_writer.write_record(&entry.path)?;
            stats.directories += 1;
            continue;
        }

        let shard = picker.pick(entry.size);
        shard_writers[shard].write_record(&entry.path)?;

        let totals = &mut stats.shards[shard];
        totals.items += 1;
        totals.bytes = totals.bytes.saturating_add(entry.size);
        totals.weighted_bytes = totals
            .weighted_bytes
            .saturating_add(entry.weighted_size(config.size_floor));
    }

    for writer in shard_writers {
        writer.finish()?;
    }
    dir_writer.finish()?;

    for (i, shard) in stats.shards.iter().enumerate() {
        debug!(shard = i, items = shard.items, bytes = shard.bytes, "Shard list written");
    }
    info!(
        shards = stats.shards.len(),
        items = stats.total_items(),
        dirs = stats.directories,
        imbalance = stats.imbalance(),
        malformed = stats.malformed,
        "Item list split"
    );

    Ok(SplitLists {
        shard_files,
        dir_list,
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::list::{dump_records, CodecConfig};
    use crate::manifest::EntryKind;
    use crate::split::strategy::{LeastLoaded, RoundRobin, SplitStrategy, DEFAULT_SIZE_FLOOR};
    use std::collections::HashSet;

    fn file(size: u64, path: &str) -> ListEntry {
        ListEntry::new(EntryKind::File, size, path)
    }

    fn dir(path: &str) -> ListEntry {
        ListEntry::new(EntryKind::Directory, 0, path)
    }

    /// Deterministic pseudo-random sizes
    fn sizes(count: usize, seed: u64) -> Vec<u64> {
        let mut state = seed;
        (0..count)
            .map(|_| {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                (state >> 33) % 5_000_000
            })
            .collect()
    }

    fn read_paths(path: &Path) -> Vec<Vec<u8>> {
        RecordReader::open(path, NUL, &CodecConfig::default())
            .unwrap()
            .collect::<ListResult<_>>()
            .unwrap()
    }

    #[test]
    fn test_partition_covers_every_entry_once() {
        let mut entries = vec![dir("a/"), dir("a/b/")];
        entries.extend(sizes(200, 7).into_iter().enumerate().map(|(i, s)| file(s, &format!("a/f{}", i))));

        for shards in [1, 2, 3, 8] {
            let mut picker = LeastLoaded::new(shards, DEFAULT_SIZE_FLOOR);
            let assignment = partition(entries.clone(), &mut picker);

            assert_eq!(assignment.shards.len(), shards);
            assert_eq!(assignment.directories, vec![dir("a/"), dir("a/b/")]);

            let mut seen = HashSet::new();
            for entry in assignment.shards.iter().flatten() {
                assert!(!entry.kind.is_dir());
                assert!(seen.insert(entry.path.clone()), "duplicate {:?}", entry.path);
            }
            assert_eq!(seen.len(), 200);
        }
    }

    #[test]
    fn test_least_loaded_greedy_bound() {
        for (seed, shards) in [(1, 2), (2, 3), (3, 5), (4, 16)] {
            let entries: Vec<_> = sizes(300, seed).into_iter().map(|s| file(s, "x")).collect();
            let largest = entries
                .iter()
                .map(|e| e.weighted_size(DEFAULT_SIZE_FLOOR))
                .max()
                .unwrap();

            let mut picker = LeastLoaded::new(shards, DEFAULT_SIZE_FLOOR);
            let assignment = partition(entries, &mut picker);

            let totals: Vec<u64> = assignment
                .shards
                .iter()
                .map(|s| s.iter().map(|e| e.weighted_size(DEFAULT_SIZE_FLOOR)).sum())
                .collect();
            let spread = totals.iter().max().unwrap() - totals.iter().min().unwrap();
            assert!(spread <= largest, "spread {} > largest {}", spread, largest);
        }
    }

    #[test]
    fn test_round_robin_counts_differ_by_at_most_one() {
        for (count, shards) in [(0, 3), (10, 3), (11, 4), (97, 7)] {
            let entries: Vec<_> = sizes(count, 9).into_iter().map(|s| file(s, "x")).collect();
            let mut picker = RoundRobin::new(shards);
            let assignment = partition(entries, &mut picker);

            let counts: Vec<usize> = assignment.shards.iter().map(Vec::len).collect();
            assert!(counts.iter().max().unwrap() - counts.iter().min().unwrap() <= 1);
            assert_eq!(counts.iter().sum::<usize>(), count);
        }
    }

    #[test]
    fn test_one_big_file_gets_its_own_shard() {
        // rsync lists entries sorted, so "big" precedes "small*"
        let mut entries = vec![file(1_000_000, "big")];
        entries.extend((0..9).map(|i| file(1, &format!("small{}", i))));

        let mut picker = LeastLoaded::new(2, DEFAULT_SIZE_FLOOR);
        let assignment = partition(entries.clone(), &mut picker);
        let big_shard = assignment
            .shards
            .iter()
            .position(|s| s.iter().any(|e| e.path == b"big"))
            .unwrap();
        assert_eq!(assignment.shards[big_shard].len(), 1);
        assert_eq!(assignment.shards[1 - big_shard].len(), 9);

        let mut picker = RoundRobin::new(2);
        let assignment = partition(entries, &mut picker);
        assert_eq!(assignment.shards[0].len(), 5);
        assert_eq!(assignment.shards[1].len(), 5);
    }

    #[test]
    fn test_big_file_last_joins_the_lighter_shard() {
        let mut entries: Vec<_> = (0..9).map(|i| file(1, &format!("small{}", i))).collect();
        entries.push(file(1_000_000, "big"));

        let mut picker = LeastLoaded::new(2, DEFAULT_SIZE_FLOOR);
        let assignment = partition(entries, &mut picker);

        // Floored small files alternate 5/4; the big one lands on the 4
        assert_eq!(assignment.shards[0].len(), 5);
        assert_eq!(assignment.shards[1].len(), 5);
        assert!(assignment.shards[1].iter().any(|e| e.path == b"big"));
        assert_eq!(assignment.shards[1].iter().filter(|e| e.size == 1).count(), 4);
    }

    #[test]
    fn test_split_and_dump_writes_lists() {
        let dir_path = tempfile::tempdir().unwrap();
        let list = dir_path.path().join("items");
        dump_records(
            &list,
            NUL,
            4096,
            [
                &b"D 0 top/"[..],
                &b"F 500 top/a"[..],
                &b"F 10 top/b c"[..],
                &b"garbage"[..],
                &b"F 10 top/\xff"[..],
                &b"D 0 top/sub/"[..],
            ],
        )
        .unwrap();

        let config = SplitConfig {
            shards: 2,
            strategy: SplitStrategy::LeastLoaded,
            size_floor: 0,
            codec: CodecConfig::default(),
        };
        let lists = split_and_dump(&list, dir_path.path(), &config).unwrap();

        assert_eq!(lists.shard_files.len(), 2);
        assert!(lists.shard_files[1].ends_with("list-1"));
        assert!(lists.dir_list.ends_with(DIR_LIST_NAME));

        assert_eq!(read_paths(&lists.shard_files[0]), vec![b"top/a".to_vec()]);
        assert_eq!(
            read_paths(&lists.shard_files[1]),
            vec![b"top/b c".to_vec(), b"top/\xff".to_vec()]
        );
        assert_eq!(
            read_paths(&lists.dir_list),
            vec![b"top/".to_vec(), b"top/sub/".to_vec()]
        );

        assert_eq!(lists.stats.malformed, 1);
        assert_eq!(lists.stats.directories, 2);
        assert_eq!(lists.stats.total_items(), 3);
        assert_eq!(lists.stats.total_bytes(), 520);
        assert_eq!(lists.stats.imbalance(), 480);
    }

    #[test]
    fn test_split_and_dump_allows_prefix_on_longest_path() {
        let dir_path = tempfile::tempdir().unwrap();
        let list = dir_path.path().join("items");
        let codec = CodecConfig {
            buffer_size: 64,
            max_record_len: 256,
        };

        let path = vec![b'p'; codec.max_record_len];
        let mut record = b"F 1000 ".to_vec();
        record.extend_from_slice(&path);
        dump_records(&list, NUL, 4096, [record]).unwrap();

        let config = SplitConfig {
            shards: 1,
            codec,
            ..SplitConfig::default()
        };
        let lists = split_and_dump(&list, dir_path.path(), &config).unwrap();
        assert_eq!(read_paths(&lists.shard_files[0]), vec![path]);
    }

    #[test]
    fn test_split_and_dump_empty_list() {
        let dir_path = tempfile::tempdir().unwrap();
        let list = dir_path.path().join("items");
        dump_records(&list, NUL, 4096, Vec::<Vec<u8>>::new()).unwrap();

        let config = SplitConfig {
            shards: 3,
            ..SplitConfig::default()
        };
        let lists = split_and_dump(&list, dir_path.path(), &config).unwrap();

        assert_eq!(lists.shard_files.len(), 3);
        for path in &lists.shard_files {
            assert!(read_paths(path).is_empty());
        }
        assert_eq!(lists.stats.total_items(), 0);
    }
}
