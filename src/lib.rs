//! split-rsync - Parallel rsync by balanced file-list sharding
//!
//! rsync handles one file at a time per process. On trees with millions of
//! small files a transfer is bound by per-file round trips rather than
//! bandwidth, so running N rsync processes over disjoint parts of the file
//! list scales roughly linearly until I/O saturates.
//!
//! # Features
//!
//! - **Balanced Shards**: Files are assigned greedily to the least-loaded
//!   shard by size (or round-robin), so shards finish at about the same
//!   time.
//!
//! - **Directory Skeleton First**: Every directory is synced in one pass
//!   before any shard starts, so shards never race on parent creation.
//!
//! - **Safe Parallel Deletion**: Extraneous files are removed by a worker
//!   pool; directories are removed afterwards from a single thread.
//!
//! - **Bounded Memory**: Every list is a NUL-delimited file streamed in
//!   fixed-size chunks, with corruption detection on overlong records.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │              rsync --dry-run --out-format='%i %l %n'             │
//! └─────────────────────────────┬───────────────────────────────────┘
//!                               │ itemized lines
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       Manifest Parser                            │
//! │        list-all (F|D size path\0)   list-delete (path\0)         │
//! └──────────────┬───────────────────────────────────┬──────────────┘
//!                │                                   │
//!                ▼                                   ▼
//! ┌──────────────────────────────┐    ┌─────────────────────────────┐
//! │     Balanced Partitioner     │    │   Parallel Deletion Pool    │
//! │  list-0 .. list-N-1, list-dir│    │  files in batches, then     │
//! └──────────────┬───────────────┘    │  dirs deepest-first         │
//!                │                    └─────────────────────────────┘
//!                ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Dispatcher                                │
//! │   rsync -f'+ */' -f'- *' --files-from=list-dir   (first)         │
//! │  ┌─────────┐  ┌─────────┐  ┌─────────┐         ┌─────────┐      │
//! │  │ rsync 0 │  │ rsync 1 │  │ rsync 2 │  ...    │ rsync N │      │
//! │  └─────────┘  └─────────┘  └─────────┘         └─────────┘      │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```bash
//! # 16 concurrent rsyncs, balanced by size
//! split-rsync -n 16 /data/src/ /data/dst/ -- -a --numeric-ids
//!
//! # Mirror, removing extraneous destination entries in parallel
//! split-rsync --delete -n 8 /data/src/ /data/dst/ -- -aH
//! ```

pub mod config;
pub mod delete;
pub mod dispatch;
pub mod error;
pub mod job;
pub mod list;
pub mod manifest;
pub mod pool;
pub mod progress;
pub mod rsync;
pub mod split;

pub use config::{CliArgs, JobConfig};
pub use error::{Result, SyncError};
pub use job::{JobResult, SyncJob};
