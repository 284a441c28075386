//! Fixed-size worker pool with one result handle per task
//!
//! Jobs are handed to the workers through a bounded crossbeam channel, so
//! a producer submitting faster than the pool drains blocks instead of
//! queueing without limit. Every submitted task gets a [`TaskHandle`], a
//! one-shot channel its worker fulfils when the task returns.
//!
//! # Architecture
//!
//! ```text
//!   submit() ──► ┌──────────────────────┐
//!                │  Job queue (bounded) │
//!                └──────────┬───────────┘
//!          ┌────────────────┼────────────────┐
//!     ┌────▼────┐      ┌────▼────┐      ┌────▼────┐
//!     │Worker 0 │      │Worker 1 │ ...  │Worker N │
//!     └────┬────┘      └────┬────┘      └────┬────┘
//!          ▼                ▼                ▼
//!     TaskHandle       TaskHandle       TaskHandle   ──► gather()
//! ```
//!
//! Failures are collected per task rather than propagated on the spot:
//! [`gather`] waits for every handle, so sibling tasks always run to
//! completion even when one of them fails.

use crate::error::WorkerError;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Upper bound on waiting for a single task (28 days).
///
/// A safety valve against a hung subprocess, not an operational timeout.
pub const JOIN_TIMEOUT: Duration = Duration::from_secs(2_419_200);

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Statistics for a pool
#[derive(Debug, Default)]
pub struct PoolStats {
    /// Tasks submitted
    pub submitted: AtomicU64,

    /// Tasks that returned
    pub completed: AtomicU64,

    /// Tasks that panicked
    pub panicked: AtomicU64,
}

impl PoolStats {
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn panicked(&self) -> u64 {
        self.panicked.load(Ordering::Relaxed)
    }
}

/// Pending result of one submitted task
pub struct TaskHandle<T> {
    /// Submission index within the pool
    id: usize,

    pool: Arc<str>,
    receiver: Receiver<T>,
}

impl<T> TaskHandle<T> {
    /// Block until the task settles or `timeout` elapses
    pub fn wait(self, timeout: Duration) -> Result<T, WorkerError> {
        match self.receiver.recv_timeout(timeout) {
            Ok(value) => Ok(value),
            Err(RecvTimeoutError::Timeout) => Err(WorkerError::TimedOut {
                pool: self.pool.to_string(),
                task: self.id,
                secs: timeout.as_secs(),
            }),
            // The sender is dropped without a value only when the task unwinds
            Err(RecvTimeoutError::Disconnected) => Err(WorkerError::Panicked {
                pool: self.pool.to_string(),
                task: self.id,
            }),
        }
    }
}

/// Wait for every handle, in submission order, and return all outcomes
pub fn gather<T>(handles: Vec<TaskHandle<T>>, timeout: Duration) -> Vec<Result<T, WorkerError>> {
    handles.into_iter().map(|h| h.wait(timeout)).collect()
}

/// A fixed set of named worker threads
pub struct WorkerPool {
    /// Pool name, used for thread names and errors
    name: Arc<str>,

    /// Job queue; `None` once shut down
    sender: Option<Sender<Job>>,

    workers: Vec<JoinHandle<()>>,

    next_id: usize,

    stats: Arc<PoolStats>,
}

impl WorkerPool {
    /// Spawn `size` workers sharing a job queue of `queue_capacity`
    pub fn new(name: &str, size: usize, queue_capacity: usize) -> Result<Self, WorkerError> {
        let name: Arc<str> = Arc::from(name);
        let (sender, receiver) = bounded::<Job>(queue_capacity.max(1));
        let stats = Arc::new(PoolStats::default());

        let mut workers = Vec::with_capacity(size);
        for id in 0..size.max(1) {
            let receiver = receiver.clone();
            let pool = Arc::clone(&name);

            let handle = thread::Builder::new()
                .name(format!("{}-{}", name, id))
                .spawn(move || worker_loop(&pool, id, receiver))
                .map_err(|e| WorkerError::Spawn {
                    pool: name.to_string(),
                    id,
                    reason: e.to_string(),
                })?;

            workers.push(handle);
        }

        debug!(pool = %name, workers = workers.len(), "Worker pool started");

        Ok(Self {
            name,
            sender: Some(sender),
            workers,
            next_id: 0,
            stats,
        })
    }

    /// Number of worker threads
    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Pool statistics
    pub fn stats(&self) -> Arc<PoolStats> {
        Arc::clone(&self.stats)
    }

    /// Queue a task, blocking while the job queue is full
    pub fn submit<T, F>(&mut self, task: F) -> Result<TaskHandle<T>, WorkerError>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let sender = self.sender.as_ref().ok_or_else(|| WorkerError::QueueClosed {
            pool: self.name.to_string(),
        })?;

        let id = self.next_id;
        let (result_tx, result_rx) = bounded::<T>(1);
        let stats = Arc::clone(&self.stats);

        let job: Job = Box::new(move || {
            match panic::catch_unwind(AssertUnwindSafe(task)) {
                Ok(value) => {
                    stats.completed.fetch_add(1, Ordering::Relaxed);
                    // Receiver may have given up waiting
                    let _ = result_tx.send(value);
                }
                Err(_) => {
                    stats.panicked.fetch_add(1, Ordering::Relaxed);
                    // Dropping result_tx reports the panic to the handle
                }
            }
        });

        sender.send(job).map_err(|_| WorkerError::QueueClosed {
            pool: self.name.to_string(),
        })?;

        self.next_id += 1;
        self.stats.submitted.fetch_add(1, Ordering::Relaxed);

        Ok(TaskHandle {
            id,
            pool: Arc::clone(&self.name),
            receiver: result_rx,
        })
    }

    /// Close the job queue and join every worker.
    ///
    /// Queued jobs still run before the workers exit.
    pub fn shutdown(mut self) -> Result<(), WorkerError> {
        self.close_and_join()
    }

    /// Settle the pool after [`gather`].
    ///
    /// Workers are joined unless some task timed out; a worker stuck on
    /// such a task would block the join, so the pool is abandoned instead.
    pub fn finish<T>(self, outcomes: &[Result<T, WorkerError>]) -> Result<(), WorkerError> {
        let timed_out = outcomes
            .iter()
            .any(|o| matches!(o, Err(WorkerError::TimedOut { .. })));

        if timed_out {
            self.abandon();
            Ok(())
        } else {
            self.shutdown()
        }
    }

    /// Close the job queue and detach every worker without joining.
    ///
    /// Queued jobs still run; their results are discarded.
    pub fn abandon(mut self) {
        self.sender.take();
        let detached = std::mem::take(&mut self.workers).len();
        warn!(pool = %self.name, workers = detached, "Abandoning worker pool with tasks still running");
    }

    fn close_and_join(&mut self) -> Result<(), WorkerError> {
        // Disconnecting the channel ends each worker loop once it drains
        self.sender.take();

        let mut result = Ok(());
        for (id, handle) in std::mem::take(&mut self.workers).into_iter().enumerate() {
            if handle.join().is_err() {
                warn!(pool = %self.name, worker = id, "Worker failed to join cleanly");
                result = Err(WorkerError::Died {
                    pool: self.name.to_string(),
                    id,
                });
            }
        }
        result
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if !self.workers.is_empty() {
            let _ = self.close_and_join();
        }
    }
}

fn worker_loop(pool: &str, id: usize, receiver: Receiver<Job>) {
    trace!(pool = %pool, worker = id, "Worker starting");
    let mut jobs = 0u64;

    while let Ok(job) = receiver.recv() {
        job();
        jobs += 1;
    }

    trace!(pool = %pool, worker = id, jobs = jobs, "Worker shutting down");
}
