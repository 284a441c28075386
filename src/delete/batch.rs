//! Fixed-size batching of manifest paths

/// Default number of paths per deletion batch
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Accumulates paths and hands them out in batches of `batch_size`
#[derive(Debug)]
pub struct DeletionBatcher {
    batch_size: usize,
    pending: Vec<Vec<u8>>,
    batches: u64,
}

impl DeletionBatcher {
    pub fn new(batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            batch_size,
            pending: Vec::with_capacity(batch_size),
            batches: 0,
        }
    }

    /// Add a path, returning the batch it completes, if any
    pub fn push(&mut self, path: Vec<u8>) -> Option<Vec<Vec<u8>>> {
        self.pending.push(path);
        if self.pending.len() >= self.batch_size {
            self.take()
        } else {
            None
        }
    }

    /// Hand out the final partial batch
    pub fn flush(&mut self) -> Option<Vec<Vec<u8>>> {
        if self.pending.is_empty() {
            None
        } else {
            self.take()
        }
    }

    /// Paths waiting for a batch to fill
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Batches handed out so far
    pub fn batches(&self) -> u64 {
        self.batches
    }

    fn take(&mut self) -> Option<Vec<Vec<u8>>> {
        self.batches += 1;
        Some(std::mem::replace(
            &mut self.pending,
            Vec::with_capacity(self.batch_size),
        ))
    }
}

impl Default for DeletionBatcher {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_SIZE)
    }
}
