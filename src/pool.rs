use crate::codec::{Compressor, LEVEL_COUNT, Level};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Default number of idle compressors kept per level.
pub const DEFAULT_MAX_IDLE: usize = 64;

/// A pool of reusable gzip compressors, one free list per level.
///
/// [`acquire`](WriterPool::acquire) hands out a compressor by value, so a
/// handle belongs to exactly one response until it is given back with
/// [`release`](WriterPool::release), which resets it first.
pub struct WriterPool {
    idle: [Mutex<Vec<Compressor>>; LEVEL_COUNT],
    max_idle: usize,
    next_id: AtomicU64,
}

impl WriterPool {
    /// Creates an empty pool keeping up to [`DEFAULT_MAX_IDLE`] handles per level.
    pub fn new() -> Self {
        Self::with_max_idle(DEFAULT_MAX_IDLE)
    }

    /// Creates an empty pool keeping up to `max_idle` handles per level.
    pub fn with_max_idle(max_idle: usize) -> Self {
        Self {
            idle: std::array::from_fn(|_| Mutex::new(Vec::new())),
            max_idle,
            next_id: AtomicU64::new(0),
        }
    }

    /// Takes an idle compressor for `level`, creating one if none is idle.
    pub fn acquire(&self, level: Level) -> Compressor {
        if let Some(compressor) = self.idle[level.index()].lock().pop() {
            return compressor;
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(id, %level, "allocating gzip compressor");
        Compressor::new(id, level)
    }

    /// Resets `compressor` and returns it to the free list for its level.
    pub fn release(&self, mut compressor: Compressor) {
        compressor.reset();
        let mut idle = self.idle[compressor.level().index()].lock();
        if idle.len() < self.max_idle {
            idle.push(compressor);
        }
    }

    /// Number of idle compressors for `level`.
    pub fn idle(&self, level: Level) -> usize {
        self.idle[level.index()].lock().len()
    }
}

impl Default for WriterPool {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for WriterPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriterPool")
            .field("max_idle", &self.max_idle)
            .field("allocated", &self.next_id.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
