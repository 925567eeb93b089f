//! Accounting for record batches held by the extraction pipeline.
//!
//! Arrow buffers are reference counted; a [`RetainedBatch`] is one counted
//! reference registered with a [`CheckedAllocator`]. Releasing it (explicitly
//! or by dropping it) unregisters it, so a finished call can assert that the
//! allocator is back to zero.

use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use arrow::record_batch::RecordBatch;

#[derive(Debug, Default)]
struct Counters {
    batches: AtomicI64,
    bytes: AtomicI64,
}

#[derive(Debug, Clone, Default)]
pub struct CheckedAllocator {
    counters: Arc<Counters>,
}

impl CheckedAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes a new reference to `batch`.
    pub fn retain(&self, batch: &RecordBatch) -> RetainedBatch {
        let bytes = batch.get_array_memory_size() as i64;
        self.counters.batches.fetch_add(1, Ordering::SeqCst);
        self.counters.bytes.fetch_add(bytes, Ordering::SeqCst);
        RetainedBatch { batch: batch.clone(), bytes, allocator: self.clone() }
    }

    pub fn outstanding_batches(&self) -> i64 {
        self.counters.batches.load(Ordering::SeqCst)
    }

    pub fn outstanding_bytes(&self) -> i64 {
        self.counters.bytes.load(Ordering::SeqCst)
    }

    /// Panics unless exactly `batches` references are outstanding. Test helper.
    pub fn assert_outstanding(&self, batches: i64) {
        let outstanding = self.outstanding_batches();
        assert_eq!(outstanding, batches, "checked allocator: {outstanding} batches outstanding, expected {batches}");
        if batches == 0 {
            assert_eq!(self.outstanding_bytes(), 0, "checked allocator: bytes outstanding with no batches");
        }
    }

    fn release(&self, bytes: i64) {
        self.counters.batches.fetch_sub(1, Ordering::SeqCst);
        self.counters.bytes.fetch_sub(bytes, Ordering::SeqCst);
    }
}

/// A counted reference to a record batch. Released exactly once, on
/// [`RetainedBatch::release`] or drop.
pub struct RetainedBatch {
    batch: RecordBatch,
    bytes: i64,
    allocator: CheckedAllocator,
}

impl RetainedBatch {
    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    pub fn release(self) {
        drop(self)
    }
}

impl Drop for RetainedBatch {
    fn drop(&mut self) {
        self.allocator.release(self.bytes);
    }
}

impl fmt::Debug for RetainedBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetainedBatch")
            .field("rows", &self.batch.num_rows())
            .field("bytes", &self.bytes)
            .finish()
    }
}
