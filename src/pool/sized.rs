// src/pool/sized.rs
//! Lock-free pool of fixed-capacity byte buffers.
//!
//! Every buffer handed out by a [`SizedBufferPool`] has exactly the pool's
//! capacity. Buffers are zeroed (via `zeroize`) before they go back on the
//! queue, so relayed payload from one transfer is never visible to the next.
//!
//! The idle count and the `SegQueue` are not updated in one transaction. Under
//! heavy concurrency the pool may briefly hold a few more than
//! `max_pooled` buffers; the excess is dropped on a later return.

use super::stats::SizedPoolStats;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use zeroize::Zeroize;

// ---------------------------------------------------------------------------
// Lock-free queue with approximate size tracking
// ---------------------------------------------------------------------------

/// Wrapper around `crossbeam::SegQueue` that tracks an approximate length.
struct LockFreeQueue<T> {
    items: crossbeam::queue::SegQueue<T>,
    size: AtomicUsize,
}

impl<T> LockFreeQueue<T> {
    fn new() -> Self {
        Self {
            items: crossbeam::queue::SegQueue::new(),
            size: AtomicUsize::new(0),
        }
    }

    #[inline]
    fn push(&self, item: T) {
        self.items.push(item);
        self.size.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    fn pop(&self) -> Option<T> {
        self.items.pop().inspect(|_| {
            self.size.fetch_sub(1, Ordering::Relaxed);
        })
    }

    /// Approximate queue length, may be briefly stale.
    #[inline]
    fn len(&self) -> usize {
        self.size.load(Ordering::Relaxed)
    }
}

#[derive(Default)]
struct Counters {
    allocated: AtomicUsize,
    acquired: AtomicUsize,
    returned: AtomicUsize,
}

// ---------------------------------------------------------------------------
// SizedBufferPool
// ---------------------------------------------------------------------------

/// Pool of byte buffers that all share one capacity.
///
/// Obtain pools through [`BufferRegistry`](super::BufferRegistry) so that each
/// capacity maps to a single shared instance.
pub struct SizedBufferPool {
    capacity: usize,
    max_pooled: usize,
    idle: LockFreeQueue<Vec<u8>>,
    counters: Counters,
}

impl SizedBufferPool {
    /// Creates an empty pool for buffers of `capacity` bytes.
    pub fn new(capacity: usize, max_pooled: usize) -> Self {
        Self {
            capacity,
            max_pooled,
            idle: LockFreeQueue::new(),
            counters: Counters::default(),
        }
    }

    /// Capacity of every buffer this pool hands out.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Takes an idle buffer or allocates a fresh zeroed one.
    ///
    /// The returned guard puts the buffer back (zeroed) when dropped.
    pub fn acquire(self: &Arc<Self>) -> PooledBuf {
        self.counters.acquired.fetch_add(1, Ordering::Relaxed);
        let buf = self.idle.pop().unwrap_or_else(|| {
            self.counters.allocated.fetch_add(1, Ordering::Relaxed);
            vec![0; self.capacity]
        });
        PooledBuf {
            buf: Some(buf),
            pool: Arc::clone(self),
        }
    }

    /// Number of idle buffers (approximate).
    #[inline]
    pub fn available(&self) -> usize {
        self.idle.len()
    }

    /// Drops every idle buffer.
    pub fn clear(&self) {
        while self.idle.pop().is_some() {}
    }

    /// Returns a snapshot of pool statistics.
    pub fn stats(&self) -> SizedPoolStats {
        SizedPoolStats {
            capacity: self.capacity,
            available: self.idle.len(),
            allocated: self.counters.allocated.load(Ordering::Relaxed),
            acquired: self.counters.acquired.load(Ordering::Relaxed),
            returned: self.counters.returned.load(Ordering::Relaxed),
        }
    }

    fn give_back(&self, mut buf: Vec<u8>) {
        self.counters.returned.fetch_add(1, Ordering::Relaxed);
        buf.as_mut_slice().zeroize();
        if self.idle.len() < self.max_pooled {
            self.idle.push(buf);
        }
    }
}

// ---------------------------------------------------------------------------
// PooledBuf
// ---------------------------------------------------------------------------

/// A buffer borrowed from a [`SizedBufferPool`].
///
/// Dereferences to the full-capacity byte slice. On drop the bytes are zeroed
/// and the buffer returns to its pool if there is room.
pub struct PooledBuf {
    buf: Option<Vec<u8>>,
    pool: Arc<SizedBufferPool>,
}

impl PooledBuf {
    /// Capacity of the underlying buffer.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.pool.capacity
    }
}

impl std::ops::Deref for PooledBuf {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.buf.as_deref().unwrap_or(&[])
    }
}

impl std::ops::DerefMut for PooledBuf {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.buf.as_deref_mut().unwrap_or(&mut [])
    }
}

impl Drop for PooledBuf {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take() {
            self.pool.give_back(buf);
        }
    }
}
