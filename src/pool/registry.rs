// src/pool/registry.rs
//! Capacity-keyed registry of buffer pools.

use super::sized::{PooledBuf, SizedBufferPool};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Maps a buffer capacity to the single [`SizedBufferPool`] serving it.
///
/// Lookups take the read lock; a missing capacity is created under the write
/// lock with `entry().or_insert_with`, so two racing callers never end up with
/// separate pools for the same size.
pub struct BufferRegistry {
    pools: RwLock<HashMap<usize, Arc<SizedBufferPool>>>,
    max_pooled: usize,
}

impl BufferRegistry {
    /// Creates an empty registry; each pool keeps up to `max_pooled` idle buffers.
    pub fn new(max_pooled: usize) -> Self {
        Self {
            pools: RwLock::new(HashMap::new()),
            max_pooled,
        }
    }

    /// Returns the pool for `capacity`, creating it on first request.
    pub fn pool(&self, capacity: usize) -> Arc<SizedBufferPool> {
        if let Some(pool) = self.pools.read().get(&capacity) {
            return Arc::clone(pool);
        }
        let mut pools = self.pools.write();
        let pool = pools
            .entry(capacity)
            .or_insert_with(|| Arc::new(SizedBufferPool::new(capacity, self.max_pooled)));
        Arc::clone(pool)
    }

    /// Shorthand for `self.pool(capacity).acquire()`.
    #[inline]
    pub fn acquire(&self, capacity: usize) -> PooledBuf {
        self.pool(capacity).acquire()
    }

    /// Number of distinct capacities seen so far.
    pub fn len(&self) -> usize {
        self.pools.read().len()
    }

    /// Returns `true` if no pool has been created yet.
    pub fn is_empty(&self) -> bool {
        self.pools.read().is_empty()
    }

    /// Drops idle buffers in every pool; the pools themselves stay registered.
    pub fn clear(&self) {
        for pool in self.pools.read().values() {
            pool.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_same_capacity_same_pool() {
        let registry = BufferRegistry::new(8);
        let a = registry.pool(1024);
        let b = registry.pool(1024);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);

        registry.pool(2048);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_acquire_twice_never_smaller() {
        let registry = BufferRegistry::new(8);
        let first = registry.acquire(1024);
        assert!(first.len() >= 1024);
        drop(first);
        let second = registry.acquire(1024);
        assert!(second.len() >= 1024);
        assert_eq!(registry.pool(1024).stats().allocated, 1);
    }

    #[test]
    fn test_concurrent_create_single_pool() {
        let registry = Arc::new(BufferRegistry::new(8));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let r = Arc::clone(&registry);
                thread::spawn(move || r.pool(4096))
            })
            .collect();
        let pools: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(pools.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_clear_keeps_pools() {
        let registry = BufferRegistry::new(8);
        drop(registry.acquire(64));
        assert_eq!(registry.pool(64).available(), 1);
        registry.clear();
        assert_eq!(registry.pool(64).available(), 0);
        assert!(!registry.is_empty());
    }
}
