// src/pool/stats.rs
//! Statistics snapshots for buffer pools and context shards.

/// Statistics for one [`SizedBufferPool`](super::SizedBufferPool).
#[derive(Debug, Clone)]
pub struct SizedPoolStats {
    /// Capacity of every buffer in the pool
    pub capacity: usize,
    /// Buffers currently idle in the pool
    pub available: usize,
    /// Fresh allocations since creation
    pub allocated: usize,
    /// Total number of acquire() calls
    pub acquired: usize,
    /// Total number of buffers handed back
    pub returned: usize,
}

impl SizedPoolStats {
    /// Buffers currently checked out.
    pub fn in_use(&self) -> usize {
        self.acquired.saturating_sub(self.returned)
    }

    /// Share of acquisitions served without allocating, as a percentage.
    pub fn hit_rate(&self) -> f64 {
        if self.acquired == 0 {
            return 0.0;
        }
        let reused = self.acquired.saturating_sub(self.allocated);
        (reused as f64 / self.acquired as f64) * 100.0
    }
}

/// Statistics for one context shard ([`Bucket`](crate::Bucket)).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketStats {
    /// Contexts waiting in the idle queue
    pub idle: usize,
    /// Contexts checked out by transfers
    pub pending: usize,
    /// Whether the maintenance thread is active
    pub running: bool,
    /// Contexts created since the shard was built
    pub created: usize,
    /// Contexts destroyed since the shard was built
    pub destroyed: usize,
    /// `get()` calls served from the idle queue
    pub reused: usize,
}

impl BucketStats {
    /// Contexts whose kernel resources are currently open.
    ///
    /// # Examples
    ///
    /// ```
    /// use splicebuf::prelude::*;
    ///
    /// let bucket = Bucket::new(0, SpliceConfig::default());
    /// assert_eq!(bucket.stats().live(), 0);
    /// ```
    pub fn live(&self) -> usize {
        self.idle + self.pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate() {
        let stats = SizedPoolStats {
            capacity: 64,
            available: 1,
            allocated: 1,
            acquired: 4,
            returned: 4,
        };
        assert_eq!(stats.in_use(), 0);
        assert!((stats.hit_rate() - 75.0).abs() < f64::EPSILON);
    }
}
