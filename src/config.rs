// src/config.rs
//! Configuration for the transfer engine

use std::time::Duration;

/// Largest chunk a single zero-copy call moves through a kernel pipe.
#[cfg(any(target_os = "linux", target_os = "android"))]
pub const MAX_SPLICE_SIZE: usize = 4 << 20;
/// Largest chunk a single call moves through the shared-memory segment.
#[cfg(not(any(target_os = "linux", target_os = "android")))]
pub const MAX_SPLICE_SIZE: usize = 64 << 10;

/// Default capacity of a fallback copy buffer.
pub const DEFAULT_FALLBACK_CHUNK: usize = 64 << 10;

/// Default cap on idle contexts kept per shard.
pub const DEFAULT_MAX_IDLE_CONTEXTS: usize = 256;

/// Tunables for the sharded context pool and the fallback path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpliceConfig {
    /// Number of independently locked shards
    pub shards: usize,
    /// Maximum idle contexts kept per shard
    pub max_idle_contexts: usize,
    /// How often a shard's maintenance thread wakes up
    pub idle_tick: Duration,
    /// Inactivity after which a shard with nothing checked out deactivates
    pub idle_timeout: Duration,
    /// Upper bound on bytes moved by one transfer call
    pub max_chunk: usize,
    /// Minimum capacity of a fallback copy buffer
    pub fallback_chunk: usize,
    /// Buffers retained per capacity in the fallback buffer registry
    pub max_pooled_buffers: usize,
}

impl Default for SpliceConfig {
    fn default() -> Self {
        Self {
            shards: default_shards(),
            max_idle_contexts: DEFAULT_MAX_IDLE_CONTEXTS,
            idle_tick: Duration::from_secs(1),
            idle_timeout: Duration::from_secs(1),
            max_chunk: MAX_SPLICE_SIZE,
            fallback_chunk: DEFAULT_FALLBACK_CHUNK,
            max_pooled_buffers: 64,
        }
    }
}

impl SpliceConfig {
    /// Configuration for small hosts (few descriptors, little memory).
    pub fn small() -> Self {
        Self {
            shards: default_shards().min(4),
            max_idle_contexts: 16,
            max_chunk: MAX_SPLICE_SIZE.min(64 << 10),
            fallback_chunk: 16 << 10,
            max_pooled_buffers: 8,
            ..Self::default()
        }
    }

    /// Configuration for busy relays.
    pub fn large() -> Self {
        Self {
            max_idle_contexts: 1024,
            idle_timeout: Duration::from_secs(10),
            max_pooled_buffers: 512,
            ..Self::default()
        }
    }

    /// Shard count clamped to at least one.
    #[inline]
    pub(crate) fn shard_count(&self) -> usize {
        self.shards.max(1)
    }

    /// `max_len` clamped to the per-call chunk bound.
    #[inline]
    pub(crate) fn clamp_chunk(&self, max_len: usize) -> usize {
        max_len.min(self.max_chunk.max(1))
    }
}

fn default_shards() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SpliceConfig::default();
        assert!(config.shards >= 1);
        assert_eq!(config.max_idle_contexts, 256);
        assert_eq!(config.idle_tick, Duration::from_secs(1));
        assert_eq!(config.max_chunk, MAX_SPLICE_SIZE);
    }

    #[test]
    fn test_clamp_chunk() {
        let config = SpliceConfig {
            max_chunk: 1024,
            ..SpliceConfig::default()
        };
        assert_eq!(config.clamp_chunk(10), 10);
        assert_eq!(config.clamp_chunk(1 << 20), 1024);
    }

    #[test]
    fn test_zero_shards_still_routes() {
        let config = SpliceConfig {
            shards: 0,
            ..SpliceConfig::default()
        };
        assert_eq!(config.shard_count(), 1);
    }
}
