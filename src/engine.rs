// src/engine.rs
//! Shard array, buffer registry and the process-wide instance.
//!
//! The global [`Engine`] is built lazily on first use from the configuration
//! passed to [`configure`] (or [`SpliceConfig::default`]). Independent engines
//! can be created with [`Engine::new`] for embedding and tests.

use crate::bucket::Bucket;
use crate::config::SpliceConfig;
use crate::connection::Descriptor;
use crate::context::Context;
use crate::error::{Result, SpliceError};
use crate::pool::BufferRegistry;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

static CONFIG: OnceLock<SpliceConfig> = OnceLock::new();
static GLOBAL: OnceLock<Engine> = OnceLock::new();

/// Sharded context pool plus the fallback buffer registry.
pub struct Engine {
    pub(crate) config: SpliceConfig,
    buckets: Vec<Arc<Bucket>>,
    pub(crate) buffers: BufferRegistry,
    assign: AtomicUsize,
}

impl Engine {
    /// Builds an engine with `config.shards` inactive shards.
    pub fn new(config: SpliceConfig) -> Self {
        let buckets = (0..config.shard_count())
            .map(|index| Bucket::new(index, config.clone()))
            .collect();
        Self {
            buffers: BufferRegistry::new(config.max_pooled_buffers),
            buckets,
            config,
            assign: AtomicUsize::new(0),
        }
    }

    /// The process-wide engine, built on first call.
    pub fn global() -> &'static Engine {
        GLOBAL.get_or_init(|| {
            let config = CONFIG.get_or_init(SpliceConfig::default).clone();
            tracing::debug!(shards = config.shard_count(), "initialising splice engine");
            Engine::new(config)
        })
    }

    /// Configuration this engine was built with.
    #[inline]
    pub fn config(&self) -> &SpliceConfig {
        &self.config
    }

    /// Number of shards.
    #[inline]
    pub fn shard_count(&self) -> usize {
        self.buckets.len()
    }

    /// Shard by index.
    pub fn shard(&self, index: usize) -> Option<&Arc<Bucket>> {
        self.buckets.get(index)
    }

    /// Shard serving `descriptor` (`descriptor mod shard_count`).
    pub fn shard_for(&self, descriptor: Descriptor) -> &Arc<Bucket> {
        let index = (descriptor.unsigned_abs() as usize) % self.buckets.len();
        &self.buckets[index]
    }

    /// Buffer registry used by the fallback copy.
    #[inline]
    pub fn buffers(&self) -> &BufferRegistry {
        &self.buffers
    }

    /// Checks out a context from the next shard in round-robin order.
    pub fn acquire_context(&self) -> Result<Context> {
        let index = self.assign.fetch_add(1, Ordering::Relaxed) % self.buckets.len();
        self.buckets[index].get_instance().get()
    }

    /// Destroys every context in every shard and drops pooled buffers.
    pub fn release_all(&self) {
        for bucket in &self.buckets {
            bucket.release();
        }
        self.buffers.clear();
    }
}

/// Sets the configuration of the process-wide engine.
///
/// Must run before the first transfer or context acquisition; afterwards it
/// returns [`SpliceError::AlreadyConfigured`].
///
/// # Examples
///
/// ```
/// use splicebuf::prelude::*;
///
/// let first = splicebuf::configure(SpliceConfig::small());
/// let second = splicebuf::configure(SpliceConfig::large());
/// assert_eq!(second, Err(SpliceError::AlreadyConfigured));
/// # let _ = first;
/// ```
pub fn configure(config: SpliceConfig) -> Result<()> {
    CONFIG
        .set(config)
        .map_err(|_| SpliceError::AlreadyConfigured)
}

/// Checks out a context from the process-wide pool.
pub fn acquire_context() -> Result<Context> {
    Engine::global().acquire_context()
}

/// Returns a context to its shard (same as dropping it).
pub fn release_context(ctx: Context) {
    drop(ctx);
}

/// Force-drains every shard of the process-wide engine.
pub fn release_all() {
    Engine::global().release_all();
}
