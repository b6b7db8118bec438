// src/pool/mod.rs
//! Capacity-keyed byte-buffer pools used by the fallback copy.

pub(crate) mod registry;
pub(crate) mod sized;
pub(crate) mod stats;

pub use registry::BufferRegistry;
pub use sized::{PooledBuf, SizedBufferPool};
pub use stats::{BucketStats, SizedPoolStats};
