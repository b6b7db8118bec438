// src/context/mod.rs
//! Reusable zero-copy conduits.
//!
//! A [`Context`] owns one conduit: an anonymous kernel pipe on Linux, a
//! private shared-memory segment on the BSD family and macOS. The platform
//! variant is chosen at build time; the transfer logic only sees the two
//! handle operations `fill` (leg 1) and `drain` (leg 2).
//!
//! # Ownership
//!
//! The kernel handles live in a [`Conduit`] shared through `Arc` between the
//! owning `Context` and its shard's bookkeeping, so that a forced
//! [`Bucket::release`](crate::Bucket::release) can close contexts that are
//! still checked out. Handles sit behind a read/write lock: a transfer holds
//! the read side for the duration of both legs, and closing takes the write
//! side, so a descriptor is never closed under an in-flight syscall.

use crate::bucket::Bucket;
use crate::error::Result;
use parking_lot::{MappedRwLockReadGuard, RwLock, RwLockReadGuard};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

#[cfg(any(target_os = "linux", target_os = "android"))]
#[path = "pipe.rs"]
mod sys;

#[cfg(any(
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "dragonfly",
    target_os = "netbsd",
    target_os = "openbsd"
))]
#[path = "shm.rs"]
mod sys;

#[cfg(not(any(
    target_os = "linux",
    target_os = "android",
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "dragonfly",
    target_os = "netbsd",
    target_os = "openbsd"
)))]
#[path = "unsupported.rs"]
mod sys;

pub(crate) use sys::Handles;

/// Whether this build has a zero-copy conduit at all.
pub(crate) const SUPPORTED: bool = sys::SUPPORTED;

/// Which kernel resource backs a conduit on this build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConduitKind {
    /// Anonymous kernel pipe driven by `splice(2)`
    Pipe,
    /// Private System V shared-memory segment
    SharedMemory,
    /// No zero-copy conduit; every transfer uses the fallback copy
    Unsupported,
}

/// The conduit variant compiled into this build.
pub const CONDUIT_KIND: ConduitKind = sys::KIND;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

// ---------------------------------------------------------------------------
// Conduit
// ---------------------------------------------------------------------------

/// Kernel resources of one context, closable from any holder.
pub(crate) struct Conduit {
    id: u64,
    handles: RwLock<Option<Handles>>,
}

impl Conduit {
    /// Creates a new pipe / shared-memory segment.
    pub(crate) fn open() -> Result<Arc<Self>> {
        let handles = Handles::open()?;
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(conduit = id, kind = ?CONDUIT_KIND, "opened splice conduit");
        Ok(Arc::new(Self {
            id,
            handles: RwLock::new(Some(handles)),
        }))
    }

    #[inline]
    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    /// Borrows the open handles, or `None` once closed.
    pub(crate) fn handles(&self) -> Option<MappedRwLockReadGuard<'_, Handles>> {
        RwLockReadGuard::try_map(self.handles.read(), |h| h.as_ref()).ok()
    }

    /// Closes both handles together. Returns `true` if this call closed them.
    pub(crate) fn close(&self) -> bool {
        let handles = self.handles.write().take();
        match handles {
            Some(handles) => {
                drop(handles);
                tracing::debug!(conduit = self.id, "closed splice conduit");
                true
            }
            None => false,
        }
    }

    pub(crate) fn is_open(&self) -> bool {
        self.handles.read().is_some()
    }
}

impl Handles {
    /// Largest number of bytes one `fill` may stage.
    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        sys::CAPACITY
    }
}

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// A reusable zero-copy conduit checked out for exclusive use.
///
/// Contexts obtained from a [`Bucket`] (or [`acquire_context`](crate::acquire_context))
/// go back to that shard when dropped: re-queued if the last use completed
/// cleanly and the idle queue has room, destroyed otherwise. Contexts built
/// with [`Context::new`] belong to no shard and are closed on drop.
///
/// # Examples
///
/// ```no_run
/// use splicebuf::prelude::*;
/// use std::net::TcpStream;
///
/// let mut client = TcpStream::connect("127.0.0.1:9000")?;
/// let mut upstream = TcpStream::connect("127.0.0.1:9001")?;
///
/// let mut ctx = splicebuf::acquire_context()?;
/// loop {
///     match splicebuf::transfer(&mut upstream, &mut client, Some(&mut ctx), 64 * 1024) {
///         Ok(_) => continue,
///         Err(e) if e.is_would_block() => continue,
///         Err(_) => break,
///     }
/// }
/// splicebuf::release_context(ctx);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct Context {
    conduit: Arc<Conduit>,
    alive: bool,
    bucket: Option<Arc<Bucket>>,
}

impl Context {
    /// Creates a standalone context that is not tracked by any shard.
    pub fn new() -> Result<Self> {
        Ok(Self {
            conduit: Conduit::open()?,
            alive: true,
            bucket: None,
        })
    }

    pub(crate) fn pooled(conduit: Arc<Conduit>, bucket: Arc<Bucket>) -> Self {
        Self {
            conduit,
            alive: false,
            bucket: Some(bucket),
        }
    }

    /// Unique identifier of the underlying conduit.
    #[inline]
    pub fn id(&self) -> u64 {
        self.conduit.id()
    }

    /// Whether the last use completed cleanly, making the context reusable.
    #[inline]
    pub fn is_alive(&self) -> bool {
        self.alive
    }

    /// Marks the context reusable (or not) for when it is released.
    #[inline]
    pub fn set_alive(&mut self, alive: bool) {
        self.alive = alive;
    }

    /// Returns `true` once the kernel resources have been closed.
    pub fn is_closed(&self) -> bool {
        !self.conduit.is_open()
    }

    /// Index of the owning shard, if the context is pooled.
    pub fn shard(&self) -> Option<usize> {
        self.bucket.as_ref().map(|b| b.index())
    }

    /// Destroys the context right away instead of offering it for reuse.
    pub fn close(mut self) {
        self.alive = false;
    }

    /// Closes the conduit now, so neither this holder nor the shard can reuse
    /// whatever it still contains.
    pub(crate) fn discard(&mut self) {
        self.alive = false;
        match &self.bucket {
            Some(bucket) => bucket.destroy(&self.conduit),
            None => {
                self.conduit.close();
            }
        }
    }

    #[inline]
    pub(crate) fn conduit(&self) -> &Conduit {
        &self.conduit
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("id", &self.conduit.id())
            .field("alive", &self.alive)
            .field("shard", &self.shard())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        match self.bucket.take() {
            Some(bucket) => bucket.put_back(&self.conduit, self.alive),
            None => {
                self.conduit.close();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(target_os = "linux")]
    #[test]
    fn test_standalone_context_closes_on_drop() {
        let ctx = Context::new().unwrap();
        assert!(!ctx.is_closed());
        assert!(ctx.is_alive());
        assert_eq!(ctx.shard(), None);

        let conduit = Arc::clone(&ctx.conduit);
        drop(ctx);
        assert!(!conduit.is_open());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_close_is_idempotent() {
        let conduit = Conduit::open().unwrap();
        assert!(conduit.close());
        assert!(!conduit.close());
        assert!(conduit.handles().is_none());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_ids_are_unique() {
        let a = Context::new().unwrap();
        let b = Context::new().unwrap();
        assert_ne!(a.id(), b.id());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_kind_matches_platform() {
        assert_eq!(CONDUIT_KIND, ConduitKind::Pipe);
        assert!(SUPPORTED);
    }
}
