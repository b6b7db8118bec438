// src/bucket.rs
//! Sharded context pool.
//!
//! Each [`Bucket`] owns the contexts of one shard: a *pending* set of contexts
//! checked out by transfers and an *idle* stack of contexts ready for reuse.
//! Every live context is in exactly one of the two.
//!
//! # Maintenance
//!
//! The first [`get_instance`](Bucket::get_instance) or [`get`](Bucket::get)
//! on an inactive bucket spawns a maintenance thread. Every `idle_tick` it
//! either
//!
//! - stops itself, when nothing is checked out and the bucket has not been
//!   used for `idle_timeout`, or
//! - evicts the older half of the idle stack, closing those conduits.
//!
//! The thread only holds a weak reference and exits once the bucket is gone.

use crate::config::SpliceConfig;
use crate::context::{Conduit, Context};
use crate::error::Result;
use crate::pool::BucketStats;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::{Duration, Instant};

struct State {
    pending: HashMap<u64, Arc<Conduit>>,
    /// Oldest first; `get` pops from the back.
    idle: Vec<Arc<Conduit>>,
    last_active: Instant,
    running: bool,
}

/// One independently locked shard of the context pool.
///
/// # Examples
///
/// ```
/// use splicebuf::prelude::*;
///
/// let bucket = Bucket::new(0, SpliceConfig::default());
/// # if splicebuf::CONDUIT_KIND == ConduitKind::Pipe {
/// let mut ctx = bucket.get()?;
/// ctx.set_alive(true);
/// drop(ctx); // back on the idle stack
/// assert_eq!(bucket.stats().idle, 1);
/// # }
/// # Ok::<(), splicebuf::SpliceError>(())
/// ```
pub struct Bucket {
    index: usize,
    idle_tick: Duration,
    idle_timeout: Duration,
    max_idle: AtomicUsize,
    state: Mutex<State>,
    created: AtomicUsize,
    destroyed: AtomicUsize,
    reused: AtomicUsize,
}

impl Bucket {
    /// Creates an inactive shard.
    pub fn new(index: usize, config: SpliceConfig) -> Arc<Self> {
        Arc::new(Self {
            index,
            idle_tick: config.idle_tick,
            idle_timeout: config.idle_timeout,
            max_idle: AtomicUsize::new(config.max_idle_contexts),
            state: Mutex::new(State {
                pending: HashMap::new(),
                idle: Vec::new(),
                last_active: Instant::now(),
                running: false,
            }),
            created: AtomicUsize::new(0),
            destroyed: AtomicUsize::new(0),
            reused: AtomicUsize::new(0),
        })
    }

    /// Shard index within the engine.
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Activates the maintenance thread if it is not running.
    pub fn get_instance(self: &Arc<Self>) -> &Arc<Self> {
        let mut state = self.state.lock();
        self.activate(&mut state);
        self
    }

    /// Checks out a context, reusing the most recently idled one if any.
    pub fn get(self: &Arc<Self>) -> Result<Context> {
        let mut state = self.state.lock();
        self.activate(&mut state);
        state.last_active = Instant::now();
        if let Some(conduit) = state.idle.pop() {
            state.pending.insert(conduit.id(), Arc::clone(&conduit));
            drop(state);
            self.reused.fetch_add(1, Ordering::Relaxed);
            return Ok(Context::pooled(conduit, Arc::clone(self)));
        }
        drop(state);

        let conduit = Conduit::open()?;
        self.created.fetch_add(1, Ordering::Relaxed);
        self.state
            .lock()
            .pending
            .insert(conduit.id(), Arc::clone(&conduit));
        Ok(Context::pooled(conduit, Arc::clone(self)))
    }

    /// Returns a context to this shard.
    ///
    /// Equivalent to dropping it: an alive context is re-queued while the
    /// idle stack is below its cap, anything else is destroyed.
    pub fn free(&self, ctx: Context) {
        debug_assert!(ctx.shard().is_none_or(|i| i == self.index));
        drop(ctx);
    }

    pub(crate) fn put_back(&self, conduit: &Arc<Conduit>, alive: bool) {
        let mut state = self.state.lock();
        let tracked = state.pending.remove(&conduit.id()).is_some();
        if tracked
            && alive
            && conduit.is_open()
            && state.idle.len() < self.max_idle.load(Ordering::Relaxed)
        {
            state.idle.push(Arc::clone(conduit));
            return;
        }
        drop(state);
        self.destroy(conduit);
    }

    /// Destroys every pending and idle context of this shard.
    ///
    /// Contexts still held by callers are closed too (after any in-flight
    /// transfer on them finishes); transfers that later use them fall back to
    /// the buffered copy.
    pub fn release(&self) {
        let (pending, idle) = {
            let mut state = self.state.lock();
            (
                std::mem::take(&mut state.pending),
                std::mem::take(&mut state.idle),
            )
        };
        if pending.is_empty() && idle.is_empty() {
            return;
        }
        tracing::debug!(
            shard = self.index,
            pending = pending.len(),
            idle = idle.len(),
            "releasing splice shard"
        );
        for conduit in pending.values().chain(idle.iter()) {
            self.destroy(conduit);
        }
    }

    /// Current idle cap.
    pub fn max_idle(&self) -> usize {
        self.max_idle.load(Ordering::Relaxed)
    }

    /// Changes the idle cap; a lower cap applies from the next return or tick.
    pub fn set_max_idle(&self, max_idle: usize) {
        self.max_idle.store(max_idle, Ordering::Relaxed);
    }

    /// Whether the maintenance thread is active.
    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }

    /// Returns a snapshot of shard statistics.
    pub fn stats(&self) -> BucketStats {
        let state = self.state.lock();
        BucketStats {
            idle: state.idle.len(),
            pending: state.pending.len(),
            running: state.running,
            created: self.created.load(Ordering::Relaxed),
            destroyed: self.destroyed.load(Ordering::Relaxed),
            reused: self.reused.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn destroy(&self, conduit: &Conduit) {
        if conduit.close() {
            self.destroyed.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Spawns the maintenance thread. Caller holds the state lock.
    fn activate(self: &Arc<Self>, state: &mut State) {
        if state.running {
            return;
        }
        state.running = true;
        state.last_active = Instant::now();

        let weak = Arc::downgrade(self);
        let tick = self.idle_tick;
        let spawned = thread::Builder::new()
            .name(format!("splicebuf-bucket-{}", self.index))
            .spawn(move || maintain(weak, tick));
        match spawned {
            Ok(_) => tracing::debug!(shard = self.index, "splice shard activated"),
            Err(err) => {
                state.running = false;
                tracing::warn!(shard = self.index, error = %err, "failed to spawn shard maintenance");
            }
        }
    }

    /// Stops the shard if it is idle; returns `false` when the thread must exit.
    fn keep_running(&self) -> bool {
        let mut state = self.state.lock();
        if state.last_active.elapsed() > self.idle_timeout && state.pending.is_empty() {
            state.running = false;
            tracing::debug!(shard = self.index, idle = state.idle.len(), "splice shard deactivated");
            return false;
        }
        true
    }

    fn evict_idle(&self) {
        let evicted: Vec<_> = {
            let mut state = self.state.lock();
            let max_idle = self.max_idle.load(Ordering::Relaxed);
            let over_cap = state.idle.len().saturating_sub(max_idle);
            let half = state.idle.len().div_ceil(2);
            let n = half.max(over_cap);
            state.idle.drain(..n).collect()
        };
        if evicted.is_empty() {
            return;
        }
        tracing::debug!(shard = self.index, evicted = evicted.len(), "evicted idle splice contexts");
        for conduit in &evicted {
            self.destroy(conduit);
        }
    }
}

fn maintain(bucket: Weak<Bucket>, tick: Duration) {
    loop {
        match bucket.upgrade() {
            Some(b) if b.keep_running() => {}
            _ => return,
        }
        thread::sleep(tick);
        match bucket.upgrade() {
            Some(b) => b.evict_idle(),
            None => return,
        }
    }
}
