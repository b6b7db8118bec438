// src/splice.rs
//! Transfer orchestration.
//!
//! A transfer moves one bounded chunk from `src` to `dst`:
//!
//! 1. resolve both descriptors, otherwise use the fallback copy;
//! 2. pick the shard for `dst` and a context (caller's or pooled);
//! 3. **leg 1**: one non-blocking move from `src` into the conduit;
//! 4. **leg 2**: drain the staged bytes into `dst`, retrying on backpressure.
//!
//! Leg 1 never retries: a "temporarily unavailable" source is reported as
//! [`SpliceError::WouldBlock`] so the caller can poll and call again.

use crate::connection::{self, Connection, Descriptor};
use crate::context::Context;
use crate::engine::Engine;
use crate::error::{SpliceError, TransferError};
use crate::fallback;
use std::io;

/// Moves up to `max_len` bytes from `src` to `dst` using the process-wide
/// engine, preferring the zero-copy path.
///
/// Pass `Some(ctx)` to reuse a context you manage yourself; otherwise one is
/// checked out from the shard serving `dst` and returned afterwards.
///
/// # Errors
///
/// - [`SpliceError::EndOfStream`]: `src` is at a clean end of stream.
/// - [`SpliceError::WouldBlock`]: `src` had nothing to read right now.
/// - [`SpliceError::Io`]: fatal error; `moved` tells how much reached `dst`.
///
/// # Examples
///
/// ```
/// use splicebuf::prelude::*;
/// use std::io::{Read, Write};
/// use std::net::{TcpListener, TcpStream};
///
/// let listener = TcpListener::bind("127.0.0.1:0")?;
/// let mut client = TcpStream::connect(listener.local_addr()?)?;
/// let (mut inbound, _) = listener.accept()?;
///
/// let upstream_listener = TcpListener::bind("127.0.0.1:0")?;
/// let mut outbound = TcpStream::connect(upstream_listener.local_addr()?)?;
/// let (mut upstream, _) = upstream_listener.accept()?;
///
/// client.write_all(b"Hello world")?;
/// let moved = splicebuf::transfer(&mut outbound, &mut inbound, None, 1024)?;
/// assert_eq!(moved, 11);
///
/// let mut received = [0u8; 11];
/// upstream.read_exact(&mut received)?;
/// assert_eq!(&received, b"Hello world");
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn transfer<D, S>(
    dst: &mut D,
    src: &mut S,
    context: Option<&mut Context>,
    max_len: usize,
) -> Result<usize, TransferError>
where
    D: Connection + ?Sized,
    S: Connection + ?Sized,
{
    Engine::global().transfer(dst, src, context, max_len)
}

impl Engine {
    /// Moves up to `max_len` bytes from `src` to `dst` using this engine's
    /// shards and buffers. See [`transfer`].
    pub fn transfer<D, S>(
        &self,
        dst: &mut D,
        src: &mut S,
        context: Option<&mut Context>,
        max_len: usize,
    ) -> Result<usize, TransferError>
    where
        D: Connection + ?Sized,
        S: Connection + ?Sized,
    {
        if max_len == 0 {
            return Ok(0);
        }
        let max_len = self.config.clamp_chunk(max_len);

        let (dst_fd, src_fd) = match (connection::resolve(dst), connection::resolve(src)) {
            (Ok(d), Ok(s)) => (d, s),
            (Err(err), _) | (_, Err(err)) => {
                tracing::debug!(reason = %err, "transfer routed to fallback copy");
                return self.fallback(dst, src, max_len);
            }
        };

        let bucket = self.shard_for(dst_fd).get_instance();
        let outcome = match context {
            Some(ctx) => splice_through(ctx, dst_fd, src_fd, max_len),
            None => match bucket.get() {
                Ok(mut ctx) => splice_through(&mut ctx, dst_fd, src_fd, max_len),
                Err(err) => {
                    tracing::warn!(shard = bucket.index(), error = %err, "no splice context, using fallback copy");
                    None
                }
            },
        };

        match outcome {
            Some(result) => result,
            None => self.fallback(dst, src, max_len),
        }
    }

    /// Buffered copy through this engine's buffer registry.
    pub fn fallback<D, S>(&self, dst: &mut D, src: &mut S, max_len: usize) -> Result<usize, TransferError>
    where
        D: Connection + ?Sized,
        S: Connection + ?Sized,
    {
        let max_len = self.config.clamp_chunk(max_len);
        fallback::copy(dst, src, max_len, self.config.fallback_chunk, &self.buffers)
    }
}

/// Runs both legs through `ctx` and records whether it stays reusable.
///
/// Returns `None` when the zero-copy path cannot be used at all (context
/// already closed, or the kernel refused the source before moving anything),
/// in which case nothing was consumed and the caller should fall back.
fn splice_through(
    ctx: &mut Context,
    dst: Descriptor,
    src: Descriptor,
    len: usize,
) -> Option<Result<usize, TransferError>> {
    let Some(handles) = ctx.conduit().handles() else {
        tracing::debug!(conduit = ctx.id(), reason = %SpliceError::Closed, "using fallback copy");
        return None;
    };
    let len = len.min(handles.capacity());

    let staged = loop {
        match handles.fill(src, len) {
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            other => break other,
        }
    };

    let (result, alive) = match staged {
        Ok(0) => (Err(TransferError::eof()), true),
        Ok(staged) => {
            tracing::trace!(conduit = ctx.conduit().id(), staged, "leg 1 complete");
            let drained = fallback::drain_with(staged, |offset, remaining| {
                handles.drain(dst, offset, remaining)
            });
            let alive = drained.is_ok();
            if let Ok(moved) = drained {
                tracing::trace!(conduit = ctx.conduit().id(), moved, "leg 2 complete");
            }
            (drained, alive)
        }
        Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
            (Err(TransferError::new(0, SpliceError::WouldBlock)), true)
        }
        Err(err) if err.kind() == io::ErrorKind::InvalidInput => {
            tracing::debug!(error = %err, "descriptor rejected by splice, using fallback copy");
            drop(handles);
            ctx.set_alive(true);
            return None;
        }
        Err(err) => (Err(TransferError::new(0, err)), false),
    };

    drop(handles);
    if alive {
        ctx.set_alive(true);
    } else {
        // Unsent bytes may still sit in the conduit.
        ctx.discard();
    }
    Some(result)
}

#[cfg(all(test, target_os = "linux"))]
mod tests {
    use super::*;
    use crate::config::SpliceConfig;
    use std::io::{Read, Write};
    use std::os::unix::net::UnixStream;
    use std::time::Duration;

    fn engine() -> Engine {
        Engine::new(SpliceConfig {
            shards: 2,
            idle_tick: Duration::from_secs(5),
            ..SpliceConfig::default()
        })
    }

    #[test]
    fn test_zero_copy_hello_world() {
        let engine = engine();
        let (mut client, mut inbound) = UnixStream::pair().unwrap();
        let (mut outbound, mut server) = UnixStream::pair().unwrap();

        client.write_all(b"Hello world").unwrap();
        let moved = engine.transfer(&mut outbound, &mut inbound, None, 1024).unwrap();
        assert_eq!(moved, 11);

        let mut out = [0u8; 11];
        server.read_exact(&mut out).unwrap();
        assert_eq!(&out, b"Hello world");

        let shard = engine.shard_for(crate::Connection::descriptor(&outbound).unwrap());
        let stats = shard.stats();
        assert_eq!(stats.pending, 0);
        assert_eq!(stats.idle, 1);
    }

    #[test]
    fn test_eof_releases_context_alive() {
        let engine = engine();
        let (client, mut inbound) = UnixStream::pair().unwrap();
        let (mut outbound, _server) = UnixStream::pair().unwrap();
        drop(client);

        let err = engine.transfer(&mut outbound, &mut inbound, None, 1024).unwrap_err();
        assert!(err.is_eof());
        assert_eq!(err.moved, 0);

        let shard = engine.shard_for(crate::Connection::descriptor(&outbound).unwrap());
        assert_eq!(shard.stats().pending, 0);
    }

    #[test]
    fn test_would_block_is_returned_not_retried() {
        let engine = engine();
        let (_client, mut inbound) = UnixStream::pair().unwrap();
        let (mut outbound, _server) = UnixStream::pair().unwrap();
        inbound.set_nonblocking(true).unwrap();

        let err = engine.transfer(&mut outbound, &mut inbound, None, 1024).unwrap_err();
        assert!(err.is_would_block());
        assert_eq!(err.moved, 0);
    }

    #[test]
    fn test_max_len_bounds_chunk() {
        let engine = engine();
        let (mut client, mut inbound) = UnixStream::pair().unwrap();
        let (mut outbound, mut server) = UnixStream::pair().unwrap();

        client.write_all(b"0123456789").unwrap();
        assert_eq!(engine.transfer(&mut outbound, &mut inbound, None, 4).unwrap(), 4);
        assert_eq!(engine.transfer(&mut outbound, &mut inbound, None, 64).unwrap(), 6);

        let mut out = [0u8; 10];
        server.read_exact(&mut out).unwrap();
        assert_eq!(&out, b"0123456789");
    }

    #[test]
    fn test_zero_len_touches_nothing() {
        let engine = engine();
        let (mut client, mut inbound) = UnixStream::pair().unwrap();
        let (mut outbound, _server) = UnixStream::pair().unwrap();
        client.write_all(b"x").unwrap();
        assert_eq!(engine.transfer(&mut outbound, &mut inbound, None, 0).unwrap(), 0);
    }

    #[test]
    fn test_caller_context_is_kept_alive() {
        let engine = engine();
        let (mut client, mut inbound) = UnixStream::pair().unwrap();
        let (mut outbound, mut server) = UnixStream::pair().unwrap();
        let mut ctx = Context::new().unwrap();

        for chunk in [&b"first "[..], &b"second"[..]] {
            client.write_all(chunk).unwrap();
            let moved = engine
                .transfer(&mut outbound, &mut inbound, Some(&mut ctx), 1024)
                .unwrap();
            assert_eq!(moved, chunk.len());
            assert!(ctx.is_alive());
        }

        let mut out = [0u8; 12];
        server.read_exact(&mut out).unwrap();
        assert_eq!(&out, b"first second");
    }

    #[test]
    fn test_closed_context_falls_back() {
        let engine = engine();
        let (mut client, mut inbound) = UnixStream::pair().unwrap();
        let (mut outbound, mut server) = UnixStream::pair().unwrap();
        let mut ctx = engine.acquire_context().unwrap();
        engine.release_all();
        assert!(ctx.is_closed());

        client.write_all(b"still delivered").unwrap();
        let moved = engine
            .transfer(&mut outbound, &mut inbound, Some(&mut ctx), 1024)
            .unwrap();
        assert_eq!(moved, 15);

        let mut out = [0u8; 15];
        server.read_exact(&mut out).unwrap();
        assert_eq!(&out, b"still delivered");
    }

    #[test]
    fn test_broken_destination_is_fatal() {
        let engine = engine();
        let (mut client, mut inbound) = UnixStream::pair().unwrap();
        let (mut outbound, server) = UnixStream::pair().unwrap();
        drop(server);
        client.write_all(b"nobody listens").unwrap();

        let mut ctx = Context::new().unwrap();
        let err = engine
            .transfer(&mut outbound, &mut inbound, Some(&mut ctx), 1024)
            .unwrap_err();
        assert_eq!(err.moved, 0);
        assert!(!err.is_eof() && !err.is_would_block());
        assert!(!ctx.is_alive());
        assert!(ctx.is_closed());
    }

    #[test]
    fn test_failed_context_never_carries_bytes_to_next_user() {
        let engine = Engine::new(SpliceConfig {
            shards: 1,
            idle_tick: Duration::from_secs(5),
            ..SpliceConfig::default()
        });
        let shard = engine.shard(0).unwrap();

        let (mut client_a, mut inbound_a) = UnixStream::pair().unwrap();
        let (mut outbound_a, server_a) = UnixStream::pair().unwrap();
        drop(server_a);
        client_a.write_all(b"SECRET-A").unwrap();

        let mut ctx = engine.acquire_context().unwrap();
        let err = engine
            .transfer(&mut outbound_a, &mut inbound_a, Some(&mut ctx), 1024)
            .unwrap_err();
        assert!(!err.is_eof() && !err.is_would_block());
        assert!(ctx.is_closed());

        // A later call on the same context must not revive it.
        inbound_a.set_nonblocking(true).unwrap();
        let err = engine
            .transfer(&mut outbound_a, &mut inbound_a, Some(&mut ctx), 1024)
            .unwrap_err();
        assert!(err.is_would_block());
        ctx.set_alive(true);
        crate::engine::release_context(ctx);
        assert_eq!(shard.stats().idle, 0);
        assert_eq!(shard.stats().destroyed, 1);

        let (mut client_b, mut inbound_b) = UnixStream::pair().unwrap();
        let (mut outbound_b, mut server_b) = UnixStream::pair().unwrap();
        client_b.write_all(b"hello-B!").unwrap();
        let moved = engine
            .transfer(&mut outbound_b, &mut inbound_b, None, 1024)
            .unwrap();
        assert_eq!(moved, 8);

        let mut out = [0u8; 8];
        server_b.read_exact(&mut out).unwrap();
        assert_eq!(&out, b"hello-B!");
    }
}
