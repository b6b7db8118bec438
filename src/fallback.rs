// src/fallback.rs
//! Buffered read-then-write copy.
//!
//! The baseline strategy, always available: one read from the source into a
//! pooled buffer, then write until the chunk is fully delivered. Used whenever
//! the zero-copy path cannot run.

use crate::connection::Connection;
use crate::error::{SpliceError, TransferError};
use crate::pool::BufferRegistry;
use std::io;
use std::thread;
use std::time::Duration;

/// Pause between retries of a write that reported backpressure.
pub const RETRY_DELAY: Duration = Duration::from_micros(10);

/// Copies at most `max_len` bytes from `src` to `dst` through a buffer of
/// capacity `max(chunk, max_len)` taken from `buffers`.
///
/// Returns the bytes delivered, or a [`TransferError`] with the bytes delivered
/// before the failure. The buffer goes back to its pool in every case.
pub fn copy<D, S>(
    dst: &mut D,
    src: &mut S,
    max_len: usize,
    chunk: usize,
    buffers: &BufferRegistry,
) -> Result<usize, TransferError>
where
    D: Connection + ?Sized,
    S: Connection + ?Sized,
{
    if max_len == 0 {
        return Ok(0);
    }
    let mut buf = buffers.acquire(chunk.max(max_len));
    let read = match read_once(src, &mut buf[..max_len]) {
        Ok(0) => return Err(TransferError::eof()),
        Ok(n) => n,
        Err(err) => return Err(TransferError::new(0, err)),
    };
    tracing::trace!(read, "fallback read");
    write_all(dst, &buf[..read])
}

fn read_once<S: Connection + ?Sized>(src: &mut S, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        match src.read(buf) {
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            other => return other,
        }
    }
}

/// Writes `data` to `dst`, sleeping briefly and retrying on backpressure.
///
/// Stops at the first fatal error, reporting the bytes written so far.
pub(crate) fn write_all<D: Connection + ?Sized>(
    dst: &mut D,
    data: &[u8],
) -> Result<usize, TransferError> {
    drain_with(data.len(), |offset, remaining| {
        dst.write(&data[offset..offset + remaining])
    })
}

/// Shared drain loop for leg 2 and the fallback write.
///
/// `step(offset, remaining)` performs one write attempt of the `remaining`
/// bytes starting at `offset`.
pub(crate) fn drain_with(
    len: usize,
    mut step: impl FnMut(usize, usize) -> io::Result<usize>,
) -> Result<usize, TransferError> {
    let mut moved = 0;
    while moved < len {
        match step(moved, len - moved) {
            Ok(0) => {
                return Err(TransferError::new(
                    moved,
                    io::Error::from(io::ErrorKind::WriteZero),
                ));
            }
            Ok(n) => moved += n,
            Err(err) => match err.kind() {
                io::ErrorKind::WouldBlock => thread::sleep(RETRY_DELAY),
                io::ErrorKind::Interrupted => {}
                _ => return Err(TransferError::new(moved, SpliceError::from(err))),
            },
        }
    }
    Ok(moved)
}
