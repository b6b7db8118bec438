// src/connection.rs
//! Duplex connections the engine can transfer between.
//!
//! A [`Connection`] is any `Read + Write` stream. Streams backed by a kernel
//! socket additionally expose their raw descriptor, which makes them eligible
//! for the zero-copy path; everything else goes through the buffered fallback.

use crate::error::{Result, SpliceError};
use std::io::{Read, Write};
use std::net::TcpStream;

/// Raw platform descriptor handed to the zero-copy primitive.
#[cfg(unix)]
pub type Descriptor = std::os::fd::RawFd;
/// Raw platform descriptor handed to the zero-copy primitive.
#[cfg(not(unix))]
pub type Descriptor = i32;

/// A duplex byte stream that can be used as a transfer endpoint.
///
/// `read` and `write` may be non-blocking; backpressure is reported as
/// [`std::io::ErrorKind::WouldBlock`].
///
/// # Examples
///
/// ```
/// use splicebuf::Connection;
/// use std::io::{self, Read, Write};
///
/// struct Loopback(Vec<u8>);
///
/// impl Read for Loopback {
///     fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
///         let n = buf.len().min(self.0.len());
///         buf[..n].copy_from_slice(&self.0[..n]);
///         self.0.drain(..n);
///         Ok(n)
///     }
/// }
///
/// impl Write for Loopback {
///     fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
///         self.0.extend_from_slice(buf);
///         Ok(buf.len())
///     }
///     fn flush(&mut self) -> io::Result<()> {
///         Ok(())
///     }
/// }
///
/// // No descriptor: transfers always use the buffered fallback.
/// impl Connection for Loopback {}
/// ```
pub trait Connection: Read + Write {
    /// Raw descriptor usable for zero-copy, if the stream has one.
    fn descriptor(&self) -> Option<Descriptor> {
        None
    }
}

impl<T: Connection + ?Sized> Connection for &mut T {
    fn descriptor(&self) -> Option<Descriptor> {
        (**self).descriptor()
    }
}

impl<T: Connection + ?Sized> Connection for Box<T> {
    fn descriptor(&self) -> Option<Descriptor> {
        (**self).descriptor()
    }
}

impl Connection for TcpStream {
    #[cfg(unix)]
    fn descriptor(&self) -> Option<Descriptor> {
        use std::os::fd::AsRawFd;
        Some(self.as_raw_fd())
    }
}

#[cfg(unix)]
impl Connection for std::os::unix::net::UnixStream {
    fn descriptor(&self) -> Option<Descriptor> {
        use std::os::fd::AsRawFd;
        Some(self.as_raw_fd())
    }
}

/// Resolves the descriptor of `conn` for the zero-copy path.
///
/// Fails with [`SpliceError::Unsupported`] when the connection has no usable
/// descriptor or the platform has no zero-copy conduit. This is a routing
/// signal, not an application error.
pub fn resolve<C: Connection + ?Sized>(conn: &C) -> Result<Descriptor> {
    if !crate::context::SUPPORTED {
        return Err(SpliceError::Unsupported(
            "no zero-copy conduit on this platform".into(),
        ));
    }
    match conn.descriptor() {
        Some(fd) if fd >= 0 => Ok(fd),
        Some(fd) => Err(SpliceError::Unsupported(format!("invalid descriptor {}", fd))),
        None => Err(SpliceError::Unsupported(
            "connection does not expose a descriptor".into(),
        )),
    }
}
