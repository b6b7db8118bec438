// src/context/pipe.rs
//! Kernel pipe conduit driven by `splice(2)`.

use super::ConduitKind;
use crate::connection::Descriptor;
use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use std::ptr;

pub(super) const SUPPORTED: bool = true;
pub(super) const KIND: ConduitKind = ConduitKind::Pipe;
/// A pipe has no fixed user-visible size; the chunk bound comes from config.
pub(super) const CAPACITY: usize = usize::MAX;

const SPLICE_FLAGS: libc::c_uint = libc::SPLICE_F_MOVE | libc::SPLICE_F_NONBLOCK;

/// Read and write ends of one anonymous pipe.
///
/// Both ends are `OwnedFd`, so dropping the value closes them together.
pub(crate) struct Handles {
    reader: OwnedFd,
    writer: OwnedFd,
}

impl Handles {
    pub(super) fn open() -> io::Result<Self> {
        let mut fds: [libc::c_int; 2] = [-1; 2];
        // SAFETY: `fds` is a valid two-element array for pipe2 to fill.
        let ret = unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_CLOEXEC) };
        if ret < 0 {
            return Err(io::Error::last_os_error());
        }
        // SAFETY: pipe2 succeeded, both descriptors are fresh and owned by us.
        let (reader, writer) = unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) };
        Ok(Self { reader, writer })
    }

    /// Moves up to `len` bytes from `src` into the pipe.
    pub(crate) fn fill(&self, src: Descriptor, len: usize) -> io::Result<usize> {
        splice(src, self.writer.as_raw_fd(), len)
    }

    /// Moves up to `len` staged bytes from the pipe into `dst`.
    ///
    /// Pipe contents are consumed in order, so `_offset` is implied.
    pub(crate) fn drain(&self, dst: Descriptor, _offset: usize, len: usize) -> io::Result<usize> {
        splice(self.reader.as_raw_fd(), dst, len)
    }
}

fn splice(fd_in: Descriptor, fd_out: Descriptor, len: usize) -> io::Result<usize> {
    // SAFETY: null offsets are allowed for pipes and sockets; the descriptors
    // are only read by the kernel and a bad one surfaces as EBADF.
    let ret = unsafe {
        libc::splice(
            fd_in,
            ptr::null_mut(),
            fd_out,
            ptr::null_mut(),
            len,
            SPLICE_FLAGS,
        )
    };
    if ret < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(ret as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::os::unix::net::UnixStream;

    #[test]
    fn test_fill_then_drain() {
        let handles = Handles::open().unwrap();
        let (mut src_peer, src) = UnixStream::pair().unwrap();
        let (dst, mut dst_peer) = UnixStream::pair().unwrap();

        src_peer.write_all(b"through the pipe").unwrap();
        let staged = handles.fill(src.as_raw_fd(), 1024).unwrap();
        assert_eq!(staged, 16);

        let drained = handles.drain(dst.as_raw_fd(), 0, staged).unwrap();
        assert_eq!(drained, 16);

        let mut out = [0u8; 16];
        dst_peer.read_exact(&mut out).unwrap();
        assert_eq!(&out, b"through the pipe");
    }

    #[test]
    fn test_empty_pipe_would_block() {
        let handles = Handles::open().unwrap();
        let (dst, _peer) = UnixStream::pair().unwrap();
        let err = handles.drain(dst.as_raw_fd(), 0, 64).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::WouldBlock);
    }
}
