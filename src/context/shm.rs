// src/context/shm.rs
//! Shared-memory conduit for platforms without `splice(2)`.
//!
//! A private System V segment stands in for the pipe: leg 1 reads from the
//! source descriptor straight into the mapping and leg 2 writes out of it.

use super::ConduitKind;
use crate::config::MAX_SPLICE_SIZE;
use crate::connection::Descriptor;
use std::io;
use std::ptr::NonNull;

pub(super) const SUPPORTED: bool = true;
pub(super) const KIND: ConduitKind = ConduitKind::SharedMemory;
pub(super) const CAPACITY: usize = MAX_SPLICE_SIZE;

/// One attached private shared-memory segment.
pub(crate) struct Handles {
    shmid: libc::c_int,
    addr: NonNull<u8>,
}

// SAFETY: the mapping is process-wide memory; exclusive use is guaranteed by
// `Context` being an owned, non-`Clone` value handed out to one transfer.
unsafe impl Send for Handles {}
// SAFETY: see above; shared references only read the id and address.
unsafe impl Sync for Handles {}

impl Handles {
    pub(super) fn open() -> io::Result<Self> {
        // SAFETY: plain syscall with constant arguments.
        let shmid = unsafe { libc::shmget(libc::IPC_PRIVATE, CAPACITY, libc::IPC_CREAT | 0o600) };
        if shmid < 0 {
            return Err(io::Error::last_os_error());
        }
        // SAFETY: `shmid` was just created; a null address lets the kernel choose.
        let addr = unsafe { libc::shmat(shmid, std::ptr::null(), 0) };
        if addr as isize == -1 {
            let err = io::Error::last_os_error();
            // SAFETY: removing a segment we own and never attached.
            unsafe { libc::shmctl(shmid, libc::IPC_RMID, std::ptr::null_mut()) };
            return Err(err);
        }
        let addr = NonNull::new(addr as *mut u8)
            .ok_or_else(|| io::Error::other("shmat returned a null mapping"))?;
        Ok(Self { shmid, addr })
    }

    /// Reads up to `len` bytes from `src` into the segment.
    pub(crate) fn fill(&self, src: Descriptor, len: usize) -> io::Result<usize> {
        let len = len.min(CAPACITY);
        // SAFETY: the mapping is CAPACITY bytes long and `len` is clamped to it.
        let ret = unsafe { libc::read(src, self.addr.as_ptr().cast(), len) };
        if ret < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(ret as usize)
        }
    }

    /// Writes `len` staged bytes starting at `offset` into `dst`.
    pub(crate) fn drain(&self, dst: Descriptor, offset: usize, len: usize) -> io::Result<usize> {
        if offset.saturating_add(len) > CAPACITY {
            return Err(io::Error::from(io::ErrorKind::InvalidInput));
        }
        // SAFETY: `offset + len` was checked against the mapping length.
        let ret = unsafe { libc::write(dst, self.addr.as_ptr().add(offset).cast(), len) };
        if ret < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(ret as usize)
        }
    }
}

impl Drop for Handles {
    fn drop(&mut self) {
        // SAFETY: the segment was created and attached in `open`, and this is
        // the only place that detaches it.
        unsafe {
            libc::shmctl(self.shmid, libc::IPC_RMID, std::ptr::null_mut());
            libc::shmdt(self.addr.as_ptr().cast());
        }
    }
}
