// src/context/unsupported.rs
//! Placeholder conduit for platforms with no zero-copy path.

use super::ConduitKind;
use crate::connection::Descriptor;
use std::io;

pub(super) const SUPPORTED: bool = false;
pub(super) const KIND: ConduitKind = ConduitKind::Unsupported;
pub(super) const CAPACITY: usize = 0;

/// Uninhabited: no conduit can be opened on this platform.
pub(crate) enum Handles {}

impl Handles {
    pub(super) fn open() -> io::Result<Self> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "zero-copy conduit not available on this platform",
        ))
    }

    pub(crate) fn fill(&self, _src: Descriptor, _len: usize) -> io::Result<usize> {
        match *self {}
    }

    pub(crate) fn drain(&self, _dst: Descriptor, _offset: usize, _len: usize) -> io::Result<usize> {
        match *self {}
    }
}
