// src/error.rs
//! Error types for transfer operations with conversion support

use std::fmt;
use std::io;

/// Errors that can occur while moving bytes between connections
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpliceError {
    /// Source reached a clean end of stream (read returned zero bytes)
    EndOfStream,
    /// Resource temporarily unavailable; retry the call later
    WouldBlock,
    /// The connection cannot expose a descriptor usable for zero-copy
    Unsupported(String),
    /// The context was destroyed (shard released) before it could be used
    Closed,
    /// The process-wide engine was already initialised
    AlreadyConfigured,
    /// Any other I/O error from the underlying connection or kernel
    Io {
        /// Original error kind
        kind: io::ErrorKind,
        /// Rendered error message
        message: String,
    },
}

impl SpliceError {
    /// Returns `true` for the "temporarily unavailable" signal.
    #[inline]
    pub fn is_would_block(&self) -> bool {
        matches!(self, Self::WouldBlock)
    }

    /// Returns `true` for a clean end of stream.
    #[inline]
    pub fn is_eof(&self) -> bool {
        matches!(self, Self::EndOfStream)
    }
}

impl fmt::Display for SpliceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EndOfStream => write!(f, "End of stream"),
            Self::WouldBlock => write!(f, "Resource temporarily unavailable"),
            Self::Unsupported(msg) => write!(f, "Zero-copy unavailable: {}", msg),
            Self::Closed => write!(f, "Splice context already closed"),
            Self::AlreadyConfigured => write!(f, "Splice engine already configured"),
            Self::Io { message, .. } => write!(f, "I/O error: {}", message),
        }
    }
}

impl std::error::Error for SpliceError {}

// ============================================================================
// CONVERSIONS
// ============================================================================

/// Convert std::io::Error to SpliceError
impl From<io::Error> for SpliceError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::WouldBlock => SpliceError::WouldBlock,
            io::ErrorKind::UnexpectedEof => SpliceError::EndOfStream,
            kind => SpliceError::Io {
                kind,
                message: err.to_string(),
            },
        }
    }
}

/// Convert SpliceError to std::io::Error
impl From<SpliceError> for io::Error {
    fn from(err: SpliceError) -> Self {
        match err {
            SpliceError::EndOfStream => io::Error::new(io::ErrorKind::UnexpectedEof, err),
            SpliceError::WouldBlock => io::Error::from(io::ErrorKind::WouldBlock),
            SpliceError::Unsupported(_) => io::Error::new(io::ErrorKind::Unsupported, err),
            SpliceError::Io { kind, message } => io::Error::new(kind, message),
            _ => io::Error::other(err),
        }
    }
}

/// Convert SpliceError to anyhow::Error
#[cfg(feature = "anyhow")]
impl From<SpliceError> for anyhow::Error {
    fn from(err: SpliceError) -> Self {
        anyhow::anyhow!("{}", err)
    }
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, SpliceError>;

// ============================================================================
// TRANSFER ERROR
// ============================================================================

/// A failed (or interrupted) transfer call.
///
/// Carries the exact number of bytes that reached the destination before
/// `error` stopped the call, so callers can account for partial progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferError {
    /// Bytes written to the destination before the error
    pub moved: usize,
    /// Why the call stopped
    pub error: SpliceError,
}

impl TransferError {
    #[inline]
    pub(crate) fn new(moved: usize, error: impl Into<SpliceError>) -> Self {
        Self {
            moved,
            error: error.into(),
        }
    }

    /// Clean end of stream with nothing moved.
    #[inline]
    pub(crate) fn eof() -> Self {
        Self::new(0, SpliceError::EndOfStream)
    }

    /// Returns `true` if the source hit a clean end of stream.
    #[inline]
    pub fn is_eof(&self) -> bool {
        self.error.is_eof()
    }

    /// Returns `true` if the call made no progress because of backpressure.
    #[inline]
    pub fn is_would_block(&self) -> bool {
        self.error.is_would_block()
    }
}

impl fmt::Display for TransferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (after {} bytes)", self.error, self.moved)
    }
}

impl std::error::Error for TransferError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

impl From<TransferError> for io::Error {
    fn from(err: TransferError) -> Self {
        err.error.into()
    }
}

// ============================================================================
// EXTENSION TRAIT FOR EASY CONVERSION
// ============================================================================

/// Extension trait for converting Results between different error types
pub trait ResultExt<T> {
    /// Convert to anyhow::Result
    #[cfg(feature = "anyhow")]
    fn into_anyhow(self) -> anyhow::Result<T>;

    /// Convert to io::Result
    fn into_io(self) -> io::Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    #[cfg(feature = "anyhow")]
    fn into_anyhow(self) -> anyhow::Result<T> {
        self.map_err(|e| e.into())
    }

    fn into_io(self) -> io::Result<T> {
        self.map_err(|e| e.into())
    }
}

impl<T> ResultExt<T> for std::result::Result<T, TransferError> {
    #[cfg(feature = "anyhow")]
    fn into_anyhow(self) -> anyhow::Result<T> {
        self.map_err(|e| anyhow::Error::new(e))
    }

    fn into_io(self) -> io::Result<T> {
        self.map_err(|e| e.into())
    }
}
