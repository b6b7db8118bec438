// src/lib.rs
//! # Zero-Copy Connection Transfer
//!
//! Moves bytes from one duplex connection to another without copying them
//! through user space when the platform allows it, and falls back to a
//! pooled buffered copy otherwise. Built for proxies and relays that shuttle
//! traffic between two sockets.
//!
//! Features:
//! - `splice(2)` through pooled kernel pipes on Linux
//! - Private shared-memory segments as the conduit on BSD and macOS
//! - Sharded context pool with lazy background reclamation of idle pipes
//! - Capacity-keyed buffer pools for the fallback, zeroed on return
//! - One bounded chunk per call; backpressure is reported, never spun on
//!
//! ```no_run
//! use splicebuf::prelude::*;
//! use std::net::TcpStream;
//!
//! let mut client = TcpStream::connect("127.0.0.1:9000")?;
//! let mut upstream = TcpStream::connect("127.0.0.1:9001")?;
//! loop {
//!     match splicebuf::transfer(&mut upstream, &mut client, None, 64 * 1024) {
//!         Ok(_) => {}
//!         Err(e) if e.is_eof() => break,
//!         Err(e) if e.is_would_block() => { /* wait for readiness */ }
//!         Err(e) => return Err(e.into()),
//!     }
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bucket;
pub mod config;
pub mod connection;
pub mod context;
pub mod engine;
pub mod error;
pub mod fallback;
pub mod pool;
pub mod splice;

// Re-export main types
pub use bucket::Bucket;
pub use config::{MAX_SPLICE_SIZE, SpliceConfig};
pub use connection::{Connection, Descriptor};
pub use context::{CONDUIT_KIND, ConduitKind, Context};
pub use engine::{Engine, acquire_context, configure, release_all, release_context};
pub use error::{ResultExt, Result, SpliceError, TransferError};
pub use pool::{BucketStats, BufferRegistry, PooledBuf, SizedBufferPool, SizedPoolStats};
pub use splice::transfer;

/// Commonly used imports.
pub mod prelude {
    pub use crate::bucket::Bucket;
    pub use crate::config::SpliceConfig;
    pub use crate::connection::Connection;
    pub use crate::context::{ConduitKind, Context};
    pub use crate::engine::Engine;
    pub use crate::error::{ResultExt, SpliceError, TransferError};
    pub use crate::pool::{BucketStats, BufferRegistry};
}

#[cfg(test)]
mod tests {
    use super::prelude::*;
    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};

    fn pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let a = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (b, _) = listener.accept().unwrap();
        (a, b)
    }

    #[test]
    fn test_global_transfer() {
        let (mut client, mut inbound) = pair();
        let (mut outbound, mut server) = pair();

        client.write_all(b"Hello world").unwrap();
        let mut moved = 0;
        while moved < 11 {
            moved += crate::transfer(&mut outbound, &mut inbound, None, 1024).unwrap();
        }
        assert_eq!(moved, 11);

        let mut out = [0u8; 11];
        server.read_exact(&mut out).unwrap();
        assert_eq!(&out, b"Hello world");
    }

    #[test]
    fn test_global_engine_is_shared() {
        let a = Engine::global() as *const Engine;
        let b = Engine::global() as *const Engine;
        assert_eq!(a, b);
        assert!(Engine::global().shard_count() >= 1);
        assert_eq!(
            crate::configure(SpliceConfig::default()),
            Err(SpliceError::AlreadyConfigured)
        );
    }
}
