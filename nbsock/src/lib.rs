//! # nbsock
//!
//! TLS-layered non-blocking TCP sockets.
//!
//! This crate adds the TLS layer on top of [`nbsock_core`]:
//! - [`TlsSocket`]: a plain socket with an engine session and a
//!   `Connect`/`Accept`/`Established` handshake state machine
//! - [`TlsServer`]: a listener that configures the shared TLS context with a
//!   certificate/key pair and hands out accepted TLS sockets
//! - [`establish_handshake`]: cooperative same-thread driving of two
//!   handshakes that would deadlock if each blocked on its own
//!
//! The TLS engine itself (record layer, certificates, cipher negotiation) is
//! OpenSSL, reached through the `openssl` crate; this crate owns only the
//! connection handles, the handshake state, and the buffer shuttling.
//!
//! The core surface (plain sockets, servers, timed read algorithms, errors)
//! is re-exported, so depending on this crate alone is enough.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use nbsock::TlsSocket;
//!
//! # fn example() -> nbsock::Result<()> {
//! let mut socket = TlsSocket::new()?;
//! socket.connect("example.com", 443)?;
//! socket.set_virtual_host("example.com")?;
//! socket.send_str("GET / HTTP/1.1\r\nHost: example.com\r\nConnection: close\r\n\r\n")?;
//! let (head, _) = socket.receive_until_delimiter(b"\r\n\r\n", Duration::from_secs(5), 64 * 1024)?;
//! println!("{}", String::from_utf8_lossy(&head));
//! # Ok(())
//! # }
//! ```
//!
//! Every operation is synchronous: calls may sleep between internal retries,
//! no threads are spawned, and socket values must not be shared across
//! threads without external coordination.

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    unused_qualifications
)]
#![forbid(unsafe_code)]

// Re-export the core crate
pub use nbsock_core;

// TLS modules
mod context;
mod driver;
mod server;
mod socket;

// Re-exports
pub use driver::establish_handshake;
pub use nbsock_core::{backoff, config, error, transport};
pub use nbsock_core::{Error, NativeSocket, Result, TcpServer, TcpSocket, Transport};
pub use server::TlsServer;
pub use socket::{HandshakeState, TlsSocket};
