//! # nbsock-core
//!
//! Non-blocking TCP socket primitives with bounded retry/backoff I/O.
//!
//! This crate provides the transport layer of the `nbsock` workspace:
//! - The native socket primitive: one OS handle, move-only, explicit
//!   unconfigured/listening/connected state
//! - Proportional retry backoff for not-ready operations
//! - Timed read algorithms (`until delimiter`, `exact size`, `at least`)
//!   generic over any [`Transport`]
//! - The plain TCP socket and listening server built from the above
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │        TLS layering (nbsock)            │
//! └─────────────────┬───────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────┐
//! │      nbsock-core (this crate)           │
//! │  ┌──────────────────────────────────┐   │
//! │  │   TcpSocket / TcpServer          │   │
//! │  ├──────────────────────────────────┤   │
//! │  │   Timed read algorithms          │   │
//! │  ├──────────────────────────────────┤   │
//! │  │   Retry backoff                  │   │
//! │  ├──────────────────────────────────┤   │
//! │  │   Native socket primitive        │   │
//! │  └──────────────────────────────────┘   │
//! └─────────────────┬───────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────┐
//! │   std::net + per-OS readiness probe     │
//! └─────────────────────────────────────────┘
//! ```
//!
//! Every operation is synchronous and single-threaded: calls may sleep
//! between internal retries but the crate never spawns threads, and socket
//! values must not be shared across threads without external coordination.

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    unused_qualifications
)]
#![deny(unsafe_code)]

// Core modules
pub mod backoff;
pub mod config;
pub mod error;
pub mod transport;

mod native;
mod server;
mod socket;
mod sys;

// Re-exports
pub use error::{Error, Result};
pub use native::NativeSocket;
pub use server::TcpServer;
pub use socket::TcpSocket;
pub use transport::Transport;
