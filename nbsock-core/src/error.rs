//! Error types shared by the socket crates.

use std::fmt;
use std::time::Duration;

/// Result type for socket operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur on the socket surface.
#[derive(Debug)]
pub enum Error {
    /// A socket was used in a state it does not support (double configure,
    /// accept on a non-listening handle, I/O on an unconnected handle).
    Configuration(String),

    /// Address resolution, connect, bind, listen or accept failed at the OS
    /// level.
    Connection {
        /// What failed, with the OS message.
        message: String,
        /// Raw OS error code, when one was reported.
        code: Option<i32>,
    },

    /// The peer closed the connection gracefully and nothing was pending.
    Disconnected,

    /// A non-blocking write stayed not-ready through the bounded retry
    /// budget.
    IoTimeout {
        /// Retries performed before giving up.
        retries: usize,
    },

    /// A timed read did not reach its completion condition before the
    /// deadline.
    Timeout {
        /// The caller-supplied deadline.
        timeout: Duration,
        /// Bytes accumulated when the deadline passed.
        received: usize,
        /// Which completion condition was pending.
        waiting_for: String,
    },

    /// More data arrived than the caller-declared ceiling permits.
    ExcessData {
        /// Bytes that would have been accumulated.
        received: usize,
        /// The declared ceiling.
        limit: usize,
    },

    /// The TLS engine reported a fatal handshake failure.
    Handshake(String),

    /// The handshake did not complete within its total budget.
    HandshakeTimeout {
        /// Wall-clock time spent stepping the handshake.
        elapsed: Duration,
    },

    /// `handshake()` was called on an already-established session.
    AlreadyHandshaken,

    /// The same-thread driver was given two sockets whose handshake states
    /// cannot be paired.
    IncompatibleHandshakeStates,

    /// The certificate file could not be loaded into the TLS context.
    Certificate(String),

    /// The private key file could not be loaded into the TLS context.
    Key(String),

    /// The certificate and private key do not form a pair.
    KeyMismatch,

    /// The TLS engine failed outside the handshake path.
    Io {
        /// What failed, with the engine message.
        message: String,
        /// Raw OS error code, when one was reported.
        code: Option<i32>,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Configuration(msg) => write!(f, "invalid socket use: {}", msg),
            Error::Connection { message, code: Some(code) } => {
                write!(f, "connection failed: {} (os error {})", message, code)
            },
            Error::Connection { message, code: None } => {
                write!(f, "connection failed: {}", message)
            },
            Error::Disconnected => write!(f, "socket was closed by the peer"),
            Error::IoTimeout { retries } => {
                write!(f, "I/O still not ready after {} retries", retries)
            },
            Error::Timeout { timeout, received, waiting_for } => write!(
                f,
                "wait of {:?} expired before {} (received {} bytes)",
                timeout, waiting_for, received
            ),
            Error::ExcessData { received, limit } => write!(
                f,
                "received more data ({} bytes) than the declared maximum ({} bytes)",
                received, limit
            ),
            Error::Handshake(msg) => write!(f, "TLS handshake failed: {}", msg),
            Error::HandshakeTimeout { elapsed } => {
                write!(f, "TLS handshake did not complete within {:?}", elapsed)
            },
            Error::AlreadyHandshaken => write!(f, "TLS handshake already completed"),
            Error::IncompatibleHandshakeStates => {
                write!(f, "sockets are not in pairable handshake states")
            },
            Error::Certificate(msg) => write!(f, "could not load certificate: {}", msg),
            Error::Key(msg) => write!(f, "could not load private key: {}", msg),
            Error::KeyMismatch => write!(f, "certificate and private key do not match"),
            Error::Io { message, code: Some(code) } => {
                write!(f, "I/O failed: {} (os error {})", message, code)
            },
            Error::Io { message, code: None } => write!(f, "I/O failed: {}", message),
        }
    }
}

impl std::error::Error for Error {}

impl Error {
    /// Wrap an OS-level failure of `operation` as a connection error.
    pub fn connection(operation: &str, err: &std::io::Error) -> Error {
        Error::Connection {
            message: format!("{}: {}", operation, err),
            code: err.raw_os_error(),
        }
    }
}
