//! Plain TCP socket.

use std::io::{self, Read, Write};
use std::time::Duration;

use bytes::{Bytes, BytesMut};

use crate::error::Result;
use crate::native::NativeSocket;
use crate::transport::{self, Transport};

/// A plain TCP socket: the native primitive plus the timed read utilities.
///
/// Move-only; dropping the value closes the connection. Each instance must
/// stay owned by a single thread, since no operation takes internal locks.
///
/// # Example
///
/// ```rust,no_run
/// use std::time::Duration;
/// use nbsock_core::TcpSocket;
///
/// # fn example() -> nbsock_core::Result<()> {
/// let mut socket = TcpSocket::new();
/// socket.connect("127.0.0.1", 7000)?;
/// socket.send_str("hello")?;
/// let (reply, end) = socket.receive_until_delimiter(b"\n", Duration::from_secs(2), 64 * 1024)?;
/// println!("got {} bytes up to the newline at {}", reply.len(), end);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct TcpSocket {
    native: NativeSocket,
}

impl TcpSocket {
    /// Create an unconfigured socket.
    pub fn new() -> TcpSocket {
        TcpSocket { native: NativeSocket::new() }
    }

    /// Wrap an already-connected native handle.
    pub(crate) fn from_native(native: NativeSocket) -> TcpSocket {
        TcpSocket { native }
    }

    /// Resolve `address` and connect to `address:port`, non-blocking once
    /// connected.
    pub fn connect(&mut self, address: &str, port: u16) -> Result<()> {
        self.native.connect(address, port)
    }

    /// Shut down and release the connection; idempotent.
    pub fn disconnect(&mut self) {
        self.native.disconnect();
    }

    /// Peer IPv4 address in dotted-decimal form, or `"0.0.0.0"` when not
    /// connected.
    pub fn ipv4_address(&self) -> &str {
        self.native.ipv4_address()
    }

    /// Peer port, or 0 when not connected.
    pub fn ipv4_port(&self) -> u16 {
        self.native.ipv4_port()
    }

    /// Whether the socket holds an established connection.
    pub fn is_connected(&self) -> bool {
        self.native.is_connected()
    }

    /// Send all of `data` with bounded retry on a not-ready socket.
    pub fn send(&mut self, data: &[u8]) -> Result<()> {
        self.native.send(data)
    }

    /// Send UTF-8 text as raw bytes.
    pub fn send_str(&mut self, text: &str) -> Result<()> {
        self.native.send(text.as_bytes())
    }

    /// Drain everything currently readable without blocking; empty when
    /// nothing is pending.
    pub fn receive(&mut self) -> Result<Bytes> {
        self.native.receive()
    }

    /// Receive until `delimiter` appears; see
    /// [`transport::receive_until_delimiter`].
    pub fn receive_until_delimiter(
        &mut self,
        delimiter: &[u8],
        timeout: Duration,
        max_size: usize,
    ) -> Result<(Bytes, usize)> {
        transport::receive_until_delimiter(self, delimiter, timeout, max_size)
    }

    /// Receive exactly `total_size` bytes; see
    /// [`transport::receive_until_size`].
    pub fn receive_until_size(&mut self, total_size: usize, timeout: Duration) -> Result<Bytes> {
        transport::receive_until_size(self, total_size, timeout)
    }

    /// Receive at least `min_size` bytes; see
    /// [`transport::receive_at_least`].
    pub fn receive_at_least(&mut self, min_size: usize, timeout: Duration) -> Result<Bytes> {
        transport::receive_at_least(self, min_size, timeout)
    }

    /// Top `data` up to `total_size` bytes; see
    /// [`transport::receive_remaining`].
    pub fn receive_remaining(
        &mut self,
        data: &mut BytesMut,
        total_size: usize,
        timeout: Duration,
    ) -> Result<()> {
        transport::receive_remaining(self, data, total_size, timeout)
    }
}

impl Transport for TcpSocket {
    fn receive(&mut self) -> Result<Bytes> {
        self.native.receive()
    }
}

/// Raw single-shot read, for mounting stream adapters (such as a TLS engine)
/// on top of the socket; surfaces `WouldBlock`.
impl Read for TcpSocket {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.native.read(buf)
    }
}

/// Raw single-shot write; surfaces `WouldBlock`.
impl Write for TcpSocket {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.native.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.native.flush()
    }
}
