//! Non-blocking native socket primitive.
//!
//! [`NativeSocket`] owns at most one OS-level stream socket and is the only
//! type in the workspace that talks to the operating system. It is move-only:
//! dropping it shuts the connection down and releases the descriptor.
//!
//! The handle is always in exactly one of three states, and the state is
//! explicit rather than inferred from address values, so an accepted handle
//! can never be mistaken for a listener or vice versa.

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpListener, TcpStream, ToSocketAddrs};
use std::thread;

use bytes::{Bytes, BytesMut};

use crate::backoff::retry_interval;
use crate::config;
use crate::error::{Error, Result};
use crate::sys;

/// Address reported while no peer is attached.
const UNCONFIGURED_ADDRESS: &str = "0.0.0.0";

#[derive(Debug)]
enum SocketState {
    Unconfigured,
    Listening {
        listener: TcpListener,
        port: u16,
    },
    Connected {
        stream: TcpStream,
        peer_address: String,
        peer_port: u16,
    },
}

/// A non-blocking TCP socket handle in one of three states: unconfigured,
/// listening, or connected.
#[derive(Debug)]
pub struct NativeSocket {
    state: SocketState,
}

impl Default for NativeSocket {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeSocket {
    /// Create an unconfigured handle.
    pub fn new() -> NativeSocket {
        NativeSocket { state: SocketState::Unconfigured }
    }

    /// Peer IPv4 address in dotted-decimal form, or `"0.0.0.0"` when not
    /// connected.
    pub fn ipv4_address(&self) -> &str {
        match &self.state {
            SocketState::Connected { peer_address, .. } => peer_address,
            _ => UNCONFIGURED_ADDRESS,
        }
    }

    /// Peer port when connected, bound port when listening, 0 otherwise.
    pub fn ipv4_port(&self) -> u16 {
        match &self.state {
            SocketState::Connected { peer_port, .. } => *peer_port,
            SocketState::Listening { port, .. } => *port,
            SocketState::Unconfigured => 0,
        }
    }

    /// Whether the handle holds an established connection.
    pub fn is_connected(&self) -> bool {
        matches!(self.state, SocketState::Connected { .. })
    }

    /// Whether the handle is listening for connections.
    pub fn is_listening(&self) -> bool {
        matches!(self.state, SocketState::Listening { .. })
    }

    /// Resolve `address` and connect to `address:port`.
    ///
    /// The socket is switched to non-blocking mode once connected. Fails
    /// with [`Error::Configuration`] if the handle is already configured.
    pub fn connect(&mut self, address: &str, port: u16) -> Result<()> {
        if !matches!(self.state, SocketState::Unconfigured) {
            return Err(Error::Configuration("the socket is already configured".into()));
        }

        let target = (address, port)
            .to_socket_addrs()
            .map_err(|e| Error::connection(&format!("resolving '{address}'"), &e))?
            .find(|candidate| candidate.is_ipv4())
            .ok_or_else(|| Error::Connection {
                message: format!("'{address}' did not resolve to an IPv4 address"),
                code: None,
            })?;

        let stream = TcpStream::connect(target)
            .map_err(|e| Error::connection(&format!("connecting to {address}:{port}"), &e))?;
        stream
            .set_nonblocking(true)
            .map_err(|e| Error::connection("switching to non-blocking mode", &e))?;

        tracing::debug!(address, port, "socket connected");
        self.state = SocketState::Connected {
            stream,
            peer_address: address.to_string(),
            peer_port: port,
        };
        Ok(())
    }

    /// Bind `0.0.0.0:port` and start listening, non-blocking.
    ///
    /// Port 0 picks an ephemeral port; [`NativeSocket::ipv4_port`] reports
    /// the port actually bound. Fails with [`Error::Configuration`] if the
    /// handle is already configured.
    pub fn listen(&mut self, port: u16) -> Result<()> {
        if !matches!(self.state, SocketState::Unconfigured) {
            return Err(Error::Configuration("the socket is already configured".into()));
        }

        let listener = TcpListener::bind(("0.0.0.0", port))
            .map_err(|e| Error::connection(&format!("binding port {port}"), &e))?;
        listener
            .set_nonblocking(true)
            .map_err(|e| Error::connection("switching to non-blocking mode", &e))?;
        let bound_port = listener
            .local_addr()
            .map_err(|e| Error::connection("reading the bound address", &e))?
            .port();

        tracing::debug!(port = bound_port, "socket listening");
        self.state = SocketState::Listening { listener, port: bound_port };
        Ok(())
    }

    /// Accept one queued connection, if any.
    ///
    /// Returns `None` when nothing is pending. The accepted handle is
    /// connected, non-blocking, and carries the peer's address and port.
    pub fn accept(&mut self) -> Result<Option<NativeSocket>> {
        let SocketState::Listening { listener, .. } = &self.state else {
            return Err(Error::Configuration(
                "the socket is not listening and cannot accept connections".into(),
            ));
        };

        match listener.accept() {
            Ok((stream, peer)) => {
                stream
                    .set_nonblocking(true)
                    .map_err(|e| Error::connection("switching to non-blocking mode", &e))?;
                tracing::debug!(peer = %peer, "connection accepted");
                Ok(Some(NativeSocket {
                    state: SocketState::Connected {
                        stream,
                        peer_address: peer.ip().to_string(),
                        peer_port: peer.port(),
                    },
                }))
            },
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(Error::connection("accepting a connection", &e)),
        }
    }

    /// Whether a connection is already queued on a listening handle.
    ///
    /// `false` when the handle is not listening.
    pub fn has_client(&self) -> bool {
        match &self.state {
            SocketState::Listening { listener, .. } => sys::listener_readable(listener),
            _ => false,
        }
    }

    /// Send all of `data`, in chunks of at most [`config::PACKET_SIZE`].
    ///
    /// A not-ready socket is retried with proportional backoff up to
    /// [`config::MAX_RETRIES`] times, then fails with [`Error::IoTimeout`].
    /// Partial writes advance by the bytes actually taken.
    pub fn send(&mut self, data: &[u8]) -> Result<()> {
        let SocketState::Connected { stream, .. } = &mut self.state else {
            return Err(Error::Configuration(
                "the socket must be connected to send data".into(),
            ));
        };
        if data.is_empty() {
            return Ok(());
        }

        let mut offset = 0;
        let mut retries = 0;
        while offset < data.len() {
            let end = usize::min(offset + config::PACKET_SIZE, data.len());
            match stream.write(&data[offset..end]) {
                Ok(0) => {
                    return Err(Error::Connection {
                        message: "send accepted zero bytes".into(),
                        code: None,
                    })
                },
                Ok(written) => {
                    offset += written;
                    retries = 0;
                },
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    if retries >= config::MAX_RETRIES {
                        return Err(Error::IoTimeout { retries });
                    }
                    thread::sleep(retry_interval(retries));
                    retries += 1;
                },
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {},
                Err(e) => return Err(Error::connection("sending data", &e)),
            }
        }
        Ok(())
    }

    /// Drain everything currently readable without blocking.
    ///
    /// Returns an empty buffer when no data is pending. A graceful close by
    /// the peer is [`Error::Disconnected`] only when nothing was collected
    /// in this call; otherwise the partial data is returned.
    pub fn receive(&mut self) -> Result<Bytes> {
        let SocketState::Connected { stream, .. } = &mut self.state else {
            return Err(Error::Configuration(
                "the socket must be connected to receive data".into(),
            ));
        };

        let mut chunk = [0u8; config::PACKET_SIZE];
        let mut accumulated = BytesMut::new();
        loop {
            match stream.read(&mut chunk) {
                Ok(0) => {
                    if accumulated.is_empty() {
                        return Err(Error::Disconnected);
                    }
                    break;
                },
                Ok(received) => accumulated.extend_from_slice(&chunk[..received]),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {},
                Err(e) => return Err(Error::connection("receiving data", &e)),
            }
        }
        Ok(accumulated.freeze())
    }

    /// Shut down and release an established connection.
    ///
    /// Idempotent: unconfigured and listening handles are left as they are.
    pub fn disconnect(&mut self) {
        let SocketState::Connected { stream, peer_address, peer_port } = &self.state else {
            return;
        };
        tracing::debug!(peer = %peer_address, port = *peer_port, "socket disconnected");
        let _ = stream.shutdown(Shutdown::Both);
        self.state = SocketState::Unconfigured;
    }
}

impl Drop for NativeSocket {
    fn drop(&mut self) {
        if let SocketState::Connected { stream, .. } = &self.state {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }
}

/// Raw single-shot read; surfaces `WouldBlock` instead of retrying so
/// layered protocols can run their own readiness loops.
impl Read for NativeSocket {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.state {
            SocketState::Connected { stream, .. } => stream.read(buf),
            _ => Err(io::ErrorKind::NotConnected.into()),
        }
    }
}

/// Raw single-shot write; surfaces `WouldBlock` instead of retrying.
impl Write for NativeSocket {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut self.state {
            SocketState::Connected { stream, .. } => stream.write(buf),
            _ => Err(io::ErrorKind::NotConnected.into()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.state {
            SocketState::Connected { stream, .. } => stream.flush(),
            _ => Err(io::ErrorKind::NotConnected.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_socket_reports_sentinels() {
        let socket = NativeSocket::new();
        assert_eq!(socket.ipv4_address(), "0.0.0.0");
        assert_eq!(socket.ipv4_port(), 0);
        assert!(!socket.is_connected());
        assert!(!socket.is_listening());
    }

    #[test]
    fn test_accept_requires_listening() {
        let mut socket = NativeSocket::new();
        assert!(matches!(socket.accept(), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_io_requires_connection() {
        let mut socket = NativeSocket::new();
        assert!(matches!(socket.send(b"x"), Err(Error::Configuration(_))));
        assert!(matches!(socket.receive(), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_listen_twice_is_rejected() {
        let mut socket = NativeSocket::new();
        socket.listen(0).unwrap();
        assert!(socket.is_listening());
        assert!(matches!(socket.listen(0), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_has_client_is_false_without_listener() {
        let socket = NativeSocket::new();
        assert!(!socket.has_client());
    }

    #[test]
    fn test_disconnect_is_idempotent() {
        let mut socket = NativeSocket::new();
        socket.disconnect();
        socket.disconnect();
        assert!(!socket.is_connected());
    }

    #[test]
    fn test_ephemeral_listen_reports_bound_port() {
        let mut socket = NativeSocket::new();
        socket.listen(0).unwrap();
        assert_ne!(socket.ipv4_port(), 0);
    }
}
