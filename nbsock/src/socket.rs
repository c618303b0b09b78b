//! TLS-layered socket.

use std::fmt;
use std::thread;
use std::time::{Duration, Instant};

use bytes::{Bytes, BytesMut};
use openssl::ssl::{ErrorCode, Ssl, SslRef, SslStream};

use nbsock_core::backoff::retry_interval;
use nbsock_core::transport::{self, Transport};
use nbsock_core::{config, Error, Result, TcpSocket};

use crate::context::ContextHandle;

/// Total wall-clock budget for completing a handshake.
pub(crate) const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(1);

/// Where a socket stands in the TLS negotiation.
///
/// Client-constructed sockets start at `Connect`, server-accepted sockets at
/// `Accept`. `Established` is terminal; only a disconnect resets the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    /// This side initiates the handshake.
    Connect,

    /// This side answers the handshake.
    Accept,

    /// The handshake completed; application data can flow.
    Established,
}

/// Outcome of a single handshake step.
pub(crate) enum HandshakeProgress {
    /// The engine finished the negotiation.
    Established,

    /// The engine needs I/O the peer has not produced yet.
    WouldBlock,
}

/// The engine session, before and after it is mounted on the socket.
///
/// The session starts `Pending` so the hostname extension can still be
/// attached; the first handshake step mounts it onto the socket for good.
enum Session {
    Pending { ssl: Ssl, socket: TcpSocket },
    Active(SslStream<TcpSocket>),
}

/// A TLS socket: a plain [`TcpSocket`] with an engine session layered on
/// top, driven through a `Connect`/`Accept`/`Established` state machine.
///
/// `send` and `receive` complete the handshake on first use; the handshake
/// can also be driven explicitly with [`TlsSocket::handshake`] or, for two
/// sockets owned by one thread, [`crate::establish_handshake`].
///
/// # Example
///
/// ```rust,no_run
/// use std::time::Duration;
/// use nbsock::TlsSocket;
///
/// # fn example() -> nbsock::Result<()> {
/// let mut socket = TlsSocket::new()?;
/// socket.connect("example.com", 443)?;
/// socket.set_virtual_host("example.com")?;
/// socket.send_str("GET / HTTP/1.1\r\nHost: example.com\r\n\r\n")?;
/// let (head, _) = socket.receive_until_delimiter(b"\r\n\r\n", Duration::from_secs(5), 64 * 1024)?;
/// # Ok(())
/// # }
/// ```
pub struct TlsSocket {
    session: Option<Session>,
    state: HandshakeState,
    context: ContextHandle,
}

impl TlsSocket {
    /// Create an unconfigured TLS socket.
    ///
    /// Acquires the shared TLS context for the lifetime of the value.
    pub fn new() -> Result<TlsSocket> {
        Ok(TlsSocket {
            session: None,
            state: HandshakeState::Connect,
            context: ContextHandle::acquire()?,
        })
    }

    /// Wrap a server-accepted socket and its pre-bound session.
    pub(crate) fn accepted(ssl: Ssl, socket: TcpSocket, context: ContextHandle) -> TlsSocket {
        TlsSocket {
            session: Some(Session::Pending { ssl, socket }),
            state: HandshakeState::Accept,
            context,
        }
    }

    /// Connect the underlying socket and allocate an engine session.
    ///
    /// The handshake is not started here; it runs on first I/O or through
    /// [`TlsSocket::handshake`]. Fails with [`Error::Configuration`] if a
    /// session is already bound.
    pub fn connect(&mut self, address: &str, port: u16) -> Result<()> {
        if self.session.is_some() {
            return Err(Error::Configuration("the TLS socket is already configured".into()));
        }

        let mut socket = TcpSocket::new();
        socket.connect(address, port)?;
        let ssl = self.context.new_session()?;
        self.session = Some(Session::Pending { ssl, socket });
        self.state = HandshakeState::Connect;
        tracing::debug!(address, port, "TLS socket connected, handshake pending");
        Ok(())
    }

    /// Free the session, disconnect the underlying socket, and reset the
    /// handshake state to `Connect`. Idempotent.
    pub fn disconnect(&mut self) {
        match self.session.take() {
            Some(Session::Active(mut stream)) => {
                // Best-effort close_notify so the peer sees a clean end of
                // stream rather than a transport-level surprise.
                let _ = stream.shutdown();
                stream.get_mut().disconnect();
            },
            Some(Session::Pending { mut socket, .. }) => socket.disconnect(),
            None => {},
        }
        self.state = HandshakeState::Connect;
    }

    /// Peer IPv4 address in dotted-decimal form, or `"0.0.0.0"` when not
    /// connected.
    pub fn ipv4_address(&self) -> &str {
        match &self.session {
            Some(Session::Pending { socket, .. }) => socket.ipv4_address(),
            Some(Session::Active(stream)) => stream.get_ref().ipv4_address(),
            None => "0.0.0.0",
        }
    }

    /// Peer port, or 0 when not connected.
    pub fn ipv4_port(&self) -> u16 {
        match &self.session {
            Some(Session::Pending { socket, .. }) => socket.ipv4_port(),
            Some(Session::Active(stream)) => stream.get_ref().ipv4_port(),
            None => 0,
        }
    }

    /// Whether the underlying socket holds an established connection.
    pub fn is_connected(&self) -> bool {
        match &self.session {
            Some(Session::Pending { socket, .. }) => socket.is_connected(),
            Some(Session::Active(stream)) => stream.get_ref().is_connected(),
            None => false,
        }
    }

    /// Current handshake state.
    pub fn handshake_state(&self) -> HandshakeState {
        self.state
    }

    fn ssl_ref(&self) -> Option<&SslRef> {
        match &self.session {
            Some(Session::Pending { ssl, .. }) => Some(ssl),
            Some(Session::Active(stream)) => Some(stream.ssl()),
            None => None,
        }
    }

    /// Name of the negotiated cipher, or an empty string when no session is
    /// bound or nothing was negotiated yet.
    pub fn cipher(&self) -> String {
        self.ssl_ref()
            .and_then(|ssl| ssl.current_cipher())
            .map(|cipher| cipher.name().to_string())
            .unwrap_or_default()
    }

    /// Negotiated protocol version string, or an empty string when no
    /// session is bound.
    pub fn protocol_version(&self) -> String {
        self.ssl_ref().map(|ssl| ssl.version_str().to_string()).unwrap_or_default()
    }

    /// Attach a Server Name Indication host name for servers hosting
    /// multiple sites.
    ///
    /// Only effective while the session has not started handshaking; a
    /// no-op when no session is bound.
    pub fn set_virtual_host(&mut self, hostname: &str) -> Result<()> {
        match &mut self.session {
            Some(Session::Pending { ssl, .. }) => ssl
                .set_hostname(hostname)
                .map_err(|e| Error::Configuration(format!("setting the virtual host name: {e}"))),
            _ => Ok(()),
        }
    }

    /// Mount a pending session onto its socket and return the active stream.
    fn activate_session(&mut self) -> Result<&mut SslStream<TcpSocket>> {
        if matches!(self.session, Some(Session::Pending { .. })) {
            let Some(Session::Pending { ssl, socket }) = self.session.take() else {
                return Err(Error::Configuration("the TLS socket is not connected".into()));
            };
            let stream = SslStream::new(ssl, socket)
                .map_err(|e| Error::Handshake(format!("binding the session to the socket: {e}")))?;
            self.session = Some(Session::Active(stream));
        }

        match &mut self.session {
            Some(Session::Active(stream)) => Ok(stream),
            _ => Err(Error::Configuration("the TLS socket is not connected".into())),
        }
    }

    /// Run one engine handshake step for the current state.
    pub(crate) fn handshake_step(&mut self) -> Result<HandshakeProgress> {
        let state = self.state;
        if state == HandshakeState::Established {
            return Err(Error::AlreadyHandshaken);
        }

        let stream = self.activate_session()?;
        let result = if state == HandshakeState::Connect {
            stream.connect()
        } else {
            stream.accept()
        };

        match result {
            Ok(()) => {
                self.state = HandshakeState::Established;
                tracing::debug!(?state, "TLS handshake established");
                Ok(HandshakeProgress::Established)
            },
            Err(e)
                if e.code() == ErrorCode::WANT_READ || e.code() == ErrorCode::WANT_WRITE =>
            {
                Ok(HandshakeProgress::WouldBlock)
            },
            Err(e) => Err(Error::Handshake(format!(
                "engine code {}: {}",
                e.code().as_raw(),
                e
            ))),
        }
    }

    /// Complete the handshake for this socket's current role.
    ///
    /// Steps the engine with proportional backoff while it reports
    /// would-block, failing with [`Error::HandshakeTimeout`] once the total
    /// budget elapses, and with [`Error::AlreadyHandshaken`] if the
    /// handshake already completed.
    pub fn handshake(&mut self) -> Result<()> {
        let started = Instant::now();
        let mut retries = 0;
        loop {
            match self.handshake_step()? {
                HandshakeProgress::Established => return Ok(()),
                HandshakeProgress::WouldBlock => {
                    let elapsed = started.elapsed();
                    if elapsed >= HANDSHAKE_TIMEOUT {
                        return Err(Error::HandshakeTimeout { elapsed });
                    }
                    thread::sleep(retry_interval(retries));
                    retries += 1;
                },
            }
        }
    }

    /// Mark the handshake complete without stepping the engine.
    ///
    /// Used by the same-thread driver: a stream handshake finishing on one
    /// side implies the other side finished too.
    pub(crate) fn mark_established(&mut self) {
        self.state = HandshakeState::Established;
    }

    /// Encrypt and send all of `data`, completing the handshake first if
    /// needed.
    ///
    /// Writes in chunks of at most [`config::PACKET_SIZE`], advancing by the
    /// bytes the engine actually took, with bounded proportional backoff
    /// while the engine reports would-block.
    pub fn send(&mut self, data: &[u8]) -> Result<()> {
        if !self.is_connected() {
            return Err(Error::Configuration(
                "the TLS socket must be connected to send data".into(),
            ));
        }
        if self.state != HandshakeState::Established {
            self.handshake()?;
        }
        if data.is_empty() {
            return Ok(());
        }
        let Some(Session::Active(stream)) = &mut self.session else {
            return Err(Error::Configuration("the TLS socket is not connected".into()));
        };

        let mut offset = 0;
        let mut retries = 0;
        while offset < data.len() {
            let end = usize::min(offset + config::PACKET_SIZE, data.len());
            match stream.ssl_write(&data[offset..end]) {
                Ok(0) => {
                    return Err(Error::Io {
                        message: "TLS send accepted zero bytes".into(),
                        code: None,
                    })
                },
                Ok(written) => {
                    offset += written;
                    retries = 0;
                },
                Err(e)
                    if e.code() == ErrorCode::WANT_READ || e.code() == ErrorCode::WANT_WRITE =>
                {
                    if retries >= config::MAX_RETRIES {
                        return Err(Error::IoTimeout { retries });
                    }
                    thread::sleep(retry_interval(retries));
                    retries += 1;
                },
                Err(e) => {
                    return Err(Error::Io {
                        message: format!("TLS send failed (engine code {}): {}", e.code().as_raw(), e),
                        code: e.io_error().and_then(|io| io.raw_os_error()),
                    })
                },
            }
        }
        Ok(())
    }

    /// Send UTF-8 text as raw bytes.
    pub fn send_str(&mut self, text: &str) -> Result<()> {
        self.send(text.as_bytes())
    }

    /// Decrypt and drain whatever the engine can produce right now,
    /// completing the handshake first if needed.
    ///
    /// Returns an empty buffer when nothing is ready. A clean end of stream
    /// with nothing collected in this call is [`Error::Disconnected`]; a
    /// transport-level failure with an empty engine error queue is
    /// classified by the plain socket underneath, so peer-initiated closes
    /// surface exactly as they do without TLS.
    pub fn receive(&mut self) -> Result<Bytes> {
        if !self.is_connected() {
            return Err(Error::Configuration(
                "the TLS socket must be connected to receive data".into(),
            ));
        }
        if self.state != HandshakeState::Established {
            self.handshake()?;
        }
        let Some(Session::Active(stream)) = &mut self.session else {
            return Err(Error::Configuration("the TLS socket is not connected".into()));
        };

        let mut chunk = [0u8; config::PACKET_SIZE];
        let mut accumulated = BytesMut::new();
        loop {
            match stream.ssl_read(&mut chunk) {
                Ok(0) => break,
                Ok(received) => {
                    accumulated.extend_from_slice(&chunk[..received]);
                    if received < config::PACKET_SIZE {
                        break;
                    }
                },
                Err(e)
                    if e.code() == ErrorCode::WANT_READ || e.code() == ErrorCode::WANT_WRITE =>
                {
                    break;
                },
                Err(_) if !accumulated.is_empty() => break,
                Err(e) if e.code() == ErrorCode::ZERO_RETURN => return Err(Error::Disconnected),
                Err(e) if e.code() == ErrorCode::SYSCALL && e.ssl_error().is_none() => {
                    // The transport failed underneath the engine with nothing
                    // queued to explain it; let the plain socket classify the
                    // condition (typically a peer-initiated close).
                    let verdict = stream.get_mut().receive();
                    return match verdict {
                        Err(err) => Err(err),
                        Ok(_) => Err(Error::Io {
                            message: format!(
                                "TLS receive failed (engine code {}): {}",
                                e.code().as_raw(),
                                e
                            ),
                            code: e.io_error().and_then(|io| io.raw_os_error()),
                        }),
                    };
                },
                Err(e) => {
                    return Err(Error::Io {
                        message: format!(
                            "TLS receive failed (engine code {}): {}",
                            e.code().as_raw(),
                            e
                        ),
                        code: e.io_error().and_then(|io| io.raw_os_error()),
                    })
                },
            }
        }
        Ok(accumulated.freeze())
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

impl Transport for TlsSocket {
    fn receive(&mut self) -> Result<Bytes> {
        TlsSocket::receive(self)
    }
}

impl fmt::Debug for TlsSocket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsSocket")
            .field("state", &self.state)
            .field("peer", &format_args!("{}:{}", self.ipv4_address(), self.ipv4_port()))
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}
