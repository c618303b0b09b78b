//! Plain TCP listening server.

use crate::error::Result;
use crate::native::NativeSocket;
use crate::socket::TcpSocket;

/// A listening TCP socket that hands out connected [`TcpSocket`] values.
///
/// `accept` never blocks; callers poll it (or [`TcpServer::has_client`])
/// from their own loop or thread.
///
/// # Example
///
/// ```rust,no_run
/// use nbsock_core::TcpServer;
///
/// # fn example() -> nbsock_core::Result<()> {
/// let mut server = TcpServer::new();
/// server.listen(7000)?;
/// loop {
///     if let Some(mut client) = server.accept()? {
///         let data = client.receive()?;
///         client.send(&data)?;
///     }
/// }
/// # }
/// ```
#[derive(Debug, Default)]
pub struct TcpServer {
    native: NativeSocket,
}

impl TcpServer {
    /// Create a server that is not yet listening.
    pub fn new() -> TcpServer {
        TcpServer { native: NativeSocket::new() }
    }

    /// Bind `0.0.0.0:port` and start listening, non-blocking.
    ///
    /// Port 0 picks an ephemeral port; [`TcpServer::ipv4_port`] reports the
    /// port actually bound.
    pub fn listen(&mut self, port: u16) -> Result<()> {
        self.native.listen(port)
    }

    /// Port the server is bound to, or 0 when not listening.
    pub fn ipv4_port(&self) -> u16 {
        self.native.ipv4_port()
    }

    /// Whether the server is listening.
    pub fn is_listening(&self) -> bool {
        self.native.is_listening()
    }

    /// Whether a connection is already queued, without accepting it.
    pub fn has_client(&self) -> bool {
        self.native.has_client()
    }

    /// Accept one queued connection, if any.
    pub fn accept(&mut self) -> Result<Option<TcpSocket>> {
        Ok(self.native.accept()?.map(TcpSocket::from_native))
    }
}
