//! TLS listening server.

use std::fmt;
use std::path::{Path, PathBuf};

use nbsock_core::{Result, TcpServer};

use crate::context::ContextHandle;
use crate::socket::TlsSocket;

/// A listening socket that hands out [`TlsSocket`] values in the `Accept`
/// handshake state.
///
/// Listening loads the PEM certificate/key pair into the shared TLS context;
/// the handshake of each accepted socket is deferred to its first I/O (or to
/// explicit driving with [`crate::establish_handshake`]).
///
/// # Example
///
/// ```rust,no_run
/// use std::time::Duration;
/// use nbsock::TlsServer;
///
/// # fn example() -> nbsock::Result<()> {
/// let mut server = TlsServer::new()?;
/// server.listen(8443, "cert.pem", "key.pem")?;
/// loop {
///     if let Some(mut client) = server.accept()? {
///         let (request, _) =
///             client.receive_until_delimiter(b"\r\n\r\n", Duration::from_secs(5), 64 * 1024)?;
///         println!("{} bytes from {}", request.len(), client.ipv4_address());
///     }
/// }
/// # }
/// ```
pub struct TlsServer {
    listener: TcpServer,
    certificate_path: PathBuf,
    private_key_path: PathBuf,
    context: ContextHandle,
}

impl TlsServer {
    /// Create a server that is not yet listening.
    ///
    /// Acquires the shared TLS context for the lifetime of the value.
    pub fn new() -> Result<TlsServer> {
        Ok(TlsServer {
            listener: TcpServer::new(),
            certificate_path: PathBuf::new(),
            private_key_path: PathBuf::new(),
            context: ContextHandle::acquire()?,
        })
    }

    /// Load the PEM `certificate`/`private_key` pair into the shared
    /// context, then bind `0.0.0.0:port` and start listening.
    ///
    /// Fails with [`nbsock_core::Error::Certificate`],
    /// [`nbsock_core::Error::Key`] or [`nbsock_core::Error::KeyMismatch`]
    /// when the identity cannot be loaded or does not pair up.
    pub fn listen(
        &mut self,
        port: u16,
        certificate: impl AsRef<Path>,
        private_key: impl AsRef<Path>,
    ) -> Result<()> {
        let certificate = certificate.as_ref();
        let private_key = private_key.as_ref();

        self.context.configure_identity(certificate, private_key)?;
        self.listener.listen(port)?;
        self.certificate_path = certificate.to_path_buf();
        self.private_key_path = private_key.to_path_buf();
        tracing::debug!(port = self.listener.ipv4_port(), "TLS server listening");
        Ok(())
    }

    /// Port the server is bound to, or 0 when not listening.
    pub fn ipv4_port(&self) -> u16 {
        self.listener.ipv4_port()
    }

    /// Whether the server is listening.
    pub fn is_listening(&self) -> bool {
        self.listener.is_listening()
    }

    /// Whether a connection is already queued, without accepting it.
    pub fn has_client(&self) -> bool {
        self.listener.has_client()
    }

    /// Path of the certificate configured at listen time.
    pub fn certificate_path(&self) -> &Path {
        &self.certificate_path
    }

    /// Path of the private key configured at listen time.
    pub fn private_key_path(&self) -> &Path {
        &self.private_key_path
    }

    /// Accept one queued connection, if any, wrapped in a fresh engine
    /// session with its handshake still pending.
    pub fn accept(&mut self) -> Result<Option<TlsSocket>> {
        let Some(socket) = self.listener.accept()? else {
            return Ok(None);
        };
        let ssl = self.context.new_session()?;
        Ok(Some(TlsSocket::accepted(ssl, socket, self.context.clone())))
    }
}

impl fmt::Debug for TlsServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsServer")
            .field("port", &self.ipv4_port())
            .field("listening", &self.is_listening())
            .field("certificate_path", &self.certificate_path)
            .finish_non_exhaustive()
    }
}
