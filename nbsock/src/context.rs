//! Process-wide shared TLS context.
//!
//! The engine context is created lazily the first time any TLS socket or
//! server needs it and freed when the last holder goes away; there is never
//! more than one alive. Holders keep an [`ContextHandle`] (an `Arc`) and a
//! process-wide registry holds only a `Weak`, so "create on first use, free
//! on last release" falls out of the ownership graph instead of a manual
//! reference counter.

use std::path::Path;
use std::sync::{Arc, Mutex, OnceLock, Weak};

use openssl::ssl::{Ssl, SslContext, SslContextBuilder, SslFiletype, SslMethod, SslOptions};

use nbsock_core::{Error, Result};

pub(crate) struct SharedContext {
    context: Mutex<SslContext>,
}

impl Drop for SharedContext {
    fn drop(&mut self) {
        tracing::trace!("TLS context released");
    }
}

/// A handle keeping the shared TLS context alive.
#[derive(Clone)]
pub(crate) struct ContextHandle {
    inner: Arc<SharedContext>,
}

fn registry() -> &'static Mutex<Weak<SharedContext>> {
    static REGISTRY: OnceLock<Mutex<Weak<SharedContext>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(Weak::new()))
}

/// Context defaults shared by the lazily-created context and every
/// certificate-configured replacement.
fn base_builder() -> Result<SslContextBuilder> {
    let mut builder = SslContextBuilder::new(SslMethod::tls()).map_err(|e| Error::Io {
        message: format!("allocating the TLS context: {e}"),
        code: None,
    })?;
    // A bare TCP FIN without close_notify must read as a clean end of
    // stream, the condition the receive path reinterprets as a disconnect.
    builder.set_options(SslOptions::IGNORE_UNEXPECTED_EOF);
    Ok(builder)
}

impl ContextHandle {
    /// Get a handle to the shared context, creating it if none is alive.
    pub(crate) fn acquire() -> Result<ContextHandle> {
        let mut slot = registry().lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(inner) = slot.upgrade() {
            return Ok(ContextHandle { inner });
        }

        let context = base_builder()?.build();
        let inner = Arc::new(SharedContext { context: Mutex::new(context) });
        *slot = Arc::downgrade(&inner);
        tracing::trace!("TLS context created");
        Ok(ContextHandle { inner })
    }

    /// Allocate a fresh engine session from the current context.
    pub(crate) fn new_session(&self) -> Result<Ssl> {
        let context = self
            .inner
            .context
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ssl::new(&context).map_err(|e| Error::Io {
            message: format!("allocating a TLS session: {e}"),
            code: None,
        })
    }

    /// Load a PEM certificate/key pair into the shared context.
    ///
    /// The pair is checked for consistency before the context is replaced;
    /// sessions already handed out keep the identity they were created with.
    pub(crate) fn configure_identity(&self, certificate: &Path, private_key: &Path) -> Result<()> {
        let mut builder = base_builder()?;
        builder
            .set_certificate_file(certificate, SslFiletype::PEM)
            .map_err(|e| Error::Certificate(format!("{}: {e}", certificate.display())))?;
        builder
            .set_private_key_file(private_key, SslFiletype::PEM)
            .map_err(|e| Error::Key(format!("{}: {e}", private_key.display())))?;
        builder.check_private_key().map_err(|_| Error::KeyMismatch)?;

        let mut context = self
            .inner
            .context
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *context = builder.build();
        tracing::debug!(
            certificate = %certificate.display(),
            "TLS context identity configured"
        );
        Ok(())
    }
}
