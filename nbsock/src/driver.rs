//! Same-thread cooperative handshake driver.
//!
//! Two blocking handshakes cannot be completed from one thread: each side
//! would sit inside its own retry loop waiting for bytes only the other
//! side's loop can produce. This driver interleaves them instead, stepping
//! one engine at a time and switching roles whenever the current side
//! reports would-block.

use std::thread;
use std::time::Instant;

use nbsock_core::backoff::retry_interval;
use nbsock_core::{Error, Result};

use crate::socket::{HandshakeProgress, HandshakeState, TlsSocket, HANDSHAKE_TIMEOUT};

/// Complete the handshake between two TLS sockets owned by this thread.
///
/// Exactly one socket must be in the `Connect` state and the other in
/// `Accept`; anything else fails with
/// [`Error::IncompatibleHandshakeStates`]. Stepping starts on the accepting
/// side and alternates on every would-block, sleeping with proportional
/// backoff, until one engine reports completion. At that point both sockets
/// are `Established`, since a stream handshake finishing on one side implies
/// the other side finished too. Fails with
/// [`Error::HandshakeTimeout`] once the total budget elapses.
///
/// # Example
///
/// ```rust,no_run
/// use nbsock::{establish_handshake, TlsServer, TlsSocket};
///
/// # fn example() -> nbsock::Result<()> {
/// let mut server = TlsServer::new()?;
/// server.listen(8443, "cert.pem", "key.pem")?;
///
/// let mut client = TlsSocket::new()?;
/// client.connect("127.0.0.1", 8443)?;
/// let mut accepted = loop {
///     if let Some(socket) = server.accept()? {
///         break socket;
///     }
/// };
///
/// establish_handshake(&mut client, &mut accepted)?;
/// # Ok(())
/// # }
/// ```
pub fn establish_handshake(first: &mut TlsSocket, second: &mut TlsSocket) -> Result<()> {
    let (connecting, accepting) = match (first.handshake_state(), second.handshake_state()) {
        (HandshakeState::Connect, HandshakeState::Accept) => (first, second),
        (HandshakeState::Accept, HandshakeState::Connect) => (second, first),
        _ => return Err(Error::IncompatibleHandshakeStates),
    };

    let started = Instant::now();
    let mut retries = 0;
    let mut accept_turn = true;
    loop {
        let stepping = if accept_turn { &mut *accepting } else { &mut *connecting };
        match stepping.handshake_step()? {
            HandshakeProgress::Established => break,
            HandshakeProgress::WouldBlock => {
                accept_turn = !accept_turn;
                let elapsed = started.elapsed();
                if elapsed >= HANDSHAKE_TIMEOUT {
                    return Err(Error::HandshakeTimeout { elapsed });
                }
                thread::sleep(retry_interval(retries));
                retries += 1;
            },
        }
    }

    connecting.mark_established();
    accepting.mark_established();
    tracing::debug!("same-thread TLS handshake established");
    Ok(())
}
