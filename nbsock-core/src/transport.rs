//! Timed read algorithms over any byte transport.
//!
//! Everything here is generic over [`Transport`], the one-method seam both
//! the plain and the TLS sockets implement. The algorithms share one loop
//! shape: drain the transport, append what arrived, test a completion
//! predicate, and back off proportionally while nothing is ready, failing
//! once the caller's deadline passes.

use std::thread;
use std::time::{Duration, Instant};

use bytes::{Bytes, BytesMut};

use crate::backoff::retry_interval;
use crate::error::{Error, Result};

/// A byte source the timed read algorithms can drive.
pub trait Transport {
    /// Drain whatever is currently available without blocking.
    ///
    /// An empty buffer means "nothing ready yet"; a graceful close with
    /// nothing pending is [`Error::Disconnected`].
    fn receive(&mut self) -> Result<Bytes>;
}

/// First index of `needle` in `haystack`, if present.
fn find_delimiter(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    haystack.windows(needle.len()).position(|window| window == needle)
}

/// Receive until `delimiter` appears in the accumulated data.
///
/// Returns the accumulated bytes and the index of the first occurrence of
/// the delimiter. Fails with [`Error::ExcessData`] as soon as the
/// accumulation would exceed `max_size`, and with [`Error::Timeout`] if the
/// deadline passes first.
pub fn receive_until_delimiter<T: Transport + ?Sized>(
    transport: &mut T,
    delimiter: &[u8],
    timeout: Duration,
    max_size: usize,
) -> Result<(Bytes, usize)> {
    let deadline = Instant::now() + timeout;
    let mut accumulated = BytesMut::new();
    let mut retries = 0;

    loop {
        if Instant::now() >= deadline {
            return Err(Error::Timeout {
                timeout,
                received: accumulated.len(),
                waiting_for: format!("finding a {}-byte delimiter", delimiter.len()),
            });
        }

        let chunk = transport.receive()?;
        if chunk.is_empty() {
            thread::sleep(retry_interval(retries));
            retries += 1;
            continue;
        }

        if accumulated.len() + chunk.len() > max_size {
            return Err(Error::ExcessData {
                received: accumulated.len() + chunk.len(),
                limit: max_size,
            });
        }
        accumulated.extend_from_slice(&chunk);
        retries = 0;

        if let Some(index) = find_delimiter(&accumulated, delimiter) {
            return Ok((accumulated.freeze(), index));
        }
    }
}

/// Receive exactly `total_size` bytes.
///
/// Overshoot is an error, not a truncation: a chunk that would push the
/// accumulation past `total_size` fails with [`Error::ExcessData`].
pub fn receive_until_size<T: Transport + ?Sized>(
    transport: &mut T,
    total_size: usize,
    timeout: Duration,
) -> Result<Bytes> {
    let deadline = Instant::now() + timeout;
    let mut accumulated = BytesMut::new();
    let mut retries = 0;

    loop {
        if accumulated.len() == total_size {
            return Ok(accumulated.freeze());
        }
        if Instant::now() >= deadline {
            return Err(Error::Timeout {
                timeout,
                received: accumulated.len(),
                waiting_for: format!("reaching {} bytes", total_size),
            });
        }

        let chunk = transport.receive()?;
        if chunk.is_empty() {
            thread::sleep(retry_interval(retries));
            retries += 1;
            continue;
        }

        if accumulated.len() + chunk.len() > total_size {
            return Err(Error::ExcessData {
                received: accumulated.len() + chunk.len(),
                limit: total_size,
            });
        }
        accumulated.extend_from_slice(&chunk);
        retries = 0;
    }
}

/// Receive until at least `min_size` bytes have accumulated.
///
/// There is no ceiling; whatever arrived with the final chunk is returned.
pub fn receive_at_least<T: Transport + ?Sized>(
    transport: &mut T,
    min_size: usize,
    timeout: Duration,
) -> Result<Bytes> {
    let deadline = Instant::now() + timeout;
    let mut accumulated = BytesMut::new();
    let mut retries = 0;

    loop {
        if accumulated.len() >= min_size {
            return Ok(accumulated.freeze());
        }
        if Instant::now() >= deadline {
            return Err(Error::Timeout {
                timeout,
                received: accumulated.len(),
                waiting_for: format!("receiving at least {} bytes", min_size),
            });
        }

        let chunk = transport.receive()?;
        if chunk.is_empty() {
            thread::sleep(retry_interval(retries));
            retries += 1;
            continue;
        }
        accumulated.extend_from_slice(&chunk);
        retries = 0;
    }
}

/// Top `data` up to `total_size` bytes.
///
/// A no-op when `data` already holds enough; otherwise receives exactly the
/// shortfall (with the exact-size contract of [`receive_until_size`]) and
/// appends it.
pub fn receive_remaining<T: Transport + ?Sized>(
    transport: &mut T,
    data: &mut BytesMut,
    total_size: usize,
    timeout: Duration,
) -> Result<()> {
    if data.len() >= total_size {
        return Ok(());
    }
    let rest = receive_until_size(transport, total_size - data.len(), timeout)?;
    data.extend_from_slice(&rest);
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;

    /// Transport fed from a script of chunks; empty once the script runs dry.
    struct Scripted {
        chunks: VecDeque<Vec<u8>>,
    }

    impl Scripted {
        fn new(chunks: &[&[u8]]) -> Scripted {
            Scripted {
                chunks: chunks.iter().map(|chunk| chunk.to_vec()).collect(),
            }
        }
    }

    impl Transport for Scripted {
        fn receive(&mut self) -> Result<Bytes> {
            match self.chunks.pop_front() {
                Some(chunk) => Ok(Bytes::from(chunk)),
                None => Ok(Bytes::new()),
            }
        }
    }

    const TIMEOUT: Duration = Duration::from_millis(200);

    #[test]
    fn test_delimiter_found_across_chunks() {
        let mut transport = Scripted::new(&[b"hel", b"lo\r", b"\nworld"]);
        let (data, index) =
            receive_until_delimiter(&mut transport, b"\r\n", TIMEOUT, 1024).unwrap();
        assert_eq!(index, 5);
        assert_eq!(&data[index..index + 2], b"\r\n");
        assert_eq!(&data[..], b"hello\r\nworld");
    }

    #[test]
    fn test_delimiter_reports_first_occurrence() {
        let mut transport = Scripted::new(&[b"a|b|c"]);
        let (data, index) = receive_until_delimiter(&mut transport, b"|", TIMEOUT, 1024).unwrap();
        assert_eq!(index, 1);
        assert_eq!(&data[..], b"a|b|c");
    }

    #[test]
    fn test_delimiter_excess_data() {
        let mut transport = Scripted::new(&[b"aaaa", b"bbbb"]);
        let err = receive_until_delimiter(&mut transport, b"\n", TIMEOUT, 6).unwrap_err();
        match err {
            Error::ExcessData { received, limit } => {
                assert_eq!(received, 8);
                assert_eq!(limit, 6);
            },
            other => panic!("expected ExcessData, got {other}"),
        }
    }

    #[test]
    fn test_delimiter_timeout_reports_accumulated() {
        let mut transport = Scripted::new(&[b"abc"]);
        let err = receive_until_delimiter(
            &mut transport,
            b"\n",
            Duration::from_millis(60),
            1024,
        )
        .unwrap_err();
        match err {
            Error::Timeout { received, .. } => assert_eq!(received, 3),
            other => panic!("expected Timeout, got {other}"),
        }
    }

    #[test]
    fn test_until_size_exact() {
        let mut transport = Scripted::new(&[b"abcd", b"ef"]);
        let data = receive_until_size(&mut transport, 6, TIMEOUT).unwrap();
        assert_eq!(&data[..], b"abcdef");
    }

    #[test]
    fn test_until_size_overshoot_is_an_error() {
        let mut transport = Scripted::new(&[b"abcd", b"efgh"]);
        let err = receive_until_size(&mut transport, 6, TIMEOUT).unwrap_err();
        assert!(matches!(err, Error::ExcessData { received: 8, limit: 6 }));
    }

    #[test]
    fn test_until_size_zero_completes_immediately() {
        let mut transport = Scripted::new(&[b"unread"]);
        let data = receive_until_size(&mut transport, 0, TIMEOUT).unwrap();
        assert!(data.is_empty());
    }

    #[test]
    fn test_at_least_returns_the_overshoot() {
        let mut transport = Scripted::new(&[b"abcd", b"efgh"]);
        let data = receive_at_least(&mut transport, 6, TIMEOUT).unwrap();
        assert_eq!(&data[..], b"abcdefgh");
    }

    #[test]
    fn test_timeout_is_bounded() {
        let mut transport = Scripted::new(&[]);
        let timeout = Duration::from_millis(50);
        let started = Instant::now();
        let err = receive_until_size(&mut transport, 1, timeout).unwrap_err();
        let elapsed = started.elapsed();
        assert!(matches!(err, Error::Timeout { .. }));
        assert!(elapsed >= timeout, "failed after only {elapsed:?}");
        assert!(elapsed < Duration::from_millis(500), "took {elapsed:?}");
    }

    #[test]
    fn test_remaining_tops_up() {
        let mut transport = Scripted::new(&[b"world"]);
        let mut data = BytesMut::from(&b"hello "[..]);
        receive_remaining(&mut transport, &mut data, 11, TIMEOUT).unwrap();
        assert_eq!(&data[..], b"hello world");
    }

    #[test]
    fn test_remaining_is_a_noop_when_full() {
        let mut transport = Scripted::new(&[b"unread"]);
        let mut data = BytesMut::from(&b"full"[..]);
        receive_remaining(&mut transport, &mut data, 4, TIMEOUT).unwrap();
        assert_eq!(&data[..], b"full");
    }

    #[test]
    fn test_disconnect_propagates() {
        struct Closed;
        impl Transport for Closed {
            fn receive(&mut self) -> Result<Bytes> {
                Err(Error::Disconnected)
            }
        }
        let err = receive_at_least(&mut Closed, 1, TIMEOUT).unwrap_err();
        assert!(matches!(err, Error::Disconnected));
    }
}
