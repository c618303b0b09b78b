//! Retry/backoff and timed-read benchmarks.

use std::collections::VecDeque;
use std::time::Duration;

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use nbsock_core::backoff::retry_interval;
use nbsock_core::transport::{receive_until_delimiter, Transport};
use nbsock_core::Result;

/// Transport fed from a script of chunks; empty once the script runs dry.
struct Scripted {
    chunks: VecDeque<Bytes>,
}

impl Transport for Scripted {
    fn receive(&mut self) -> Result<Bytes> {
        Ok(self.chunks.pop_front().unwrap_or_default())
    }
}

fn benchmark_retry_interval(c: &mut Criterion) {
    c.bench_function("retry_interval_curve", |b| {
        b.iter(|| {
            for retries in 0..=100usize {
                black_box(retry_interval(black_box(retries)));
            }
        })
    });
}

fn benchmark_delimiter_scan(c: &mut Criterion) {
    // One 64 KiB chunk with the delimiter at the very end: the worst case
    // for the scan-from-start search.
    let mut payload = vec![b'a'; 64 * 1024];
    payload.extend_from_slice(b"\r\n");

    c.bench_function("receive_until_delimiter_64k", |b| {
        b.iter(|| {
            let mut transport = Scripted {
                chunks: VecDeque::from([Bytes::from(payload.clone())]),
            };
            let (data, index) = receive_until_delimiter(
                &mut transport,
                b"\r\n",
                Duration::from_secs(1),
                128 * 1024,
            )
            .unwrap();
            black_box((data, index));
        })
    });
}

criterion_group!(benches, benchmark_retry_interval, benchmark_delimiter_scan);
criterion_main!(benches);
