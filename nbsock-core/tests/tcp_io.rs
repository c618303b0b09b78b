//! Plain TCP socket integration scenarios.
//!
//! Every test runs a real listener on an ephemeral loopback port. Accepting
//! is polled with a short budget since the sockets never block.

use std::thread;
use std::time::{Duration, Instant};

use bytes::BytesMut;
use nbsock_core::{Error, TcpServer, TcpSocket};

/// Poll `accept` until a connection arrives or `budget` elapses.
fn accept_within(server: &mut TcpServer, budget: Duration) -> TcpSocket {
    let started = Instant::now();
    loop {
        if let Some(socket) = server.accept().unwrap() {
            return socket;
        }
        assert!(started.elapsed() < budget, "no connection within {budget:?}");
        thread::sleep(Duration::from_millis(5));
    }
}

/// A connected (client, accepted) pair over loopback.
fn connected_pair() -> (TcpSocket, TcpSocket) {
    let mut server = TcpServer::new();
    server.listen(0).unwrap();
    let port = server.ipv4_port();

    let mut client = TcpSocket::new();
    client.connect("127.0.0.1", port).unwrap();
    let accepted = accept_within(&mut server, Duration::from_millis(500));
    (client, accepted)
}

#[test]
fn test_accept_reports_peer_address() {
    let mut server = TcpServer::new();
    server.listen(0).unwrap();
    let port = server.ipv4_port();
    assert!(server.is_listening());

    let mut client = TcpSocket::new();
    client.connect("127.0.0.1", port).unwrap();
    let accepted = accept_within(&mut server, Duration::from_millis(100));

    assert!(accepted.is_connected());
    assert_eq!(accepted.ipv4_address(), "127.0.0.1");
    assert_ne!(accepted.ipv4_port(), 0);
    assert_eq!(client.ipv4_address(), "127.0.0.1");
    assert_eq!(client.ipv4_port(), port);
}

#[test]
fn test_small_send_is_received_whole() {
    let (mut client, mut accepted) = connected_pair();
    client.send_str("abcd").unwrap();

    let data = accepted.receive_until_size(4, Duration::from_secs(1)).unwrap();
    assert_eq!(&data[..], b"abcd");
}

#[test]
fn test_back_to_back_sends_preserve_order() {
    let (mut client, mut accepted) = connected_pair();

    let payload: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
    for part in payload.chunks(2_500) {
        client.send(part).unwrap();
    }

    let data = accepted.receive_until_size(10_000, Duration::from_secs(5)).unwrap();
    assert_eq!(&data[..], &payload[..]);
}

#[test]
fn test_receive_is_empty_while_idle() {
    let (_client, mut accepted) = connected_pair();
    assert!(accepted.receive().unwrap().is_empty());
}

#[test]
fn test_peer_drop_surfaces_as_disconnected() {
    let (client, mut accepted) = connected_pair();
    drop(client);

    let started = Instant::now();
    loop {
        match accepted.receive() {
            Err(Error::Disconnected) => break,
            Ok(data) => assert!(data.is_empty(), "unexpected data {data:?}"),
            Err(other) => panic!("expected Disconnected, got {other}"),
        }
        assert!(
            started.elapsed() < Duration::from_secs(1),
            "close never observed"
        );
        thread::sleep(Duration::from_millis(10));
    }
}

#[test]
fn test_receive_until_size_times_out() {
    let (_client, mut accepted) = connected_pair();

    let timeout = Duration::from_millis(50);
    let started = Instant::now();
    let err = accepted.receive_until_size(1, timeout).unwrap_err();
    let elapsed = started.elapsed();

    assert!(matches!(err, Error::Timeout { .. }), "got {err}");
    assert!(elapsed >= timeout, "failed after only {elapsed:?}");
    assert!(elapsed < Duration::from_millis(500), "took {elapsed:?}");
}

#[test]
fn test_receive_until_size_rejects_excess() {
    let (mut client, mut accepted) = connected_pair();
    client.send_str("12345").unwrap();
    thread::sleep(Duration::from_millis(50));

    let err = accepted.receive_until_size(3, Duration::from_secs(1)).unwrap_err();
    assert!(matches!(err, Error::ExcessData { .. }), "got {err}");
}

#[test]
fn test_receive_until_delimiter_finds_first() {
    let (mut client, mut accepted) = connected_pair();
    client.send_str("status: ok\r\nbody").unwrap();

    let (data, index) = accepted
        .receive_until_delimiter(b"\r\n", Duration::from_secs(1), 1024)
        .unwrap();
    assert_eq!(index, 10);
    assert_eq!(&data[index..index + 2], b"\r\n");
    assert_eq!(&data[..index], b"status: ok");
}

#[test]
fn test_receive_remaining_completes_a_message() {
    let (mut client, mut accepted) = connected_pair();

    client.send_str("hello ").unwrap();
    let mut message = BytesMut::from(
        &accepted.receive_until_size(6, Duration::from_secs(1)).unwrap()[..],
    );

    client.send_str("world").unwrap();
    accepted
        .receive_remaining(&mut message, 11, Duration::from_secs(1))
        .unwrap();
    assert_eq!(&message[..], b"hello world");
}

#[test]
fn test_has_client_tracks_the_queue() {
    let mut server = TcpServer::new();
    server.listen(0).unwrap();
    assert!(!server.has_client());

    let mut client = TcpSocket::new();
    client.connect("127.0.0.1", server.ipv4_port()).unwrap();

    let started = Instant::now();
    while !server.has_client() {
        assert!(
            started.elapsed() < Duration::from_millis(500),
            "pending connection never became visible"
        );
        thread::sleep(Duration::from_millis(5));
    }

    let _accepted = accept_within(&mut server, Duration::from_millis(100));
    assert!(!server.has_client());
}

#[test]
fn test_connecting_twice_is_rejected() {
    let (mut client, _accepted) = connected_pair();
    let err = client.connect("127.0.0.1", 1).unwrap_err();
    assert!(matches!(err, Error::Configuration(_)), "got {err}");
}

#[test]
fn test_io_on_unconfigured_socket_is_rejected() {
    let mut socket = TcpSocket::new();
    assert!(matches!(socket.send(b"x"), Err(Error::Configuration(_))));
    assert!(matches!(socket.receive(), Err(Error::Configuration(_))));
}

#[test]
fn test_threaded_echo_roundtrip() {
    let (mut client, mut accepted) = connected_pair();

    let echo = thread::spawn(move || {
        let data = accepted.receive_until_size(5, Duration::from_secs(2)).unwrap();
        accepted.send(&data).unwrap();
    });

    client.send_str("knock").unwrap();
    let reply = client.receive_until_size(5, Duration::from_secs(2)).unwrap();
    assert_eq!(&reply[..], b"knock");
    echo.join().unwrap();
}

#[test]
fn test_disconnect_resets_introspection() {
    let (mut client, _accepted) = connected_pair();
    client.disconnect();
    assert!(!client.is_connected());
    assert_eq!(client.ipv4_address(), "0.0.0.0");
    assert_eq!(client.ipv4_port(), 0);

    client.disconnect();
    assert!(!client.is_connected());
}
