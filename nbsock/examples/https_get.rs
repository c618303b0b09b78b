//! Fetch a page over HTTPS and print the response headers.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example https_get -- example.com
//! ```

use std::time::Duration;

use bytes::BytesMut;
use nbsock::TlsSocket;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let host = std::env::args().nth(1).unwrap_or_else(|| "example.com".to_string());

    let mut socket = TlsSocket::new()?;
    socket.connect(&host, 443)?;
    socket.set_virtual_host(&host)?;
    socket.handshake()?;
    println!("negotiated {} with {}", socket.protocol_version(), socket.cipher());

    socket.send_str(&format!(
        "GET / HTTP/1.1\r\nHost: {host}\r\nConnection: close\r\n\r\n"
    ))?;

    let (response, header_end) =
        socket.receive_until_delimiter(b"\r\n\r\n", Duration::from_secs(5), 256 * 1024)?;
    println!("{}", String::from_utf8_lossy(&response[..header_end]));

    // If the server declared a body length, read the rest of it too.
    let headers = String::from_utf8_lossy(&response[..header_end]).to_lowercase();
    if let Some(length) = headers
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|value| value.trim().parse::<usize>().ok())
    {
        let mut body = BytesMut::from(&response[header_end + 4..]);
        socket.receive_remaining(&mut body, length, Duration::from_secs(10))?;
        println!("read {} body bytes", body.len());
    }

    socket.disconnect();
    Ok(())
}
