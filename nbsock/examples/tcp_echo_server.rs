//! Minimal TCP echo server.
//!
//! Accepts connections on the given port (default 7000) and echoes every
//! byte back until the client disconnects.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example tcp_echo_server -- 7000
//! ```

use std::thread;
use std::time::Duration;

use nbsock::{Error, TcpServer, TcpSocket};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let port = std::env::args().nth(1).map(|arg| arg.parse()).transpose()?.unwrap_or(7000);

    let mut server = TcpServer::new();
    server.listen(port)?;
    println!("echo server listening on port {}", server.ipv4_port());

    loop {
        match server.accept()? {
            Some(client) => {
                println!("client connected from {}:{}", client.ipv4_address(), client.ipv4_port());
                echo(client);
            },
            None => thread::sleep(Duration::from_millis(20)),
        }
    }
}

/// Echo until the client goes away; connection errors only end this client.
fn echo(mut client: TcpSocket) {
    loop {
        match client.receive() {
            Ok(data) if data.is_empty() => thread::sleep(Duration::from_millis(10)),
            Ok(data) => {
                if let Err(e) = client.send(&data) {
                    println!("send failed: {e}");
                    return;
                }
            },
            Err(Error::Disconnected) => {
                println!("client disconnected");
                return;
            },
            Err(e) => {
                println!("receive failed: {e}");
                return;
            },
        }
    }
}
