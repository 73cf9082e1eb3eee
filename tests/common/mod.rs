#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};

use searchgate::{Config, Server};

/// Bind the server on an ephemeral port and run it in the background.
pub async fn spawn_server(doc_root: &Path, backend: SocketAddr, recv_timeout: Duration) -> SocketAddr {
    let config = Config {
        listen_addr: "127.0.0.1:0".parse().unwrap(),
        backend_addr: backend,
        doc_root: doc_root.to_path_buf(),
        recv_timeout,
    };
    let server = Server::bind(config).await.expect("bind server");
    let addr = server.local_addr().expect("local addr");
    tokio::spawn(server.serve());
    addr
}

/// A UDP backend that answers the first query with the given datagrams,
/// in order, then exits.
pub async fn spawn_backend(replies: Vec<Vec<u8>>) -> SocketAddr {
    let socket = UdpSocket::bind("127.0.0.1:0").await.expect("bind backend");
    let addr = socket.local_addr().expect("backend addr");
    tokio::spawn(async move {
        let mut buf = [0u8; 4096];
        if let Ok((_, peer)) = socket.recv_from(&mut buf).await {
            for reply in replies {
                let _ = socket.send_to(&reply, peer).await;
            }
        }
    });
    addr
}

/// A backend that receives queries but never answers.
pub async fn spawn_silent_backend() -> SocketAddr {
    let socket = UdpSocket::bind("127.0.0.1:0").await.expect("bind backend");
    let addr = socket.local_addr().expect("backend addr");
    tokio::spawn(async move {
        let mut buf = [0u8; 4096];
        loop {
            if socket.recv_from(&mut buf).await.is_err() {
                break;
            }
        }
    });
    addr
}

/// Send raw request bytes, half-close, and collect the whole response.
pub async fn send_raw(addr: SocketAddr, request: &[u8]) -> Vec<u8> {
    let mut stream = TcpStream::connect(addr).await.expect("connect");
    stream.write_all(request).await.expect("write request");
    stream.shutdown().await.expect("shutdown write");
    let mut response = Vec::new();
    stream.read_to_end(&mut response).await.expect("read response");
    response
}

pub async fn send_get(addr: SocketAddr, path: &str) -> Vec<u8> {
    let request = format!("GET {} HTTP/1.1\r\nHost: localhost\r\n\r\n", path);
    send_raw(addr, request.as_bytes()).await
}

/// Split a raw response into (head, body) at the blank line.
pub fn split_response(raw: &[u8]) -> (String, Vec<u8>) {
    let pos = raw
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .expect("response has no header/body separator");
    (
        String::from_utf8_lossy(&raw[..pos]).into_owned(),
        raw[pos + 4..].to_vec(),
    )
}

pub fn status_line(raw: &[u8]) -> String {
    let (head, _) = split_response(raw);
    head.lines().next().unwrap_or("").to_string()
}
