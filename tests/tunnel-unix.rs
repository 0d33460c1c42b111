// MIT License
//
// Copyright (c) 2025 Takatoshi Kondo
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

#![cfg(all(feature = "unix-socket", unix))]

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, UnixListener, UnixStream};

use mqtt_tunnel_tokio::mqtt_tun::endpoint_config::{EndpointConfig, EndpointKind};
use mqtt_tunnel_tokio::mqtt_tun::transport::Endpoint;
use mqtt_tunnel_tokio::mqtt_tun::tunnel::{Tunnel, TunnelOutcome};

mod common;

async fn unix_pair(dir: &tempfile::TempDir, name: &str) -> (Endpoint, UnixStream) {
    let path = dir.path().join(name);
    let listener = UnixListener::bind(&path).unwrap();
    let config = EndpointConfig::unix(path.to_string_lossy());
    let (endpoint, accepted) = tokio::join!(Endpoint::open(&config), listener.accept());
    (endpoint.unwrap(), accepted.unwrap().0)
}

async fn tcp_pair() -> (Endpoint, TcpStream) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let config = EndpointConfig::tcp(addr.to_string());
    let (endpoint, accepted) = tokio::join!(Endpoint::open(&config), listener.accept());
    (endpoint.unwrap(), accepted.unwrap().0)
}

#[tokio::test]
async fn test_unix_endpoint_kind() {
    common::init_tracing();

    let dir = tempfile::tempdir().unwrap();
    let (endpoint, _peer) = unix_pair(&dir, "kind.sock").await;
    assert_eq!(endpoint.kind(), EndpointKind::Unix);
}

#[tokio::test]
async fn test_unix_to_unix_relay() {
    common::init_tracing();

    let dir = tempfile::tempdir().unwrap();
    let (a, mut peer_a) = unix_pair(&dir, "client.sock").await;
    let (b, mut peer_b) = unix_pair(&dir, "broker.sock").await;
    let mut tunnel = Tunnel::start(a, b);

    peer_a.write_all(b"subscribe").await.unwrap();
    let mut buf = [0u8; 9];
    peer_b.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"subscribe");

    peer_b.write_all(b"suback").await.unwrap();
    let mut buf = [0u8; 6];
    peer_a.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"suback");

    tunnel.close().await;
}

/// The relay is kind-agnostic: a Unix-socket client reaches a TCP broker.
#[tokio::test]
async fn test_unix_to_tcp_relay_graceful() {
    common::init_tracing();

    let dir = tempfile::tempdir().unwrap();
    let (a, mut peer_a) = unix_pair(&dir, "client.sock").await;
    let (b, mut peer_b) = tcp_pair().await;
    let mut tunnel = Tunnel::start(a, b);

    peer_a.write_all(b"across kinds").await.unwrap();
    peer_a.shutdown().await.unwrap();

    let mut received = Vec::new();
    peer_b.read_to_end(&mut received).await.unwrap();
    assert_eq!(received, b"across kinds");

    peer_b.shutdown().await.unwrap();
    let mut rest = Vec::new();
    peer_a.read_to_end(&mut rest).await.unwrap();
    assert!(rest.is_empty());

    let outcome = tunnel.wait().await;
    assert!(matches!(outcome, TunnelOutcome::Graceful));
}
