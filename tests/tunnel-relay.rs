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

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::Duration;

use mqtt_tunnel_tokio::mqtt_tun::endpoint_config::EndpointConfig;
use mqtt_tunnel_tokio::mqtt_tun::transport::{Endpoint, TransportError};
use mqtt_tunnel_tokio::mqtt_tun::tunnel::{Tunnel, TunnelOption, TunnelOutcome, TunnelState};

mod common;

/// Opens one TCP endpoint and returns it together with the peer socket the
/// test drives directly.
async fn tcp_pair() -> (Endpoint, TcpStream) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let config = EndpointConfig::tcp(addr.to_string());
    let (endpoint, accepted) = tokio::join!(Endpoint::open(&config), listener.accept());
    (endpoint.unwrap(), accepted.unwrap().0)
}

#[tokio::test]
async fn test_relay_request_response() {
    common::init_tracing();

    let (a, mut peer_a) = tcp_pair().await;
    let (b, mut peer_b) = tcp_pair().await;
    let mut tunnel = Tunnel::start(a, b);
    assert_eq!(tunnel.state(), TunnelState::Relaying);

    // Client-side write appears verbatim on the broker side.
    peer_a.write_all(b"PING").await.unwrap();
    let mut buf = [0u8; 4];
    peer_b.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"PING");

    // And the response flows back through the opposite direction.
    peer_b.write_all(b"PONG").await.unwrap();
    peer_a.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"PONG");

    tunnel.close().await;
}

#[tokio::test]
async fn test_relay_byte_fidelity_large_payload() {
    common::init_tracing();

    let (a, mut peer_a) = tcp_pair().await;
    let (b, mut peer_b) = tcp_pair().await;
    let mut tunnel = Tunnel::start(a, b);

    // Larger than any single relay chunk, with a non-repeating pattern so
    // reordering or duplication would be caught.
    let payload: Vec<u8> = (0..100_000u32).map(|i| (i % 251) as u8).collect();
    let expected = payload.clone();

    let writer = tokio::spawn(async move {
        peer_a.write_all(&payload).await.unwrap();
        peer_a.shutdown().await.unwrap();
        peer_a
    });

    let mut received = Vec::new();
    peer_b.read_to_end(&mut received).await.unwrap();
    assert_eq!(received, expected);

    writer.await.unwrap();
    tunnel.close().await;
}

#[tokio::test]
async fn test_graceful_close_drains_buffered_bytes() {
    common::init_tracing();

    let (a, mut peer_a) = tcp_pair().await;
    let (b, mut peer_b) = tcp_pair().await;
    let mut tunnel = Tunnel::start(a, b);

    peer_a.write_all(b"final bytes").await.unwrap();
    peer_a.shutdown().await.unwrap();

    // EOF propagates only after the buffered bytes are delivered.
    let mut received = Vec::new();
    peer_b.read_to_end(&mut received).await.unwrap();
    assert_eq!(received, b"final bytes");

    // End the opposite direction too, then the tunnel reports graceful.
    peer_b.shutdown().await.unwrap();
    let mut rest = Vec::new();
    peer_a.read_to_end(&mut rest).await.unwrap();
    assert!(rest.is_empty());

    let outcome = tunnel.wait().await;
    assert!(matches!(outcome, TunnelOutcome::Graceful));
    assert_eq!(tunnel.state(), TunnelState::Closed);
}

#[tokio::test]
async fn test_close_is_idempotent() {
    common::init_tracing();

    let (a, _peer_a) = tcp_pair().await;
    let (b, _peer_b) = tcp_pair().await;
    let mut tunnel = Tunnel::start(a, b);

    // Both peers are idle, so both relay reads are in flight when the close
    // arrives; it must still complete promptly.
    let outcome = tokio::time::timeout(Duration::from_secs(5), tunnel.close())
        .await
        .expect("close did not complete promptly");
    assert!(matches!(outcome, TunnelOutcome::Closed));
    assert_eq!(tunnel.state(), TunnelState::Closed);

    let again = tunnel.close().await;
    assert!(matches!(again, TunnelOutcome::Closed));
}

#[tokio::test]
async fn test_abrupt_peer_reset_reported() {
    common::init_tracing();

    let (a, peer_a) = tcp_pair().await;
    let (b, _peer_b) = tcp_pair().await;
    let mut tunnel = Tunnel::start(a, b);

    // Linger zero turns the close into a hard reset instead of a clean FIN.
    peer_a.set_linger(Some(Duration::ZERO)).unwrap();
    drop(peer_a);

    let outcome = tokio::time::timeout(Duration::from_secs(5), tunnel.wait())
        .await
        .expect("tunnel did not terminate on reset");
    match outcome {
        TunnelOutcome::Abrupt(TransportError::UnexpectedClose) => {}
        other => panic!("expected abrupt unexpected-close outcome, got {other:?}"),
    }
    assert_eq!(tunnel.state(), TunnelState::Closed);
}

#[tokio::test]
async fn test_wait_resumes_after_dropped_future() {
    common::init_tracing();

    let (a, peer_a) = tcp_pair().await;
    let (b, _peer_b) = tcp_pair().await;
    let mut tunnel = Tunnel::start(a, b);

    // A wait future abandoned mid-await, the way a signal select races it,
    // must not consume the pending teardown.
    tokio::select! {
        _ = tunnel.wait() => panic!("tunnel terminated early"),
        _ = tokio::time::sleep(Duration::from_millis(50)) => {}
    }

    peer_a.set_linger(Some(Duration::ZERO)).unwrap();
    drop(peer_a);

    let outcome = tokio::time::timeout(Duration::from_secs(5), tunnel.wait())
        .await
        .expect("tunnel did not terminate on reset");
    match outcome {
        TunnelOutcome::Abrupt(TransportError::UnexpectedClose) => {}
        other => panic!("expected abrupt outcome after resumed wait, got {other:?}"),
    }
}

#[tokio::test]
async fn test_state_transitions_observable() {
    common::init_tracing();

    let (a, _peer_a) = tcp_pair().await;
    let (b, _peer_b) = tcp_pair().await;
    let mut tunnel = Tunnel::start(a, b);
    let mut states = tunnel.state_changes();

    assert_eq!(*states.borrow_and_update(), TunnelState::Relaying);
    tunnel.close().await;
    states.changed().await.unwrap();
    // Closing may already have been superseded by Closed on the channel.
    let observed = *states.borrow_and_update();
    assert!(observed == TunnelState::Closing || observed == TunnelState::Closed);
}

#[tokio::test]
async fn test_custom_chunk_size_relays() {
    common::init_tracing();

    let (a, mut peer_a) = tcp_pair().await;
    let (b, mut peer_b) = tcp_pair().await;
    let options = TunnelOption::builder()
        .chunk_size(16usize)
        .build()
        .unwrap();
    let mut tunnel = Tunnel::start_with_options(a, b, options);

    let payload = vec![0x5a_u8; 1000];
    peer_a.write_all(&payload).await.unwrap();
    let mut received = vec![0u8; 1000];
    peer_b.read_exact(&mut received).await.unwrap();
    assert_eq!(received, payload);

    tunnel.close().await;
}
