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

use std::error::Error;

use mqtt_tunnel_tokio::mqtt_tun::bridge_error::BridgeError;
use mqtt_tunnel_tokio::mqtt_tun::transport::TransportError;

mod common;

/// Test BridgeError::Transport variant creation and properties
#[test]
fn test_bridge_error_transport_variant() {
    common::init_tracing();

    let err = BridgeError::from(TransportError::Timeout);

    // Test Debug format
    let debug_str = format!("{:?}", err);
    assert!(debug_str.contains("Transport"));
    assert!(debug_str.contains("Timeout"));

    // Test Display format
    let display_str = format!("{}", err);
    assert!(display_str.contains("Transport error"));
    assert!(display_str.contains("Operation timed out"));

    // The transport failure stays reachable through the error chain
    assert!(err.source().is_some());
}

/// Test BridgeError::RetryExhausted variant creation and properties
#[test]
fn test_bridge_error_retry_exhausted_variant() {
    common::init_tracing();

    let err = BridgeError::RetryExhausted { attempts: 5 };

    let debug_str = format!("{:?}", err);
    assert!(debug_str.contains("RetryExhausted"));
    assert!(debug_str.contains("5"));

    let display_str = format!("{}", err);
    assert!(display_str.contains("exhausted after 5 attempts"));

    assert!(err.source().is_none());
}
