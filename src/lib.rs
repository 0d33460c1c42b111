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

//! # MQTT Tunnel Tokio
//!
//! An async byte-stream tunneling library for Rust with tokio, bridging MQTT
//! clients to remote brokers over TCP sockets, Unix domain sockets, and
//! serial character devices.
//!
//! This library is protocol-transparent: it relays MQTT (or any other) byte
//! streams bidirectionally without parsing them, so a client on one channel
//! kind can reach a broker on another — a Unix-socket-only client talking to
//! a TCP broker, or a broker reached over a serial radio link.
//!
//! ## Features
//!
//! - **Multiple Channel Kinds**: TCP, Unix domain sockets, and serial devices
//! - **Bidirectional Relay**: Two independent directions, exact byte fidelity
//! - **Supervised Connections**: Exponential-backoff retry with observable state
//! - **Serial Resilience**: Read coalescing and device-loss detection for
//!   character devices that error instead of signalling EOF
//! - **Async/Await**: Built on tokio for high-performance async I/O
//!
//! ## Quick Start
//!
//! ```ignore
//! use mqtt_tunnel_tokio::mqtt_tun;
//!
//! // Open both ends
//! let client_side = mqtt_tun::Endpoint::open(
//!     &mqtt_tun::EndpointConfig::unix("/tmp/mqtt-client.sock"),
//! ).await?;
//! let broker_side = mqtt_tun::Endpoint::open(
//!     &mqtt_tun::EndpointConfig::tcp("broker.example.com:1883"),
//! ).await?;
//!
//! // Relay until either side terminates
//! let mut tunnel = mqtt_tun::Tunnel::start(client_side, broker_side);
//! let outcome = tunnel.wait().await;
//! println!("tunnel finished: {outcome:?}");
//! ```
//!
//! ## Main Components
//!
//! - [`mqtt_tun::transport`]: Endpoint kinds and the byte-stream trait
//! - [`mqtt_tun::tunnel`]: The bidirectional relay and its lifecycle
//! - [`mqtt_tun::supervisor`]: Connection retry with exponential backoff
//! - [`mqtt_tun::adapter`]: Bridging a supervised channel to an MQTT client
//! - [`mqtt_tun::endpoint_config`]: Endpoint selection and parameters
//! - [`mqtt_tun::bridge_error`]: Errors above the transport layer

pub mod mqtt_tun;
