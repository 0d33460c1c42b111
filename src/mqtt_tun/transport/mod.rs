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

//! Transport layer implementations for byte-stream tunneling.
//!
//! This module provides the uniform [`Endpoint`] abstraction over the three
//! supported channel kinds — TCP sockets, Unix domain sockets, and serial
//! character devices — together with the [`TransportOps`] trait that exposes
//! them as a plain byte stream and the [`TransportError`] taxonomy shared by
//! every component built on top.
//!
//! Endpoints are selected by configuration ([`EndpointKind`]), never by
//! subtyping: the [`Tunnel`](crate::mqtt_tun::tunnel::Tunnel) and the
//! [`ConnectionSupervisor`](crate::mqtt_tun::supervisor::ConnectionSupervisor)
//! stay transport-agnostic and only ever see `Endpoint` values.
//!
//! # Custom Transport Implementation
//!
//! Consumers that need a channel kind not covered here (for example an
//! in-memory pipe in tests) can implement [`TransportOps`] directly; the MQTT
//! adapter boundary accepts any boxed implementation.

pub mod connect_helper;
#[cfg(feature = "serial")]
mod serial;
#[cfg(feature = "serial")]
mod serial_framer;
mod tcp;
#[cfg(all(feature = "unix-socket", unix))]
mod unix;

#[cfg(feature = "serial")]
pub use serial::SerialTransport;
#[cfg(feature = "serial")]
pub use serial_framer::SerialFramer;
pub use tcp::TcpTransport;
#[cfg(all(feature = "unix-socket", unix))]
pub use unix::UnixStreamTransport;

use std::future::Future;
use std::io::IoSlice;
use std::pin::Pin;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::Duration;

use crate::mqtt_tun::endpoint_config::{EndpointConfig, EndpointKind};

/// Error types that can occur during transport operations.
///
/// The variants follow the error taxonomy shared by the tunnel and the
/// connection supervisor: connection-establishment failures, device-level
/// failures specific to serial endpoints, and stream-level failures during an
/// established relay.
#[derive(Debug)]
pub enum TransportError {
    /// An I/O error that does not fit a more specific variant.
    Io(std::io::Error),
    /// The peer actively refused the connection.
    ConnectionRefused,
    /// The serial device file is missing or the device stopped responding.
    ///
    /// A single occurrence may be transient (USB re-enumeration); the
    /// [`SerialFramer`] converts a run of these into [`TransportError::DeviceLost`].
    DeviceUnavailable,
    /// The serial device is gone for good as far as this endpoint is concerned.
    ///
    /// Emitted once by the [`SerialFramer`] after repeated
    /// [`TransportError::DeviceUnavailable`] reads so the supervisor can
    /// trigger a single reconnect instead of reacting to every byte-level
    /// error.
    DeviceLost,
    /// An operation did not complete within its time budget.
    Timeout,
    /// The stream accepted zero bytes of a pending write.
    PartialWrite,
    /// The peer vanished mid-stream (reset, broken pipe) without a clean EOF.
    UnexpectedClose,
    /// Connection establishment failed before any stream existed.
    Connect(String),
    /// The transport has no live connection to operate on.
    NotConnected,
    /// The transport was already closed by its owner.
    Closed,
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::Io(e) => write!(f, "IO error: {e}"),
            TransportError::ConnectionRefused => write!(f, "Connection refused"),
            TransportError::DeviceUnavailable => write!(f, "Serial device unavailable"),
            TransportError::DeviceLost => write!(f, "Serial device lost"),
            TransportError::Timeout => write!(f, "Operation timed out"),
            TransportError::PartialWrite => write!(f, "Stream accepted no bytes of a pending write"),
            TransportError::UnexpectedClose => write!(f, "Peer closed the stream unexpectedly"),
            TransportError::Connect(msg) => write!(f, "Connection failed: {msg}"),
            TransportError::NotConnected => write!(f, "Transport not connected"),
            TransportError::Closed => write!(f, "Transport already closed"),
        }
    }
}

impl std::error::Error for TransportError {}

impl From<std::io::Error> for TransportError {
    fn from(e: std::io::Error) -> Self {
        TransportError::Io(e)
    }
}

impl TransportError {
    /// Classifies an I/O error produced by a socket stream.
    pub(crate) fn from_socket_io(e: std::io::Error) -> Self {
        use std::io::ErrorKind;
        match e.kind() {
            ErrorKind::ConnectionRefused => TransportError::ConnectionRefused,
            ErrorKind::TimedOut => TransportError::Timeout,
            ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted | ErrorKind::BrokenPipe => {
                TransportError::UnexpectedClose
            }
            ErrorKind::WriteZero => TransportError::PartialWrite,
            _ => TransportError::Io(e),
        }
    }

    /// Classifies an I/O error produced by a serial character device.
    ///
    /// Character devices report an unplugged device as EIO/ENXIO/ENODEV on
    /// read rather than a clean EOF; those all collapse into
    /// [`TransportError::DeviceUnavailable`].
    #[cfg(feature = "serial")]
    pub(crate) fn from_serial_io(e: std::io::Error) -> Self {
        use std::io::ErrorKind;
        const EIO: i32 = 5;
        const ENXIO: i32 = 6;
        const ENODEV: i32 = 19;
        match (e.kind(), e.raw_os_error()) {
            (ErrorKind::NotFound, _) => TransportError::DeviceUnavailable,
            (_, Some(EIO | ENXIO | ENODEV)) => TransportError::DeviceUnavailable,
            (ErrorKind::TimedOut, _) => TransportError::Timeout,
            (ErrorKind::BrokenPipe, _) => TransportError::UnexpectedClose,
            (ErrorKind::WriteZero, _) => TransportError::PartialWrite,
            _ => TransportError::Io(e),
        }
    }

    /// Returns `true` when the error means the underlying device or peer is
    /// gone and only a reconnect can help.
    pub fn is_connection_loss(&self) -> bool {
        matches!(
            self,
            TransportError::DeviceUnavailable
                | TransportError::DeviceLost
                | TransportError::UnexpectedClose
                | TransportError::ConnectionRefused
        )
    }
}

/// Core trait that exposes a connected channel as a plain byte stream.
///
/// Implementations handle the underlying I/O; consumers see exactly three
/// operations. `recv` blocks until at least one byte is available and returns
/// `Ok(0)` only for end-of-stream — it never reports an empty read otherwise.
/// `send` transmits all the provided bytes, looping over partial writes
/// internally; a stream that accepts zero bytes of a pending write surfaces as
/// [`TransportError::PartialWrite`]. `shutdown` closes the channel, gracefully
/// within the given timeout and forcibly afterwards, and is idempotent.
pub trait TransportOps {
    /// Sends all bytes in `buffers` through the transport.
    fn send<'a>(
        &'a mut self,
        buffers: &'a [IoSlice<'a>],
    ) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + 'a>>;

    /// Receives data into `buffer`, returning the number of bytes read.
    ///
    /// `Ok(0)` signals end-of-stream.
    fn recv<'a>(
        &'a mut self,
        buffer: &'a mut [u8],
    ) -> Pin<Box<dyn Future<Output = Result<usize, TransportError>> + Send + 'a>>;

    /// Shuts the transport down, waiting up to `timeout` for a graceful close.
    fn shutdown<'a>(
        &'a mut self,
        timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>>;
}

/// Implementation of [`TransportOps`] for boxed trait objects, enabling
/// dynamic dispatch across transport kinds at runtime.
impl TransportOps for Box<dyn TransportOps + Send> {
    fn send<'a>(
        &'a mut self,
        buffers: &'a [IoSlice<'a>],
    ) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + 'a>> {
        (**self).send(buffers)
    }

    fn recv<'a>(
        &'a mut self,
        buffer: &'a mut [u8],
    ) -> Pin<Box<dyn Future<Output = Result<usize, TransportError>> + Send + 'a>> {
        (**self).recv(buffer)
    }

    fn shutdown<'a>(
        &'a mut self,
        timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        (**self).shutdown(timeout)
    }
}

/// A uniform, kind-tagged handle over one connected byte channel.
///
/// An `Endpoint` is owned exclusively by whichever component opened it — a
/// tunnel or the MQTT transport adapter — and is consumed on teardown, so it
/// is closed exactly once and never shared between two tunnels.
#[derive(Debug)]
pub enum Endpoint {
    /// TCP socket stream.
    Tcp(TcpTransport),
    /// Unix domain socket stream.
    #[cfg(all(feature = "unix-socket", unix))]
    Unix(UnixStreamTransport),
    /// Serial character device.
    #[cfg(feature = "serial")]
    Serial(SerialTransport),
}

impl Endpoint {
    /// Opens an endpoint of the configured kind.
    ///
    /// This is a single connection attempt; retry and backoff belong to the
    /// [`ConnectionSupervisor`](crate::mqtt_tun::supervisor::ConnectionSupervisor).
    pub async fn open(config: &EndpointConfig) -> Result<Self, TransportError> {
        connect_helper::open_endpoint(config).await
    }

    /// The kind tag this endpoint was opened with.
    pub fn kind(&self) -> EndpointKind {
        match self {
            Endpoint::Tcp(_) => EndpointKind::Tcp,
            #[cfg(all(feature = "unix-socket", unix))]
            Endpoint::Unix(_) => EndpointKind::Unix,
            #[cfg(feature = "serial")]
            Endpoint::Serial(_) => EndpointKind::Serial,
        }
    }

    /// Splits the endpoint into independently owned read and write halves.
    ///
    /// The halves are what the two tunnel directions run on: one direction
    /// owns this endpoint's reader, the opposite direction owns its writer,
    /// so a blocked write never stalls the read side. For serial endpoints
    /// the reader half comes wrapped in its [`SerialFramer`].
    pub fn into_split(self) -> (EndpointReader, EndpointWriter) {
        match self {
            Endpoint::Tcp(t) => {
                let (rd, wr) = t.into_split();
                (EndpointReader::Tcp(rd), EndpointWriter::Tcp(wr))
            }
            #[cfg(all(feature = "unix-socket", unix))]
            Endpoint::Unix(t) => {
                let (rd, wr) = t.into_split();
                (EndpointReader::Unix(rd), EndpointWriter::Unix(wr))
            }
            #[cfg(feature = "serial")]
            Endpoint::Serial(t) => {
                let (rd, wr) = t.into_split();
                (EndpointReader::Serial(rd), EndpointWriter::Serial(wr))
            }
        }
    }
}

impl TransportOps for Endpoint {
    fn send<'a>(
        &'a mut self,
        buffers: &'a [IoSlice<'a>],
    ) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + 'a>> {
        match self {
            Endpoint::Tcp(t) => t.send(buffers),
            #[cfg(all(feature = "unix-socket", unix))]
            Endpoint::Unix(t) => t.send(buffers),
            #[cfg(feature = "serial")]
            Endpoint::Serial(t) => t.send(buffers),
        }
    }

    fn recv<'a>(
        &'a mut self,
        buffer: &'a mut [u8],
    ) -> Pin<Box<dyn Future<Output = Result<usize, TransportError>> + Send + 'a>> {
        match self {
            Endpoint::Tcp(t) => t.recv(buffer),
            #[cfg(all(feature = "unix-socket", unix))]
            Endpoint::Unix(t) => t.recv(buffer),
            #[cfg(feature = "serial")]
            Endpoint::Serial(t) => t.recv(buffer),
        }
    }

    fn shutdown<'a>(
        &'a mut self,
        timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        match self {
            Endpoint::Tcp(t) => t.shutdown(timeout),
            #[cfg(all(feature = "unix-socket", unix))]
            Endpoint::Unix(t) => t.shutdown(timeout),
            #[cfg(feature = "serial")]
            Endpoint::Serial(t) => t.shutdown(timeout),
        }
    }
}

/// The read half of a split [`Endpoint`].
#[derive(Debug)]
pub enum EndpointReader {
    Tcp(tokio::net::tcp::OwnedReadHalf),
    #[cfg(all(feature = "unix-socket", unix))]
    Unix(tokio::net::unix::OwnedReadHalf),
    #[cfg(feature = "serial")]
    Serial(SerialFramer<tokio::io::ReadHalf<tokio_serial::SerialStream>>),
}

impl EndpointReader {
    /// Reads at least one byte into `buf`, or `Ok(0)` on end-of-stream.
    pub async fn recv(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        match self {
            EndpointReader::Tcp(rd) => rd.read(buf).await.map_err(TransportError::from_socket_io),
            #[cfg(all(feature = "unix-socket", unix))]
            EndpointReader::Unix(rd) => rd.read(buf).await.map_err(TransportError::from_socket_io),
            #[cfg(feature = "serial")]
            EndpointReader::Serial(framer) => framer.recv(buf).await,
        }
    }
}

/// The write half of a split [`Endpoint`].
#[derive(Debug)]
pub enum EndpointWriter {
    Tcp(tokio::net::tcp::OwnedWriteHalf),
    #[cfg(all(feature = "unix-socket", unix))]
    Unix(tokio::net::unix::OwnedWriteHalf),
    #[cfg(feature = "serial")]
    Serial(tokio::io::WriteHalf<tokio_serial::SerialStream>),
}

impl EndpointWriter {
    /// Writes all of `buf`, looping over partial writes.
    pub async fn send_all(&mut self, buf: &[u8]) -> Result<(), TransportError> {
        match self {
            EndpointWriter::Tcp(wr) => {
                wr.write_all(buf).await.map_err(TransportError::from_socket_io)
            }
            #[cfg(all(feature = "unix-socket", unix))]
            EndpointWriter::Unix(wr) => {
                wr.write_all(buf).await.map_err(TransportError::from_socket_io)
            }
            #[cfg(feature = "serial")]
            EndpointWriter::Serial(wr) => {
                wr.write_all(buf).await.map_err(TransportError::from_serial_io)?;
                wr.flush().await.map_err(TransportError::from_serial_io)
            }
        }
    }

    /// Signals end-of-stream on the write side where the kind supports it.
    ///
    /// Socket halves propagate a half-close so the peer observes EOF after
    /// draining buffered data. Serial devices have no half-close; the pending
    /// output is flushed instead. Calling this twice is a no-op.
    pub async fn shutdown_write(&mut self) {
        match self {
            EndpointWriter::Tcp(wr) => {
                let _ = wr.shutdown().await;
            }
            #[cfg(all(feature = "unix-socket", unix))]
            EndpointWriter::Unix(wr) => {
                let _ = wr.shutdown().await;
            }
            #[cfg(feature = "serial")]
            EndpointWriter::Serial(wr) => {
                let _ = wr.flush().await;
            }
        }
    }
}
