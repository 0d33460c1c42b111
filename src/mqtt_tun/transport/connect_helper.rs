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

/// Helper functions for establishing connections for each endpoint kind.
///
/// These produce connected streams for the transport `from_stream`
/// constructors, plus the config-driven [`open_endpoint`] dispatch the
/// supervisor uses. Each helper takes an optional timeout; `None` waits as
/// long as the operating system does.
use super::TransportError;
use std::net::SocketAddr;
use tokio::net::TcpStream;
use tokio::time::Duration;

use crate::mqtt_tun::endpoint_config::{EndpointConfig, EndpointKind};
use crate::mqtt_tun::transport::Endpoint;
use crate::mqtt_tun::transport::TcpTransport;
#[cfg(all(feature = "unix-socket", unix))]
use crate::mqtt_tun::transport::UnixStreamTransport;
#[cfg(feature = "serial")]
use crate::mqtt_tun::transport::SerialTransport;

/// Establishes a TCP connection to `addr` (`host:port` form, e.g.
/// `"127.0.0.1:1883"`).
///
/// # Examples
///
/// ```no_run
/// use mqtt_tunnel_tokio::mqtt_tun::transport::{connect_helper, TcpTransport};
/// use tokio::time::Duration;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let stream = connect_helper::connect_tcp("127.0.0.1:1883", Some(Duration::from_secs(10))).await?;
/// let transport = TcpTransport::from_stream(stream);
/// # Ok(())
/// # }
/// ```
pub async fn connect_tcp(
    addr: &str,
    timeout: Option<Duration>,
) -> Result<TcpStream, TransportError> {
    let socket_addr: SocketAddr = addr
        .parse()
        .map_err(|e| TransportError::Connect(format!("Invalid address: {e}")))?;

    match timeout {
        Some(timeout_duration) => {
            tokio::time::timeout(timeout_duration, TcpStream::connect(socket_addr))
                .await
                .map_err(|_| TransportError::Timeout)?
                .map_err(TransportError::from_socket_io)
        }
        None => TcpStream::connect(socket_addr)
            .await
            .map_err(TransportError::from_socket_io),
    }
}

/// Establishes a Unix domain socket connection to `path`.
///
/// # Examples
///
/// ```no_run
/// use mqtt_tunnel_tokio::mqtt_tun::transport::{connect_helper, UnixStreamTransport};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let stream = connect_helper::connect_unix("/tmp/mqtt.sock", None).await?;
/// let transport = UnixStreamTransport::from_stream(stream);
/// # Ok(())
/// # }
/// ```
#[cfg(all(feature = "unix-socket", unix))]
pub async fn connect_unix(
    path: &str,
    timeout: Option<Duration>,
) -> Result<tokio::net::UnixStream, TransportError> {
    match timeout {
        Some(timeout_duration) => {
            tokio::time::timeout(timeout_duration, tokio::net::UnixStream::connect(path))
                .await
                .map_err(|_| TransportError::Timeout)?
                .map_err(TransportError::from_socket_io)
        }
        None => tokio::net::UnixStream::connect(path)
            .await
            .map_err(TransportError::from_socket_io),
    }
}

/// Opens the serial device named by `config` with the configured parameters.
///
/// Input and output buffers are cleared on open so a fresh session never
/// starts with stale bytes from a previous one.
#[cfg(feature = "serial")]
pub async fn open_serial(
    config: &EndpointConfig,
) -> Result<tokio_serial::SerialStream, TransportError> {
    use tokio_serial::SerialPort;
    use tokio_serial::SerialPortBuilderExt;

    let builder = tokio_serial::new(config.target(), config.baud_rate())
        .data_bits(config.data_bits().into())
        .parity(config.parity().into());

    let stream = builder
        .open_native_async()
        .map_err(from_serial_open_error)?;

    let _ = stream.clear(tokio_serial::ClearBuffer::All);
    Ok(stream)
}

#[cfg(feature = "serial")]
fn from_serial_open_error(e: tokio_serial::Error) -> TransportError {
    match e.kind {
        tokio_serial::ErrorKind::NoDevice => TransportError::DeviceUnavailable,
        tokio_serial::ErrorKind::Io(std::io::ErrorKind::NotFound) => {
            TransportError::DeviceUnavailable
        }
        _ => TransportError::Connect(e.description),
    }
}

/// Opens one [`Endpoint`] of the kind named by `config`.
///
/// This is the single connection attempt the
/// [`ConnectionSupervisor`](crate::mqtt_tun::supervisor::ConnectionSupervisor)
/// wraps in its retry loop. The returned endpoint is fully open; callers never
/// see a half-initialized one.
pub async fn open_endpoint(config: &EndpointConfig) -> Result<Endpoint, TransportError> {
    match config.kind() {
        EndpointKind::Tcp => {
            let stream = connect_tcp(config.target(), config.connect_timeout()).await?;
            Ok(Endpoint::Tcp(TcpTransport::from_stream(stream)))
        }
        #[cfg(all(feature = "unix-socket", unix))]
        EndpointKind::Unix => {
            let stream = connect_unix(config.target(), config.connect_timeout()).await?;
            Ok(Endpoint::Unix(UnixStreamTransport::from_stream(stream)))
        }
        #[cfg(not(all(feature = "unix-socket", unix)))]
        EndpointKind::Unix => Err(TransportError::Connect(
            "unix-socket support is not enabled".to_string(),
        )),
        #[cfg(feature = "serial")]
        EndpointKind::Serial => {
            let stream = open_serial(config).await?;
            Ok(Endpoint::Serial(SerialTransport::from_stream_with_buffer(
                stream,
                config.read_buffer_size(),
            )))
        }
        #[cfg(not(feature = "serial"))]
        EndpointKind::Serial => Err(TransportError::Connect(
            "serial support is not enabled".to_string(),
        )),
    }
}
