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

use std::str::FromStr;
use std::time::Duration;

use derive_builder::Builder;
use getset::{CopyGetters, Getters};

/// The kind of channel an endpoint is opened over.
///
/// Selected by configuration; every component downstream of
/// [`Endpoint::open`](crate::mqtt_tun::transport::Endpoint::open) is
/// kind-agnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointKind {
    /// TCP socket, target is `host:port`.
    Tcp,
    /// Unix domain socket, target is a filesystem path.
    Unix,
    /// Serial character device, target is a device path.
    Serial,
}

impl std::fmt::Display for EndpointKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EndpointKind::Tcp => write!(f, "tcp"),
            EndpointKind::Unix => write!(f, "unix"),
            EndpointKind::Serial => write!(f, "serial"),
        }
    }
}

/// Serial parity setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SerialParity {
    #[default]
    None,
    Odd,
    Even,
}

/// Serial word size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SerialDataBits {
    Five,
    Six,
    Seven,
    #[default]
    Eight,
}

#[cfg(feature = "serial")]
impl From<SerialParity> for tokio_serial::Parity {
    fn from(p: SerialParity) -> Self {
        match p {
            SerialParity::None => tokio_serial::Parity::None,
            SerialParity::Odd => tokio_serial::Parity::Odd,
            SerialParity::Even => tokio_serial::Parity::Even,
        }
    }
}

#[cfg(feature = "serial")]
impl From<SerialDataBits> for tokio_serial::DataBits {
    fn from(b: SerialDataBits) -> Self {
        match b {
            SerialDataBits::Five => tokio_serial::DataBits::Five,
            SerialDataBits::Six => tokio_serial::DataBits::Six,
            SerialDataBits::Seven => tokio_serial::DataBits::Seven,
            SerialDataBits::Eight => tokio_serial::DataBits::Eight,
        }
    }
}

/// Configuration for opening one endpoint.
///
/// Built once and handed to the
/// [`ConnectionSupervisor`](crate::mqtt_tun::supervisor::ConnectionSupervisor);
/// the serial parameters are ignored for socket kinds.
///
/// # Usage
///
/// ```
/// use mqtt_tunnel_tokio::mqtt_tun::endpoint_config::{EndpointConfig, EndpointKind};
///
/// let config = EndpointConfig::builder()
///     .kind(EndpointKind::Tcp)
///     .target("127.0.0.1:1883")
///     .build()
///     .unwrap();
/// assert_eq!(config.read_buffer_size(), 4096);
/// ```
#[derive(Debug, Clone, Builder, Getters, CopyGetters)]
#[builder(derive(Debug), pattern = "owned", setter(into))]
pub struct EndpointConfig {
    /// Endpoint kind to open.
    #[getset(get_copy = "pub")]
    kind: EndpointKind,

    /// Address, path, or device name, depending on the kind.
    #[getset(get = "pub")]
    target: String,

    /// Serial line speed.
    ///
    /// # Default
    /// 115200
    #[builder(default = "115_200")]
    #[getset(get_copy = "pub")]
    baud_rate: u32,

    /// Serial word size.
    ///
    /// # Default
    /// Eight
    #[builder(default)]
    #[getset(get_copy = "pub")]
    data_bits: SerialDataBits,

    /// Serial parity.
    ///
    /// # Default
    /// None
    #[builder(default)]
    #[getset(get_copy = "pub")]
    parity: SerialParity,

    /// Size of the read buffer handed to each `recv`, and of the serial
    /// framer's ring.
    ///
    /// # Default
    /// 4096
    #[builder(default = "4096")]
    #[getset(get_copy = "pub")]
    read_buffer_size: usize,

    /// Per-attempt connection timeout. `None` waits as long as the operating
    /// system does.
    ///
    /// # Default
    /// None
    #[builder(default = "None", setter(into, strip_option))]
    #[getset(get_copy = "pub")]
    connect_timeout: Option<Duration>,
}

impl EndpointConfig {
    /// Creates a builder for full control over every field.
    pub fn builder() -> EndpointConfigBuilder {
        EndpointConfigBuilder::default()
    }

    /// TCP endpoint with defaults, target `host:port`.
    pub fn tcp(addr: impl Into<String>) -> Self {
        Self::with_kind(EndpointKind::Tcp, addr.into())
    }

    /// Unix domain socket endpoint with defaults.
    pub fn unix(path: impl Into<String>) -> Self {
        Self::with_kind(EndpointKind::Unix, path.into())
    }

    /// Serial endpoint with defaults (115200 8N1).
    pub fn serial(device: impl Into<String>) -> Self {
        Self::with_kind(EndpointKind::Serial, device.into())
    }

    fn with_kind(kind: EndpointKind, target: String) -> Self {
        Self {
            kind,
            target,
            baud_rate: 115_200,
            data_bits: SerialDataBits::Eight,
            parity: SerialParity::None,
            read_buffer_size: 4096,
            connect_timeout: None,
        }
    }
}

/// Error produced when an endpoint spec string does not parse.
#[derive(Debug)]
pub struct ParseEndpointError(String);

impl std::fmt::Display for ParseEndpointError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid endpoint spec: {}", self.0)
    }
}

impl std::error::Error for ParseEndpointError {}

/// Parses the driver's endpoint spec strings:
///
/// - `tcp:HOST:PORT`
/// - `unix:/path/to/socket`
/// - `serial:/dev/ttyUSB0` or `serial:/dev/ttyUSB0:115200`
impl FromStr for EndpointConfig {
    type Err = ParseEndpointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, rest) = s
            .split_once(':')
            .ok_or_else(|| ParseEndpointError(format!("missing kind prefix in {s:?}")))?;
        if rest.is_empty() {
            return Err(ParseEndpointError(format!("empty target in {s:?}")));
        }
        match kind {
            "tcp" => Ok(EndpointConfig::tcp(rest)),
            "unix" => Ok(EndpointConfig::unix(rest)),
            "serial" => {
                // Optional trailing baud rate after the device path.
                if let Some((device, baud)) = rest.rsplit_once(':') {
                    if let Ok(baud) = baud.parse::<u32>() {
                        let mut config = EndpointConfig::serial(device);
                        config.baud_rate = baud;
                        return Ok(config);
                    }
                }
                Ok(EndpointConfig::serial(rest))
            }
            other => Err(ParseEndpointError(format!("unknown endpoint kind {other:?}"))),
        }
    }
}
