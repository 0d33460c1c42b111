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

use super::{TransportError, TransportOps};
use std::future::Future;
use std::io::IoSlice;
use std::pin::Pin;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;
use tokio::time::{timeout, Duration};

/// Unix domain socket transport.
///
/// The usual channel between a local MQTT client and a broker socket (the
/// original deployment pairs a Mosquitto-created socket with a QEMU-created
/// one). Only available on Unix platforms.
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
#[derive(Debug)]
pub struct UnixStreamTransport {
    stream: UnixStream,
}

impl UnixStreamTransport {
    /// Creates a transport from an already connected Unix stream.
    ///
    /// Also usable server-side with a stream obtained from
    /// `UnixListener::accept`.
    pub fn from_stream(stream: UnixStream) -> Self {
        Self { stream }
    }

    /// Splits into independently owned read and write halves.
    pub fn into_split(self) -> (OwnedReadHalf, OwnedWriteHalf) {
        self.stream.into_split()
    }
}

impl TransportOps for UnixStreamTransport {
    fn send<'a>(
        &'a mut self,
        buffers: &'a [IoSlice<'a>],
    ) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + 'a>> {
        Box::pin(async move {
            for buf in buffers {
                self.stream
                    .write_all(buf)
                    .await
                    .map_err(TransportError::from_socket_io)?;
            }
            self.stream
                .flush()
                .await
                .map_err(TransportError::from_socket_io)
        })
    }

    fn recv<'a>(
        &'a mut self,
        buffer: &'a mut [u8],
    ) -> Pin<Box<dyn Future<Output = Result<usize, TransportError>> + Send + 'a>> {
        Box::pin(async move {
            self.stream
                .read(buffer)
                .await
                .map_err(TransportError::from_socket_io)
        })
    }

    fn shutdown<'a>(
        &'a mut self,
        timeout_duration: Duration,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            // Graceful first; on error or timeout the stream is force-closed
            // when it goes out of scope.
            let _ = timeout(timeout_duration, self.stream.shutdown()).await;
        })
    }
}
