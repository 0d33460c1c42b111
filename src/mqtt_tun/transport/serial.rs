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

use super::serial_framer::{SerialFramer, DEFAULT_LOSS_THRESHOLD};
use super::{TransportError, TransportOps};
use std::future::Future;
use std::io::IoSlice;
use std::pin::Pin;
use tokio::io::{AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::time::{timeout, Duration};
use tokio_serial::SerialStream;

/// Serial character device transport.
///
/// Reads go through a [`SerialFramer`] so callers get coalesced chunks and a
/// single [`TransportError::DeviceLost`] when the device disappears; writes
/// are flushed eagerly because a character device buffers aggressively and
/// MQTT keep-alive traffic must not sit in a kernel queue.
///
/// Accepts already opened streams via [`SerialTransport::from_stream`]; device
/// opening (including parameter setup and buffer clearing) lives in
/// [`connect_helper`](crate::mqtt_tun::transport::connect_helper).
#[derive(Debug)]
pub struct SerialTransport {
    reader: SerialFramer<ReadHalf<SerialStream>>,
    writer: WriteHalf<SerialStream>,
}

impl SerialTransport {
    /// Creates a transport from an already opened serial stream with the
    /// default read buffer size.
    pub fn from_stream(stream: SerialStream) -> Self {
        Self::from_stream_with_buffer(stream, super::serial_framer::DEFAULT_BUFFER_CAPACITY)
    }

    /// Creates a transport with an explicit read buffer size.
    pub fn from_stream_with_buffer(stream: SerialStream, read_buffer_size: usize) -> Self {
        let (rd, wr) = tokio::io::split(stream);
        Self {
            reader: SerialFramer::with_capacity(rd, read_buffer_size, DEFAULT_LOSS_THRESHOLD),
            writer: wr,
        }
    }

    /// Splits into the framed reader and the raw write half.
    pub fn into_split(self) -> (SerialFramer<ReadHalf<SerialStream>>, WriteHalf<SerialStream>) {
        (self.reader, self.writer)
    }
}

impl TransportOps for SerialTransport {
    fn send<'a>(
        &'a mut self,
        buffers: &'a [IoSlice<'a>],
    ) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + 'a>> {
        Box::pin(async move {
            for buf in buffers {
                self.writer
                    .write_all(buf)
                    .await
                    .map_err(TransportError::from_serial_io)?;
            }
            self.writer
                .flush()
                .await
                .map_err(TransportError::from_serial_io)
        })
    }

    fn recv<'a>(
        &'a mut self,
        buffer: &'a mut [u8],
    ) -> Pin<Box<dyn Future<Output = Result<usize, TransportError>> + Send + 'a>> {
        Box::pin(async move { self.reader.recv(buffer).await })
    }

    fn shutdown<'a>(
        &'a mut self,
        timeout_duration: Duration,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            // No half-close on a character device; drain pending output and
            // let the file handle close on drop.
            let _ = timeout(timeout_duration, self.writer.flush()).await;
        })
    }
}
