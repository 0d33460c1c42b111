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

use std::collections::VecDeque;
use std::future::poll_fn;
use std::pin::Pin;
use std::task::Poll;

use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};
use tokio::time::{sleep, Duration};

use super::TransportError;

/// Default ring capacity, matching the relay chunk size.
pub const DEFAULT_BUFFER_CAPACITY: usize = 4096;

/// Consecutive device-level read failures tolerated before the device is
/// declared lost.
pub const DEFAULT_LOSS_THRESHOLD: u32 = 3;

/// Pause between retried reads while the device is flapping.
const UNAVAILABLE_RETRY_DELAY: Duration = Duration::from_millis(20);

/// Read-side layer for serial endpoints.
///
/// Character devices deliver bytes with no inherent grouping and can go away
/// without a clean EOF — an unplugged USB adapter turns every subsequent read
/// into an error instead. This layer does three things for the reader on top:
///
/// - coalesces short reads toward the caller's requested size, by draining
///   whatever the device has immediately available after the first awaited
///   read (never more than one extra read cycle of latency);
/// - translates a run of [`TransportError::DeviceUnavailable`] reads into a
///   single [`TransportError::DeviceLost`], so the connection supervisor sees
///   one reconnect trigger rather than a stream of byte-level errors;
/// - buffers pending bytes in a bounded ring that preserves arrival order and
///   never drops a byte once accepted.
///
/// It only re-chunks bytes; it never fabricates message boundaries — MQTT
/// frames its own messages on top of the stream.
#[derive(Debug)]
pub struct SerialFramer<R> {
    inner: R,
    buf: VecDeque<u8>,
    capacity: usize,
    scratch: Vec<u8>,
    loss_threshold: u32,
    consecutive_failures: u32,
    lost: bool,
}

impl<R> SerialFramer<R>
where
    R: AsyncRead + Unpin,
{
    /// Wraps `inner` with the default capacity and loss threshold.
    pub fn new(inner: R) -> Self {
        Self::with_capacity(inner, DEFAULT_BUFFER_CAPACITY, DEFAULT_LOSS_THRESHOLD)
    }

    /// Wraps `inner` with an explicit ring capacity and loss threshold.
    pub fn with_capacity(inner: R, capacity: usize, loss_threshold: u32) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner,
            buf: VecDeque::with_capacity(capacity),
            capacity,
            scratch: vec![0u8; capacity],
            loss_threshold: loss_threshold.max(1),
            consecutive_failures: 0,
            lost: false,
        }
    }

    /// Bytes currently buffered and not yet handed to the caller.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Reads at least one byte into `out`, or `Ok(0)` on end-of-stream.
    ///
    /// Once [`TransportError::DeviceLost`] has been returned the framer is
    /// poisoned and every further call returns it again; the endpoint must be
    /// reopened through the supervisor.
    pub async fn recv(&mut self, out: &mut [u8]) -> Result<usize, TransportError> {
        if self.lost {
            return Err(TransportError::DeviceLost);
        }
        if out.is_empty() {
            return Ok(0);
        }

        if self.buf.is_empty() {
            // First read awaits until the device produces something.
            loop {
                let room = self.capacity.min(self.scratch.len());
                match self.inner.read(&mut self.scratch[..room]).await {
                    Ok(0) => return Ok(0),
                    Ok(n) => {
                        self.consecutive_failures = 0;
                        self.buf.extend(&self.scratch[..n]);
                        break;
                    }
                    Err(e) => match TransportError::from_serial_io(e) {
                        TransportError::DeviceUnavailable => {
                            self.consecutive_failures += 1;
                            if self.consecutive_failures >= self.loss_threshold {
                                self.lost = true;
                                return Err(TransportError::DeviceLost);
                            }
                            sleep(UNAVAILABLE_RETRY_DELAY).await;
                        }
                        other => return Err(other),
                    },
                }
            }
            self.coalesce(out.len()).await;
        }

        let n = out.len().min(self.buf.len());
        for slot in out.iter_mut().take(n) {
            // Ring is non-empty for all n iterations by construction.
            if let Some(byte) = self.buf.pop_front() {
                *slot = byte;
            }
        }
        Ok(n)
    }

    /// Drains whatever the device already has, without waiting for more.
    ///
    /// Read failures and EOF are left for the next awaited read to report so
    /// the bytes gathered so far reach the caller first.
    async fn coalesce(&mut self, want: usize) {
        let want = want.min(self.capacity);
        poll_fn(|cx| {
            while self.buf.len() < want {
                let room = (self.capacity - self.buf.len()).min(self.scratch.len());
                if room == 0 {
                    break;
                }
                let mut read_buf = ReadBuf::new(&mut self.scratch[..room]);
                match Pin::new(&mut self.inner).poll_read(cx, &mut read_buf) {
                    Poll::Ready(Ok(())) => {
                        let filled = read_buf.filled();
                        if filled.is_empty() {
                            break;
                        }
                        let n = filled.len();
                        self.buf.extend(&self.scratch[..n]);
                    }
                    Poll::Ready(Err(_)) | Poll::Pending => break,
                }
            }
            Poll::Ready(())
        })
        .await;
    }
}
