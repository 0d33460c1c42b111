/**
 * MIT License
 *
 * Copyright (c) 2025 Takatoshi Kondo
 *
 * Permission is hereby granted, free of charge, to any person obtaining a copy
 * of this software and associated documentation files (the "Software"), to deal
 * in the Software without restriction, including without limitation the rights
 * to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
 * copies of the Software, and to permit persons to whom the Software is
 * furnished to do so, subject to the following conditions:
 *
 * The above copyright notice and this permission notice shall be included in all
 * copies or substantial portions of the Software.
 *
 * THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
 * IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
 * FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
 * AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
 * LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
 * OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
 * SOFTWARE.
 */
use std::collections::VecDeque;
use std::future::Future;
use std::io::IoSlice;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::io::{AsyncRead, ReadBuf};

use mqtt_tunnel_tokio::mqtt_tun::TransportError;
use mqtt_tunnel_tokio::mqtt_tun::TransportOps;

/// Call record for tracking method invocations
#[derive(Debug, Clone, PartialEq)]
#[allow(dead_code)]
pub enum TransportCall {
    Send { data: Vec<u8> },
    Recv { buffer_size: usize },
    Shutdown { timeout: Duration },
}

/// Response configuration for controlling stub behavior
#[derive(Debug)]
#[allow(dead_code)]
pub enum TransportResponse {
    SendOk,
    SendErr(TransportError),
    RecvOk(Vec<u8>),
    RecvErr(TransportError),
    Shutdown,
}

/// Stub transport implementation for testing
#[derive(Clone)]
pub struct StubTransport {
    /// Record of method calls made to this transport
    pub calls: Arc<Mutex<Vec<TransportCall>>>,
    /// Queue of responses to return for method calls
    responses: Arc<Mutex<VecDeque<TransportResponse>>>,
}

#[allow(dead_code)]
impl StubTransport {
    /// Create a new StubTransport
    pub fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            responses: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    /// Add a response to the queue
    pub fn add_response(&mut self, response: TransportResponse) {
        self.responses.lock().unwrap().push_back(response);
    }

    /// Add multiple responses to the queue
    pub fn add_responses(&mut self, responses: Vec<TransportResponse>) {
        let mut queue = self.responses.lock().unwrap();
        for response in responses {
            queue.push_back(response);
        }
    }

    /// Get all recorded calls
    pub fn get_calls(&self) -> Vec<TransportCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Get the next response from the queue, or return a default error
    fn get_next_response(&self) -> TransportResponse {
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(TransportResponse::RecvErr(TransportError::NotConnected))
    }
}

impl TransportOps for StubTransport {
    fn send<'a>(
        &'a mut self,
        buffers: &'a [IoSlice<'a>],
    ) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + 'a>> {
        Box::pin(async move {
            let data: Vec<u8> = buffers
                .iter()
                .flat_map(|slice| slice.iter().copied())
                .collect();
            self.calls.lock().unwrap().push(TransportCall::Send { data });
            match self.get_next_response() {
                TransportResponse::SendOk => Ok(()),
                TransportResponse::SendErr(e) => Err(e),
                other => panic!("unexpected response for send: {other:?}"),
            }
        })
    }

    fn recv<'a>(
        &'a mut self,
        buffer: &'a mut [u8],
    ) -> Pin<Box<dyn Future<Output = Result<usize, TransportError>> + Send + 'a>> {
        Box::pin(async move {
            self.calls.lock().unwrap().push(TransportCall::Recv {
                buffer_size: buffer.len(),
            });
            match self.get_next_response() {
                TransportResponse::RecvOk(data) => {
                    let n = data.len().min(buffer.len());
                    buffer[..n].copy_from_slice(&data[..n]);
                    Ok(n)
                }
                TransportResponse::RecvErr(e) => Err(e),
                other => panic!("unexpected response for recv: {other:?}"),
            }
        })
    }

    fn shutdown<'a>(
        &'a mut self,
        timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            self.calls
                .lock()
                .unwrap()
                .push(TransportCall::Shutdown { timeout });
        })
    }
}

/// One step a [`ScriptedReader`] performs per poll
#[derive(Debug)]
#[allow(dead_code)]
pub enum ReadStep {
    /// Deliver these bytes
    Data(Vec<u8>),
    /// Fail with this raw OS errno (5 = EIO, the unplugged-device error)
    OsError(i32),
    /// Report end-of-stream
    Eof,
    /// Return pending once, waking immediately
    PendingOnce,
}

/// AsyncRead implementation driven by a fixed script, for exercising the
/// serial read path without a real character device
pub struct ScriptedReader {
    steps: VecDeque<ReadStep>,
}

#[allow(dead_code)]
impl ScriptedReader {
    pub fn new(steps: Vec<ReadStep>) -> Self {
        Self {
            steps: steps.into(),
        }
    }
}

impl AsyncRead for ScriptedReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        match self.steps.pop_front() {
            Some(ReadStep::Data(data)) => {
                let n = data.len().min(buf.remaining());
                buf.put_slice(&data[..n]);
                Poll::Ready(Ok(()))
            }
            Some(ReadStep::OsError(errno)) => {
                Poll::Ready(Err(std::io::Error::from_raw_os_error(errno)))
            }
            Some(ReadStep::Eof) | None => Poll::Ready(Ok(())),
            Some(ReadStep::PendingOnce) => {
                cx.waker().wake_by_ref();
                Poll::Pending
            }
        }
    }
}
