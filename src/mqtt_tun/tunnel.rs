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

//! Bidirectional byte relay between two endpoints.
//!
//! A [`Tunnel`] pairs two open [`Endpoint`]s and pumps bytes both ways until
//! either side terminates. Each direction runs as its own task so a slow or
//! blocked write in one direction never stalls reads in the other; the two
//! directions are independent streams with no ordering between them, while
//! bytes within one direction arrive exactly as read.

use derive_builder::Builder;
use getset::CopyGetters;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Duration;

use crate::mqtt_tun::transport::{Endpoint, EndpointReader, EndpointWriter, TransportError};

/// Default relay chunk size in bytes.
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Default budget for unblocking in-flight I/O once a close is underway.
pub const DEFAULT_FORCED_CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Lifecycle of a tunnel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TunnelState {
    /// Created, relay tasks not yet running.
    Idle,
    /// Both directions are pumping bytes.
    Relaying,
    /// A close is underway; directions are being unblocked and drained.
    Closing,
    /// Both directions have terminated and both endpoints are closed.
    Closed,
}

/// Terminal outcome of a tunnel, reported once it reaches
/// [`TunnelState::Closed`].
#[derive(Debug)]
pub enum TunnelOutcome {
    /// Both directions ended with a clean end-of-stream, buffered bytes
    /// drained.
    Graceful,
    /// The caller closed the tunnel before it terminated naturally. Bytes
    /// still in flight at that moment were truncated, not silently dropped.
    Closed,
    /// A hard error terminated both directions. When an error and an EOF land
    /// in the same scheduling step, the error wins for reporting purposes.
    Abrupt(TransportError),
}

impl TunnelOutcome {
    /// `true` only for a clean both-sides-EOF termination.
    pub fn is_graceful(&self) -> bool {
        matches!(self, TunnelOutcome::Graceful)
    }
}

/// Tuning knobs for a tunnel.
///
/// # Usage
///
/// ```
/// use mqtt_tunnel_tokio::mqtt_tun::tunnel::TunnelOption;
/// use tokio::time::Duration;
///
/// let options = TunnelOption::builder()
///     .chunk_size(16 * 1024usize)
///     .forced_close_timeout(Duration::from_millis(500))
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone, Builder, CopyGetters)]
#[builder(derive(Debug), pattern = "owned", setter(into))]
pub struct TunnelOption {
    /// Maximum bytes moved per read in each direction.
    ///
    /// # Default
    /// 4096
    #[builder(default = "DEFAULT_CHUNK_SIZE")]
    #[getset(get_copy = "pub")]
    chunk_size: usize,

    /// How long a close waits for in-flight I/O before aborting the relay
    /// tasks outright.
    ///
    /// # Default
    /// 1s
    #[builder(default = "DEFAULT_FORCED_CLOSE_TIMEOUT")]
    #[getset(get_copy = "pub")]
    forced_close_timeout: Duration,
}

impl TunnelOption {
    /// Creates a builder.
    pub fn builder() -> TunnelOptionBuilder {
        TunnelOptionBuilder::default()
    }
}

impl Default for TunnelOption {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            forced_close_timeout: DEFAULT_FORCED_CLOSE_TIMEOUT,
        }
    }
}

/// How one relay direction ended, short of a hard error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DirectionEnd {
    /// Source returned end-of-stream; the destination write side was
    /// half-closed.
    Eof,
    /// The direction was told to stop mid-stream.
    Cancelled,
}

/// A bidirectional byte relay between two endpoints.
///
/// The tunnel owns both endpoints for its lifetime. Construction with
/// [`Tunnel::start`] immediately transitions to [`TunnelState::Relaying`];
/// the tunnel reaches [`TunnelState::Closed`] when both directions have
/// terminated (graceful), as soon as either direction reports a hard error
/// (abrupt), or when the caller closes it. Closing is idempotent and closes
/// both endpoints exactly once.
///
/// # Examples
///
/// ```no_run
/// use mqtt_tunnel_tokio::mqtt_tun::endpoint_config::EndpointConfig;
/// use mqtt_tunnel_tokio::mqtt_tun::transport::Endpoint;
/// use mqtt_tunnel_tokio::mqtt_tun::tunnel::Tunnel;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let a = Endpoint::open(&EndpointConfig::unix("/tmp/client.sock")).await?;
/// let b = Endpoint::open(&EndpointConfig::unix("/tmp/broker.sock")).await?;
/// let mut tunnel = Tunnel::start(a, b);
/// let outcome = tunnel.wait().await;
/// println!("tunnel finished: {outcome:?}");
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Tunnel {
    state_rx: watch::Receiver<TunnelState>,
    close_tx: mpsc::Sender<()>,
    done: Option<JoinHandle<TunnelOutcome>>,
    outcome: Option<TunnelOutcome>,
}

impl Tunnel {
    /// Starts relaying between `a` and `b` with default options.
    pub fn start(a: Endpoint, b: Endpoint) -> Self {
        Self::start_with_options(a, b, TunnelOption::default())
    }

    /// Starts relaying between `a` and `b` with explicit options.
    pub fn start_with_options(a: Endpoint, b: Endpoint, options: TunnelOption) -> Self {
        let (a_rd, a_wr) = a.into_split();
        let (b_rd, b_wr) = b.into_split();

        let (state_tx, state_rx) = watch::channel(TunnelState::Idle);
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let (close_tx, close_rx) = mpsc::channel(1);

        let chunk = options.chunk_size().max(1);
        let ab = tokio::spawn(relay_direction("a->b", a_rd, b_wr, chunk, cancel_rx.clone()));
        let ba = tokio::spawn(relay_direction("b->a", b_rd, a_wr, chunk, cancel_rx));

        let _ = state_tx.send(TunnelState::Relaying);
        let done = tokio::spawn(supervise_relay(
            ab,
            ba,
            cancel_tx,
            close_rx,
            state_tx,
            options.forced_close_timeout(),
        ));

        Self {
            state_rx,
            close_tx,
            done: Some(done),
            outcome: None,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> TunnelState {
        *self.state_rx.borrow()
    }

    /// A receiver that observes every state transition.
    pub fn state_changes(&self) -> watch::Receiver<TunnelState> {
        self.state_rx.clone()
    }

    /// Waits for the tunnel to terminate and returns its outcome.
    ///
    /// Subsequent calls return the recorded outcome without waiting.
    /// Cancellation-safe: a `wait` future dropped mid-await (for example
    /// losing a `select!` race) leaves the tunnel intact, and the next call
    /// resumes waiting for the real outcome.
    pub async fn wait(&mut self) -> &TunnelOutcome {
        if let Some(handle) = self.done.as_mut() {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                // The supervision task never panics; treat a lost task as an
                // abrupt teardown.
                Err(e) => TunnelOutcome::Abrupt(TransportError::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    e,
                ))),
            };
            self.done = None;
            self.outcome = Some(outcome);
        }
        self.outcome.get_or_insert(TunnelOutcome::Closed)
    }

    /// Closes the tunnel, unblocking any in-progress reads and writes
    /// promptly, and returns the outcome.
    ///
    /// Idempotent: closing an already closed tunnel returns the recorded
    /// outcome unchanged.
    pub async fn close(&mut self) -> &TunnelOutcome {
        let _ = self.close_tx.try_send(());
        self.wait().await
    }

    /// Outcome if the tunnel has already been waited on.
    pub fn outcome(&self) -> Option<&TunnelOutcome> {
        self.outcome.as_ref()
    }
}

/// One relay direction: read chunks from `src`, write them whole to `dst`.
///
/// EOF from the source half-closes the destination and ends the direction
/// gracefully; any read or write error ends it hard. The destination write
/// half is dropped (closing that side) when the task returns.
async fn relay_direction(
    label: &'static str,
    mut src: EndpointReader,
    mut dst: EndpointWriter,
    chunk_size: usize,
    mut cancel: watch::Receiver<bool>,
) -> Result<DirectionEnd, TransportError> {
    let mut buf = vec![0u8; chunk_size];
    loop {
        let n = tokio::select! {
            read = src.recv(&mut buf) => read?,
            _ = cancel.changed() => {
                tracing::debug!(direction = label, "relay cancelled while reading");
                return Ok(DirectionEnd::Cancelled);
            }
        };
        if n == 0 {
            tracing::debug!(direction = label, "source EOF, half-closing destination");
            dst.shutdown_write().await;
            return Ok(DirectionEnd::Eof);
        }
        tokio::select! {
            write = dst.send_all(&buf[..n]) => write?,
            _ = cancel.changed() => {
                tracing::debug!(direction = label, "relay cancelled while writing");
                return Ok(DirectionEnd::Cancelled);
            }
        }
    }
}

fn record_direction(
    result: Result<Result<DirectionEnd, TransportError>, tokio::task::JoinError>,
    first_error: &mut Option<TransportError>,
    cancelled: &mut bool,
) {
    match result {
        Ok(Ok(DirectionEnd::Eof)) => {}
        Ok(Ok(DirectionEnd::Cancelled)) => *cancelled = true,
        Ok(Err(e)) => {
            if first_error.is_none() {
                *first_error = Some(e);
            }
        }
        Err(join_error) => {
            if !join_error.is_cancelled() && first_error.is_none() {
                *first_error = Some(TransportError::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    join_error,
                )));
            }
        }
    }
}

/// Watches both direction tasks and produces the tunnel outcome.
///
/// Both directions ending in EOF is a graceful full close. The first hard
/// error — or a caller close request — cancels the opposite direction and
/// bounds the drain with `forced_timeout`, aborting the tasks if they do not
/// unblock in time.
async fn supervise_relay(
    ab: JoinHandle<Result<DirectionEnd, TransportError>>,
    ba: JoinHandle<Result<DirectionEnd, TransportError>>,
    cancel_tx: watch::Sender<bool>,
    mut close_rx: mpsc::Receiver<()>,
    state_tx: watch::Sender<TunnelState>,
    forced_timeout: Duration,
) -> TunnelOutcome {
    let mut ab = ab;
    let mut ba = ba;
    let mut ab_done = false;
    let mut ba_done = false;
    let mut first_error: Option<TransportError> = None;
    let mut cancelled = false;
    let mut user_closed = false;

    while !(ab_done && ba_done) {
        tokio::select! {
            result = &mut ab, if !ab_done => {
                ab_done = true;
                record_direction(result, &mut first_error, &mut cancelled);
                if first_error.is_some() {
                    break;
                }
            }
            result = &mut ba, if !ba_done => {
                ba_done = true;
                record_direction(result, &mut first_error, &mut cancelled);
                if first_error.is_some() {
                    break;
                }
            }
            _ = close_rx.recv(), if !user_closed => {
                user_closed = true;
                break;
            }
        }
    }

    if !(ab_done && ba_done) {
        let _ = state_tx.send(TunnelState::Closing);
        let _ = cancel_tx.send(true);
        let deadline = tokio::time::sleep(forced_timeout);
        tokio::pin!(deadline);
        while !(ab_done && ba_done) {
            tokio::select! {
                result = &mut ab, if !ab_done => {
                    ab_done = true;
                    record_direction(result, &mut first_error, &mut cancelled);
                }
                result = &mut ba, if !ba_done => {
                    ba_done = true;
                    record_direction(result, &mut first_error, &mut cancelled);
                }
                _ = &mut deadline => {
                    tracing::warn!("forced close timeout expired, aborting relay tasks");
                    if !ab_done {
                        ab.abort();
                    }
                    if !ba_done {
                        ba.abort();
                    }
                    break;
                }
            }
        }
    }

    let _ = state_tx.send(TunnelState::Closed);

    if let Some(error) = first_error {
        tracing::debug!(%error, "tunnel closed abruptly");
        TunnelOutcome::Abrupt(error)
    } else if user_closed || cancelled {
        tracing::debug!("tunnel closed by caller");
        TunnelOutcome::Closed
    } else {
        tracing::debug!("tunnel closed gracefully");
        TunnelOutcome::Graceful
    }
}
