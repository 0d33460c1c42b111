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

//! Connection lifecycle management with retry and exponential backoff.

use tokio::sync::watch;
use tokio::time::{sleep, Duration, Instant};

use crate::mqtt_tun::bridge_error::BridgeError;
use crate::mqtt_tun::endpoint_config::EndpointConfig;
use crate::mqtt_tun::retry::RetryPolicy;
use crate::mqtt_tun::transport::{Endpoint, TransportError};

/// Default connected period required before the attempt counter resets.
pub const DEFAULT_MIN_STABILITY: Duration = Duration::from_secs(30);

/// Observable lifecycle of a supervised connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection and none being attempted.
    Disconnected,
    /// First connection attempt in progress.
    Connecting,
    /// A live endpoint was handed to the consumer.
    Connected,
    /// Re-attempting after a loss; carries the current attempt number.
    Reconnecting(u32),
    /// The retry policy gave up; carries the final error text.
    Failed(String),
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Reconnecting(attempt) => write!(f, "reconnecting (attempt {attempt})"),
            ConnectionState::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// Opens endpoints on behalf of a consumer, retrying with exponential backoff
/// and publishing its lifecycle on a watch channel.
///
/// The supervisor owns the endpoint configuration and the [`RetryPolicy`];
/// the consumer calls [`connect`](ConnectionSupervisor::connect) for the
/// first endpoint and [`reconnect`](ConnectionSupervisor::reconnect) after
/// each loss. The attempt counter carries across reconnects and only resets
/// once a connection has stayed up for the minimum stability window, so a
/// link that flaps every few seconds keeps climbing the backoff curve instead
/// of hammering the peer from the start each time.
///
/// # Examples
///
/// ```no_run
/// use mqtt_tunnel_tokio::mqtt_tun::endpoint_config::EndpointConfig;
/// use mqtt_tunnel_tokio::mqtt_tun::retry::RetryPolicy;
/// use mqtt_tunnel_tokio::mqtt_tun::supervisor::ConnectionSupervisor;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = EndpointConfig::tcp("127.0.0.1:1883");
/// let policy = RetryPolicy::builder().max_attempts(5u32).build()?;
/// let mut supervisor = ConnectionSupervisor::new(config, policy);
/// let endpoint = supervisor.connect().await?;
/// # let _ = endpoint;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ConnectionSupervisor {
    config: EndpointConfig,
    policy: RetryPolicy,
    min_stability: Duration,
    state_tx: watch::Sender<ConnectionState>,
    attempts: u32,
    connected_at: Option<Instant>,
    disconnected_at: Option<Instant>,
}

impl ConnectionSupervisor {
    /// Creates a supervisor for the given endpoint configuration.
    pub fn new(config: EndpointConfig, policy: RetryPolicy) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            config,
            policy,
            min_stability: DEFAULT_MIN_STABILITY,
            state_tx,
            attempts: 0,
            connected_at: None,
            disconnected_at: None,
        }
    }

    /// Overrides the connected period required before the attempt counter
    /// resets.
    pub fn with_min_stability(mut self, min_stability: Duration) -> Self {
        self.min_stability = min_stability;
        self
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.state_tx.borrow().clone()
    }

    /// A receiver that observes every state transition.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// The endpoint configuration this supervisor connects to.
    pub fn config(&self) -> &EndpointConfig {
        &self.config
    }

    /// Opens the first endpoint, retrying per the policy.
    ///
    /// Resets the attempt counter before starting.
    pub async fn connect(&mut self) -> Result<Endpoint, BridgeError> {
        self.attempts = 0;
        self.run(false).await
    }

    /// Opens a replacement endpoint after a connection loss.
    ///
    /// The attempt counter continues from where the previous cycle left off
    /// unless the last connection stayed up for at least the minimum
    /// stability window, in which case the backoff schedule starts over. The
    /// window is measured up to the recorded disconnect, not up to this call,
    /// so a loss reported late does not make a short-lived connection look
    /// stable.
    pub async fn reconnect(&mut self) -> Result<Endpoint, BridgeError> {
        if let Some(connected_at) = self.connected_at.take() {
            let connected_until = self.disconnected_at.take().unwrap_or_else(Instant::now);
            if connected_until.duration_since(connected_at) >= self.min_stability {
                self.attempts = 0;
            }
        }
        self.run(true).await
    }

    /// Records a connection loss observed by the consumer.
    pub fn mark_disconnected(&mut self, error: &TransportError) {
        tracing::warn!(
            kind = %self.config.kind(),
            target = self.config.target(),
            %error,
            "connection lost"
        );
        self.disconnected_at = Some(Instant::now());
        let _ = self.state_tx.send(ConnectionState::Disconnected);
    }

    async fn run(&mut self, reconnecting: bool) -> Result<Endpoint, BridgeError> {
        loop {
            self.attempts += 1;
            let state = if reconnecting {
                ConnectionState::Reconnecting(self.attempts)
            } else {
                ConnectionState::Connecting
            };
            let _ = self.state_tx.send(state);

            match Endpoint::open(&self.config).await {
                Ok(endpoint) => {
                    tracing::info!(
                        kind = %self.config.kind(),
                        target = self.config.target(),
                        attempt = self.attempts,
                        "endpoint connected"
                    );
                    self.connected_at = Some(Instant::now());
                    self.disconnected_at = None;
                    let _ = self.state_tx.send(ConnectionState::Connected);
                    return Ok(endpoint);
                }
                Err(error) => {
                    tracing::warn!(
                        kind = %self.config.kind(),
                        target = self.config.target(),
                        attempt = self.attempts,
                        %error,
                        "connection attempt failed"
                    );
                    if let Some(max) = self.policy.max_attempts() {
                        if self.attempts >= max {
                            let _ = self
                                .state_tx
                                .send(ConnectionState::Failed(error.to_string()));
                            return Err(BridgeError::RetryExhausted {
                                attempts: self.attempts,
                            });
                        }
                    }
                    sleep(self.policy.delay_for(self.attempts)).await;
                }
            }
        }
    }
}
