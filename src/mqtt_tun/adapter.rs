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

//! Bridge between a supervised byte channel and an MQTT client.
//!
//! The adapter does not speak MQTT itself. It hands out connected
//! [`Endpoint`]s for the client to run its protocol over, and when a
//! replacement endpoint is obtained after a loss it invokes the registered
//! reconnect hooks so the client can restore session state (re-subscribe,
//! re-announce) on the new stream.

use tokio::sync::watch;

use crate::mqtt_tun::bridge_error::BridgeError;
use crate::mqtt_tun::supervisor::{ConnectionState, ConnectionSupervisor};
use crate::mqtt_tun::transport::{Endpoint, TransportError};

/// What the MQTT client should do with session state after a reconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPolicy {
    /// Fire the reconnect hooks so the client restores subscriptions on the
    /// replacement stream.
    #[default]
    ResumeOnReconnect,
    /// Treat every connection as brand new; reconnect hooks are not invoked.
    Fresh,
}

/// Presents a supervised connection to an MQTT client as a sequence of
/// connected endpoints.
///
/// The first call to [`transport`](MqttTransportAdapter::transport) performs
/// the initial connect; every later call is a reconnect after the client has
/// reported a loss via
/// [`connection_lost`](MqttTransportAdapter::connection_lost). Under
/// [`SessionPolicy::ResumeOnReconnect`] each successful reconnect fires the
/// hooks registered with [`on_reconnect`](MqttTransportAdapter::on_reconnect),
/// in registration order, after the new endpoint is ready.
pub struct MqttTransportAdapter {
    supervisor: ConnectionSupervisor,
    session_policy: SessionPolicy,
    on_reconnect: Vec<Box<dyn Fn() + Send + Sync>>,
    connects: u32,
}

impl std::fmt::Debug for MqttTransportAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttTransportAdapter")
            .field("supervisor", &self.supervisor)
            .field("session_policy", &self.session_policy)
            .field("on_reconnect", &self.on_reconnect.len())
            .field("connects", &self.connects)
            .finish()
    }
}

impl MqttTransportAdapter {
    /// Creates an adapter over a connection supervisor with the default
    /// session policy.
    pub fn new(supervisor: ConnectionSupervisor) -> Self {
        Self {
            supervisor,
            session_policy: SessionPolicy::default(),
            on_reconnect: Vec::new(),
            connects: 0,
        }
    }

    /// Overrides the session policy.
    pub fn with_session_policy(mut self, session_policy: SessionPolicy) -> Self {
        self.session_policy = session_policy;
        self
    }

    /// The active session policy.
    pub fn session_policy(&self) -> SessionPolicy {
        self.session_policy
    }

    /// Registers a hook invoked after each successful reconnect.
    ///
    /// Hooks run in registration order and only under
    /// [`SessionPolicy::ResumeOnReconnect`].
    pub fn on_reconnect<F>(&mut self, hook: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_reconnect.push(Box::new(hook));
    }

    /// Current connection lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.supervisor.state()
    }

    /// A receiver that observes every connection state transition.
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.supervisor.subscribe()
    }

    /// Returns a connected endpoint for the client to run MQTT over.
    ///
    /// The first call connects; later calls reconnect with the supervisor's
    /// backoff schedule. On a successful reconnect the registered hooks fire
    /// before the endpoint is returned.
    pub async fn transport(&mut self) -> Result<Endpoint, BridgeError> {
        let endpoint = if self.connects == 0 {
            self.supervisor.connect().await?
        } else {
            self.supervisor.reconnect().await?
        };
        self.connects += 1;
        if self.connects > 1 && self.session_policy == SessionPolicy::ResumeOnReconnect {
            tracing::debug!(hooks = self.on_reconnect.len(), "running reconnect hooks");
            for hook in &self.on_reconnect {
                hook();
            }
        }
        Ok(endpoint)
    }

    /// Reports that the current endpoint's connection was lost.
    ///
    /// The next [`transport`](MqttTransportAdapter::transport) call will
    /// reconnect.
    pub fn connection_lost(&mut self, error: &TransportError) {
        self.supervisor.mark_disconnected(error);
    }

    /// Number of endpoints handed out so far.
    pub fn connect_count(&self) -> u32 {
        self.connects
    }
}
