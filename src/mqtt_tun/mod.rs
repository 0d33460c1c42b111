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

pub mod adapter;
pub mod bridge_error;
pub mod endpoint_config;
pub mod retry;
pub mod supervisor;
pub mod transport;
pub mod tunnel;

pub use adapter::{MqttTransportAdapter, SessionPolicy};
pub use bridge_error::BridgeError;
pub use endpoint_config::{EndpointConfig, EndpointKind};
pub use retry::RetryPolicy;
pub use supervisor::{ConnectionState, ConnectionSupervisor};
pub use transport::{Endpoint, TransportError, TransportOps};
pub use tunnel::{Tunnel, TunnelOption, TunnelOutcome, TunnelState};
