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

use derive_builder::Builder;
use getset::CopyGetters;
use std::time::Duration;

/// Immutable reconnect backoff policy.
///
/// Delay before retry `n` (1-based) is
/// `initial_delay * multiplier^(n-1)`, capped at `max_delay`. With the
/// defaults the curve runs 100ms, 200ms, 400ms, … up to the 30s cap.
/// `max_attempts` limits the total number of attempts; `None` retries
/// indefinitely.
///
/// # Usage
///
/// ```
/// use mqtt_tunnel_tokio::mqtt_tun::retry::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::builder()
///     .initial_delay(Duration::from_millis(100))
///     .max_delay(Duration::from_millis(1600))
///     .max_attempts(6u32)
///     .build()
///     .unwrap();
/// assert_eq!(policy.delay_for(5), Duration::from_millis(1600));
/// ```
#[derive(Debug, Clone, Builder, CopyGetters)]
#[builder(derive(Debug), pattern = "owned", setter(into))]
pub struct RetryPolicy {
    /// Delay before the first retry.
    ///
    /// # Default
    /// 100ms
    #[builder(default = "Duration::from_millis(100)")]
    #[getset(get_copy = "pub")]
    initial_delay: Duration,

    /// Upper bound on any computed delay.
    ///
    /// # Default
    /// 30s
    #[builder(default = "Duration::from_secs(30)")]
    #[getset(get_copy = "pub")]
    max_delay: Duration,

    /// Growth factor between consecutive delays.
    ///
    /// # Default
    /// 2.0
    #[builder(default = "2.0")]
    #[getset(get_copy = "pub")]
    multiplier: f64,

    /// Total attempt budget; `None` retries indefinitely.
    ///
    /// # Default
    /// None (unbounded)
    #[builder(default = "None", setter(into, strip_option))]
    #[getset(get_copy = "pub")]
    max_attempts: Option<u32>,
}

impl RetryPolicy {
    /// Creates a builder.
    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder::default()
    }

    /// Computes the backoff delay after failed attempt `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(63) as i32;
        let scaled = self.initial_delay.as_millis() as f64 * self.multiplier.powi(exponent);
        let capped = scaled.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped.max(0.0) as u64)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            max_attempts: None,
        }
    }
}
