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

//! Command-line tunnel driver.
//!
//! Opens two endpoints from their spec strings and relays bytes between them
//! until either side terminates or the process is interrupted.
//!
//! Exit codes: 0 for a graceful or interrupted close, 1 for an abrupt
//! transport failure, 2 for a usage or connection-establishment error.

use std::process::ExitCode;

use mqtt_tunnel_tokio::mqtt_tun::endpoint_config::EndpointConfig;
use mqtt_tunnel_tokio::mqtt_tun::retry::RetryPolicy;
use mqtt_tunnel_tokio::mqtt_tun::supervisor::ConnectionSupervisor;
use mqtt_tunnel_tokio::mqtt_tun::tunnel::{Tunnel, TunnelOption, TunnelOutcome};

const USAGE: &str = "\
Usage: mqtt-tunnel [OPTIONS] <ENDPOINT-A> <ENDPOINT-B>

Relay bytes bidirectionally between two endpoints.

Endpoint specs:
  tcp:HOST:PORT            TCP socket, e.g. tcp:127.0.0.1:1883
  unix:PATH                Unix domain socket, e.g. unix:/tmp/mqtt.sock
  serial:DEVICE[:BAUD]     Serial device, e.g. serial:/dev/ttyUSB0:115200

Options:
  --chunk-size BYTES       Relay chunk size (default 4096)
  --retries N              Connection attempts per endpoint (default 1)
  -h, --help               Show this help
";

struct DriverArgs {
    a: EndpointConfig,
    b: EndpointConfig,
    chunk_size: usize,
    retries: u32,
}

fn parse_args(args: &[String]) -> Result<Option<DriverArgs>, String> {
    let mut chunk_size = 4096usize;
    let mut retries = 1u32;
    let mut positional: Vec<&str> = Vec::new();

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(None),
            "--chunk-size" => {
                let value = iter
                    .next()
                    .ok_or_else(|| "--chunk-size requires a value".to_string())?;
                chunk_size = value
                    .parse()
                    .map_err(|_| format!("invalid chunk size: {value}"))?;
                if chunk_size == 0 {
                    return Err("chunk size must be positive".to_string());
                }
            }
            "--retries" => {
                let value = iter
                    .next()
                    .ok_or_else(|| "--retries requires a value".to_string())?;
                retries = value
                    .parse()
                    .map_err(|_| format!("invalid retry count: {value}"))?;
                if retries == 0 {
                    return Err("retry count must be positive".to_string());
                }
            }
            other if other.starts_with('-') => {
                return Err(format!("unknown option: {other}"));
            }
            other => positional.push(other),
        }
    }

    if positional.len() != 2 {
        return Err(format!(
            "expected exactly two endpoint specs, got {}",
            positional.len()
        ));
    }
    let a = positional[0]
        .parse()
        .map_err(|e| format!("endpoint A: {e}"))?;
    let b = positional[1]
        .parse()
        .map_err(|e| format!("endpoint B: {e}"))?;

    Ok(Some(DriverArgs {
        a,
        b,
        chunk_size,
        retries,
    }))
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let raw: Vec<String> = std::env::args().skip(1).collect();
    let args = match parse_args(&raw) {
        Ok(Some(args)) => args,
        Ok(None) => {
            print!("{USAGE}");
            return ExitCode::SUCCESS;
        }
        Err(message) => {
            eprintln!("mqtt-tunnel: {message}");
            eprint!("{USAGE}");
            return ExitCode::from(2);
        }
    };

    let policy_result = RetryPolicy::builder().max_attempts(args.retries).build();
    let policy = match policy_result {
        Ok(policy) => policy,
        Err(e) => {
            tracing::error!(error = %e, "invalid retry policy");
            return ExitCode::from(2);
        }
    };

    let mut supervisor_a = ConnectionSupervisor::new(args.a, policy.clone());
    let endpoint_a = match supervisor_a.connect().await {
        Ok(endpoint) => endpoint,
        Err(e) => {
            tracing::error!(error = %e, "failed to connect endpoint A");
            return ExitCode::from(2);
        }
    };

    let mut supervisor_b = ConnectionSupervisor::new(args.b, policy);
    let endpoint_b = match supervisor_b.connect().await {
        Ok(endpoint) => endpoint,
        Err(e) => {
            tracing::error!(error = %e, "failed to connect endpoint B");
            return ExitCode::from(2);
        }
    };

    let options_result = TunnelOption::builder().chunk_size(args.chunk_size).build();
    let options = match options_result {
        Ok(options) => options,
        Err(e) => {
            tracing::error!(error = %e, "invalid tunnel options");
            return ExitCode::from(2);
        }
    };

    let mut tunnel = Tunnel::start_with_options(endpoint_a, endpoint_b, options);
    tracing::info!("tunnel relaying");

    let interrupted = tokio::select! {
        _ = tunnel.wait() => false,
        _ = tokio::signal::ctrl_c() => true,
    };
    if interrupted {
        tracing::info!("interrupt received, closing tunnel");
        tunnel.close().await;
    }

    match tunnel.wait().await {
        TunnelOutcome::Graceful => {
            tracing::info!("tunnel closed gracefully");
            ExitCode::SUCCESS
        }
        TunnelOutcome::Closed => {
            tracing::info!("tunnel closed");
            ExitCode::SUCCESS
        }
        TunnelOutcome::Abrupt(error) => {
            tracing::error!(%error, "tunnel closed abruptly");
            ExitCode::FAILURE
        }
    }
}
