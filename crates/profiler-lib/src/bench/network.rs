//! Network bandwidth (iperf3) and latency (ping) probes

use super::process::{run_command, CommandSpec};
use crate::models::DEFAULT_NETWORK_BANDWIDTH_BPS;
use serde_json::Value;
use std::time::Duration;
use tracing::{info, warn};

/// `end.sum_sent.bits_per_second` from `iperf3 -J` output
pub fn parse_iperf3_json(stdout: &str) -> Option<f64> {
    let doc: Value = serde_json::from_str(stdout).ok()?;
    doc.pointer("/end/sum_sent/bits_per_second")?
        .as_f64()
        .filter(|bps| *bps > 0.0)
}

/// Average RTT in ms from a `rtt min/avg/max/mdev = a/b/c/d ms` summary
/// (`round-trip` on BSD ping)
pub fn parse_ping_rtt(stdout: &str) -> Option<f64> {
    let line = stdout
        .lines()
        .find(|l| l.starts_with("rtt ") || l.starts_with("round-trip "))?;
    let (_, values) = line.split_once('=')?;
    values.trim().split('/').nth(1)?.trim().parse().ok()
}

/// Where a bandwidth figure came from
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BandwidthSource {
    Measured,
    Fallback,
}

/// `iperf3 -c <host> -p <port> -t <secs> -J`
#[derive(Debug, Clone)]
pub struct Iperf3Benchmark {
    pub server: String,
    pub port: u16,
    pub duration_secs: u32,
    pub timeout: Duration,
}

impl Iperf3Benchmark {
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            port: 5201,
            duration_secs: 5,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn command(&self) -> CommandSpec {
        CommandSpec::new("iperf3")
            .args([
                "-c".to_string(),
                self.server.clone(),
                "-p".to_string(),
                self.port.to_string(),
                "-t".to_string(),
                self.duration_secs.to_string(),
                "-J".to_string(),
            ])
            .timeout(self.timeout)
    }

    /// Bandwidth in bits/s. Any failure yields the 100 Mbit/s fallback.
    pub async fn run(&self) -> (f64, BandwidthSource) {
        let fallback = (DEFAULT_NETWORK_BANDWIDTH_BPS, BandwidthSource::Fallback);
        let outcome = match run_command(&self.command()).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, "iperf3 unavailable, using default 100 Mbps");
                return fallback;
            }
        };
        if !outcome.success() {
            warn!(
                server = %self.server,
                port = self.port,
                stderr = %outcome.stderr_text().trim(),
                "iperf3 failed, using default 100 Mbps"
            );
            return fallback;
        }
        match parse_iperf3_json(&outcome.stdout_text()) {
            Some(bps) => {
                info!(server = %self.server, mbps = bps / 1e6, "Network bandwidth measured");
                (bps, BandwidthSource::Measured)
            }
            None => {
                warn!("Could not parse iperf3 output, using default 100 Mbps");
                fallback
            }
        }
    }
}

/// `ping -c <count> <host>`
#[derive(Debug, Clone)]
pub struct LatencyProbe {
    pub host: String,
    pub count: u32,
    pub timeout: Duration,
}

impl LatencyProbe {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            count: 5,
            timeout: Duration::from_secs(20),
        }
    }

    pub fn command(&self) -> CommandSpec {
        CommandSpec::new("ping")
            .args(["-c".to_string(), self.count.to_string(), self.host.clone()])
            .timeout(self.timeout)
    }

    /// Average RTT in ms, `None` when ping fails
    pub async fn run(&self) -> Option<f64> {
        match run_command(&self.command()).await {
            Ok(outcome) if outcome.success() => {
                let rtt = parse_ping_rtt(&outcome.stdout_text());
                if rtt.is_none() {
                    warn!(host = %self.host, "Could not parse ping output");
                }
                rtt
            }
            Ok(outcome) => {
                warn!(host = %self.host, stderr = %outcome.stderr_text().trim(), "ping failed");
                None
            }
            Err(e) => {
                warn!(host = %self.host, error = %e, "ping unavailable");
                None
            }
        }
    }
}
