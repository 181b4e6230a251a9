//! Node hardware benchmarks
//!
//! Each phase updates the node document in place (read, merge, write) so
//! the CPU, memory and network phases can run separately or together.

pub mod cpu;
pub mod memory;
pub mod network;
pub mod process;

pub use cpu::{CpuInfo, FlopsBenchmark, FlopsResult};
pub use memory::{parse_sysbench_memory, StreamBenchmark, StreamResult, SysbenchMemory};
pub use network::{parse_iperf3_json, parse_ping_rtt, BandwidthSource, Iperf3Benchmark, LatencyProbe};
pub use process::{run_command, CommandOutcome, CommandSpec, ProcessError};

use crate::models::{NodeProfile, DEFAULT_NETWORK_BANDWIDTH_BPS};
use crate::store;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{info, warn};

/// How memory bandwidth is measured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryMethod {
    /// sysbench, falling back to STREAM if it is missing or fails
    #[default]
    Auto,
    Sysbench,
    Stream,
}

/// A benchmark phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Cpu,
    Memory,
    Network,
}

impl Phase {
    pub const ALL: [Phase; 3] = [Phase::Cpu, Phase::Memory, Phase::Network];
}

/// Benchmarks for the local machine, writing `node_<hostname>.yaml`
#[derive(Debug, Clone)]
pub struct NodeBenchmark {
    pub hostname: String,
    pub output_dir: PathBuf,
    pub flops: FlopsBenchmark,
    pub memory_method: MemoryMethod,
    pub sysbench: SysbenchMemory,
    pub stream: StreamBenchmark,
    /// `None` when no iperf3 server is configured
    pub iperf3: Option<Iperf3Benchmark>,
    pub latency: Option<LatencyProbe>,
}

impl NodeBenchmark {
    pub fn new(hostname: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            hostname: hostname.into(),
            output_dir: output_dir.into(),
            flops: FlopsBenchmark::default(),
            memory_method: MemoryMethod::default(),
            sysbench: SysbenchMemory::default(),
            stream: StreamBenchmark::default(),
            iperf3: None,
            latency: None,
        }
    }

    /// Run `phases` in order and persist the merged record after each one
    pub async fn run(&self, phases: &[Phase]) -> Result<NodeProfile> {
        let mut node = store::load_or_new_node(&self.output_dir, &self.hostname)?;
        node.os.get_or_insert_with(|| std::env::consts::OS.to_string());
        node.machine
            .get_or_insert_with(|| std::env::consts::ARCH.to_string());

        for phase in phases {
            match phase {
                Phase::Cpu => self.run_cpu(&mut node).await?,
                Phase::Memory => self.run_memory(&mut node).await?,
                Phase::Network => self.run_network(&mut node).await,
            }
            node.measured_at = Some(chrono::Utc::now());
            store::save_node(&self.output_dir, &node)?;
        }

        info!(
            hostname = %node.hostname,
            peak_gflops = ?node.peak_compute_rate.map(|r| r / 1e9),
            memory_gib_s = ?node.memory_bandwidth.map(|b| b / (1u64 << 30) as f64),
            network_mbps = ?node.network_bandwidth.map(|b| b / 1e6),
            "Node benchmark complete"
        );
        Ok(node)
    }

    async fn run_cpu(&self, node: &mut NodeProfile) -> Result<()> {
        let info = CpuInfo::detect();
        node.cpu_model = info.model.or(node.cpu_model.take());
        node.cpu_cores = info.cores.or(node.cpu_cores);
        node.cpu_freq_mhz = info.freq_mhz.or(node.cpu_freq_mhz);

        let flops = self.flops.clone();
        let result = tokio::task::spawn_blocking(move || flops.run())
            .await
            .context("FLOPS benchmark task panicked")?;
        node.peak_compute_rate = Some(result.best_flops);
        Ok(())
    }

    async fn run_memory(&self, node: &mut NodeProfile) -> Result<()> {
        let measured = match self.memory_method {
            MemoryMethod::Stream => None,
            MemoryMethod::Sysbench | MemoryMethod::Auto => match self.sysbench.run().await {
                Ok(bw) => bw,
                Err(e) => {
                    warn!(error = %e, "sysbench unavailable");
                    None
                }
            },
        };

        let bandwidth = match (measured, self.memory_method) {
            (Some(bw), _) => Some(bw),
            (None, MemoryMethod::Sysbench) => None,
            (None, _) => {
                let stream = self.stream.clone();
                let result = tokio::task::spawn_blocking(move || stream.run())
                    .await
                    .context("STREAM benchmark task panicked")?;
                Some(result.bandwidth())
            }
        };

        match bandwidth {
            Some(bw) => node.memory_bandwidth = Some(bw),
            None => warn!(hostname = %self.hostname, "Memory bandwidth not measured, keeping previous value"),
        }
        Ok(())
    }

    async fn run_network(&self, node: &mut NodeProfile) {
        let (bandwidth, source) = match &self.iperf3 {
            Some(iperf3) => iperf3.run().await,
            None => {
                warn!("No iperf3 server configured, using default 100 Mbps");
                (DEFAULT_NETWORK_BANDWIDTH_BPS, BandwidthSource::Fallback)
            }
        };
        if source == BandwidthSource::Measured || node.network_bandwidth.is_none() {
            node.network_bandwidth = Some(bandwidth);
        }

        if let Some(probe) = &self.latency {
            if let Some(rtt) = probe.run().await {
                node.network_latency_ms = Some(rtt);
            }
        }
    }
}
