//! Benchmark configuration

use anyhow::{Context, Result};
use profiler_lib::bench::MemoryMethod;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// edge-bench configuration
///
/// Read from an optional file, then `EDGE_BENCH_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct BenchConfig {
    /// Overrides the detected hostname in file names and records
    #[serde(default)]
    pub hostname: Option<String>,

    /// Where node documents and measurement files are written
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Directory holding the generated test inputs
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// iperf3 server; network bandwidth falls back to 100 Mbps without one
    #[serde(default)]
    pub iperf_server: Option<String>,

    #[serde(default = "default_iperf_port")]
    pub iperf_port: u16,

    #[serde(default = "default_iperf_duration")]
    pub iperf_duration_secs: u32,

    /// Host to ping for latency; defaults to the iperf3 server
    #[serde(default)]
    pub ping_host: Option<String>,

    #[serde(default = "default_ping_count")]
    pub ping_count: u32,

    /// Per-invocation timeout for tools and external benchmarks
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,

    /// Timed runs per tool
    #[serde(default = "default_runs")]
    pub runs: u32,

    #[serde(default = "default_flops_matrix_size")]
    pub flops_matrix_size: usize,

    #[serde(default = "default_flops_iterations")]
    pub flops_iterations: u32,

    #[serde(default)]
    pub memory_method: MemoryMethod,

    #[serde(default = "default_sysbench_total_size")]
    pub sysbench_total_size: String,

    /// Checkout with the python MCP servers under `servers/`
    #[serde(default = "default_edgeagent_root")]
    pub edgeagent_root: PathBuf,

    /// Directory of `mcp_server_*.wasm` builds
    #[serde(default = "default_wasm_dir")]
    pub wasm_dir: PathBuf,

    /// Port for `wasmtime serve`
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    #[serde(default = "default_startup_delay")]
    pub startup_delay_secs: u64,

    /// Seed for synthetic test data
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("results")
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("/tmp")
}

fn default_iperf_port() -> u16 {
    5201
}

fn default_iperf_duration() -> u32 {
    5
}

fn default_ping_count() -> u32 {
    5
}

fn default_command_timeout() -> u64 {
    60
}

fn default_runs() -> u32 {
    3
}

fn default_flops_matrix_size() -> usize {
    512
}

fn default_flops_iterations() -> u32 {
    5
}

fn default_sysbench_total_size() -> String {
    "10G".to_string()
}

fn default_edgeagent_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_wasm_dir() -> PathBuf {
    PathBuf::from("wasm_modules")
}

fn default_http_port() -> u16 {
    8000
}

fn default_startup_delay() -> u64 {
    2
}

fn default_seed() -> u64 {
    42
}

impl BenchConfig {
    /// Load configuration from `file` (if given) and the environment
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let config = builder
            .add_source(config::Environment::with_prefix("EDGE_BENCH").try_parsing(true))
            .build()
            .context("Failed to read configuration")?;

        config
            .try_deserialize()
            .context("Invalid edge-bench configuration")
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn startup_delay(&self) -> Duration {
        Duration::from_secs(self.startup_delay_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_from_empty_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "# empty").unwrap();
        let config = BenchConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.runs, 3);
        assert_eq!(config.iperf_port, 5201);
        assert_eq!(config.memory_method, MemoryMethod::Auto);
        assert_eq!(config.command_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_file_values() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "iperf_server = \"cloud-1\"\nruns = 10\nmemory_method = \"stream\"\nwasm_dir = \"/opt/wasm\""
        )
        .unwrap();
        let config = BenchConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.iperf_server.as_deref(), Some("cloud-1"));
        assert_eq!(config.runs, 10);
        assert_eq!(config.memory_method, MemoryMethod::Stream);
        assert_eq!(config.wasm_dir, PathBuf::from("/opt/wasm"));
    }
}
