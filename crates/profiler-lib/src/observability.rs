//! Observability for the profiling harness
//!
//! Provides:
//! - Prometheus metrics (tool execution latency, failed runs, node hardware figures)
//! - Structured event logging with tracing

use crate::models::{AlphaModelKind, NodeProfile, ProfileReport, Runtime, ToolMeasurement};
use anyhow::{Context, Result};
use prometheus::{
    Encoder, GaugeVec, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::path::Path;
use tracing::{info, warn};

/// Buckets for tool execution time (in seconds)
const EXEC_TIME_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
];

/// Metrics for one benchmark process, on a registry of its own
#[derive(Clone)]
pub struct ProfilerMetrics {
    registry: Registry,
    tool_exec_seconds: HistogramVec,
    tool_runs_failed: IntCounterVec,
    tool_runs_timed_out: IntCounterVec,
    node_peak_flops: GaugeVec,
    node_memory_bandwidth: GaugeVec,
    node_network_bandwidth: GaugeVec,
}

impl Default for ProfilerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ProfilerMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let tool_exec_seconds = HistogramVec::new(
            HistogramOpts::new(
                "edge_bench_tool_exec_seconds",
                "Wall-clock time of one tool invocation",
            )
            .buckets(EXEC_TIME_BUCKETS.to_vec()),
            &["runtime", "tool"],
        )
        .expect("Failed to create tool_exec_seconds");

        let tool_runs_failed = IntCounterVec::new(
            Opts::new(
                "edge_bench_tool_runs_failed_total",
                "Tool invocations that returned an error",
            ),
            &["runtime", "tool"],
        )
        .expect("Failed to create tool_runs_failed");

        let tool_runs_timed_out = IntCounterVec::new(
            Opts::new(
                "edge_bench_tool_runs_timed_out_total",
                "Tool invocations that hit the timeout",
            ),
            &["runtime", "tool"],
        )
        .expect("Failed to create tool_runs_timed_out");

        let node_peak_flops = GaugeVec::new(
            Opts::new("edge_bench_node_peak_flops", "Measured peak FLOPS"),
            &["hostname"],
        )
        .expect("Failed to create node_peak_flops");

        let node_memory_bandwidth = GaugeVec::new(
            Opts::new(
                "edge_bench_node_memory_bandwidth_bytes",
                "Measured memory bandwidth in bytes per second",
            ),
            &["hostname"],
        )
        .expect("Failed to create node_memory_bandwidth");

        let node_network_bandwidth = GaugeVec::new(
            Opts::new(
                "edge_bench_node_network_bandwidth_bits",
                "Measured network bandwidth in bits per second",
            ),
            &["hostname"],
        )
        .expect("Failed to create node_network_bandwidth");

        registry
            .register(Box::new(tool_exec_seconds.clone()))
            .expect("Failed to register tool_exec_seconds");
        registry
            .register(Box::new(tool_runs_failed.clone()))
            .expect("Failed to register tool_runs_failed");
        registry
            .register(Box::new(tool_runs_timed_out.clone()))
            .expect("Failed to register tool_runs_timed_out");
        registry
            .register(Box::new(node_peak_flops.clone()))
            .expect("Failed to register node_peak_flops");
        registry
            .register(Box::new(node_memory_bandwidth.clone()))
            .expect("Failed to register node_memory_bandwidth");
        registry
            .register(Box::new(node_network_bandwidth.clone()))
            .expect("Failed to register node_network_bandwidth");

        Self {
            registry,
            tool_exec_seconds,
            tool_runs_failed,
            tool_runs_timed_out,
            node_peak_flops,
            node_memory_bandwidth,
            node_network_bandwidth,
        }
    }

    pub fn observe_tool_exec(&self, runtime: Runtime, tool: &str, seconds: f64) {
        self.tool_exec_seconds
            .with_label_values(&[runtime.as_str(), tool])
            .observe(seconds);
    }

    pub fn inc_tool_failed(&self, runtime: Runtime, tool: &str) {
        self.tool_runs_failed
            .with_label_values(&[runtime.as_str(), tool])
            .inc();
    }

    pub fn inc_tool_timed_out(&self, runtime: Runtime, tool: &str) {
        self.tool_runs_timed_out
            .with_label_values(&[runtime.as_str(), tool])
            .inc();
    }

    /// Export whatever hardware figures the node record carries
    pub fn set_node(&self, node: &NodeProfile) {
        let host = node.hostname.as_str();
        if let Some(v) = node.peak_compute_rate {
            self.node_peak_flops.with_label_values(&[host]).set(v);
        }
        if let Some(v) = node.memory_bandwidth {
            self.node_memory_bandwidth.with_label_values(&[host]).set(v);
        }
        if let Some(v) = node.network_bandwidth {
            self.node_network_bandwidth.with_label_values(&[host]).set(v);
        }
    }

    /// Prometheus text exposition of every metric
    pub fn render(&self) -> Result<String> {
        let mut buf = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buf)
            .context("Failed to encode metrics")?;
        String::from_utf8(buf).context("Metrics output is not UTF-8")
    }

    /// Write the exposition for the node_exporter textfile collector.
    /// Written to a temporary file first so the collector never reads a
    /// partial file.
    pub fn write_textfile(&self, path: &Path) -> Result<()> {
        let text = self.render()?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let tmp = path.with_extension("prom.tmp");
        std::fs::write(&tmp, text).with_context(|| format!("Failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, path)
            .with_context(|| format!("Failed to move metrics into {}", path.display()))?;
        Ok(())
    }
}

/// Structured logger for profiling events
#[derive(Clone)]
pub struct StructuredLogger {
    hostname: String,
}

impl StructuredLogger {
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
        }
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn log_startup(&self, component: &str, version: &str) {
        info!(
            event = "started",
            node = %self.hostname,
            component = %component,
            version = %version,
            "Profiler started"
        );
    }

    pub fn log_node_benchmarked(&self, node: &NodeProfile) {
        info!(
            event = "node_benchmarked",
            node = %node.hostname,
            peak_compute_rate = ?node.peak_compute_rate,
            memory_bandwidth = ?node.memory_bandwidth,
            network_bandwidth = ?node.network_bandwidth,
            ridge_point = ?node.ridge_point(),
            "Node benchmark recorded"
        );
    }

    pub fn log_tool_measured(&self, m: &ToolMeasurement) {
        info!(
            event = "tool_measured",
            node = %self.hostname,
            runtime = %m.runtime,
            tool = %m.tool_name,
            server = %m.server,
            execution_time = m.execution_time,
            input_size = m.input_size,
            output_size = m.output_size,
            run_count = m.run_count,
            "Tool measured"
        );
    }

    pub fn log_tool_skipped(&self, runtime: Runtime, tool: &str, reason: &str) {
        warn!(
            event = "tool_skipped",
            node = %self.hostname,
            runtime = %runtime,
            tool = %tool,
            reason = %reason,
            "Tool skipped"
        );
    }

    /// One event per tool plus a summary line
    pub fn log_alpha_computed(&self, report: &ProfileReport) {
        for (name, profile) in &report.tools {
            info!(
                event = "alpha_computed",
                model = ?report.model,
                tool = %name,
                alpha = profile.alpha,
                data_locality = %profile.data_locality,
                "Alpha computed"
            );
        }
        let dist = &report.metadata.distribution;
        info!(
            event = "alpha_summary",
            model = ?report.model,
            tools = report.tools.len(),
            skipped = report.metadata.skipped_tools.len(),
            compute_bound = dist.compute_bound,
            mixed = dist.mixed,
            communication_bound = dist.communication_bound,
            "Alpha distribution"
        );
    }

    pub fn log_report_written(&self, path: &Path, model: AlphaModelKind, tools: usize) {
        info!(
            event = "report_written",
            path = %path.display(),
            model = ?model,
            tools,
            "Profile written"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_metrics_render() {
        let metrics = ProfilerMetrics::new();
        metrics.observe_tool_exec(Runtime::Wasm, "git_log", 0.042);
        metrics.inc_tool_timed_out(Runtime::Wasm, "fetch");
        let mut node = NodeProfile::new("edge-1");
        node.peak_compute_rate = Some(2.5e10);
        metrics.set_node(&node);

        let text = metrics.render().unwrap();
        assert!(text.contains("edge_bench_tool_exec_seconds_count{runtime=\"wasm\",tool=\"git_log\"} 1"));
        assert!(text.contains("edge_bench_tool_runs_timed_out_total{runtime=\"wasm\",tool=\"fetch\"} 1"));
        assert!(text.contains("edge_bench_node_peak_flops{hostname=\"edge-1\"}"));
        assert!(!text.contains("edge_bench_node_memory_bandwidth_bytes{"));
    }

    #[test]
    fn test_separate_instances_do_not_collide() {
        let a = ProfilerMetrics::new();
        let b = ProfilerMetrics::new();
        a.inc_tool_failed(Runtime::Native, "read_file");
        assert!(!b.render().unwrap().contains("read_file"));
    }

    #[test]
    fn test_write_textfile() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("textfile").join("edge_bench.prom");
        let metrics = ProfilerMetrics::new();
        metrics.observe_tool_exec(Runtime::Native, "parse_logs", 0.2);
        metrics.write_textfile(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("parse_logs"));
        assert!(!path.with_extension("prom.tmp").exists());
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("test-node");
        assert_eq!(logger.hostname(), "test-node");
    }
}
