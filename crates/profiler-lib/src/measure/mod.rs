//! Per-tool execution measurement
//!
//! Every runtime goes through the same loop: build the standard request,
//! invoke it `runs` times sequentially, time each call with [`Instant`]
//! and fold the samples into a [`ToolMeasurement`].

pub mod jsonrpc;
pub mod oi;
pub mod payloads;
pub mod runner;

pub use jsonrpc::{tool_call_request, tools_list_request, RpcError, RpcResponse};
pub use oi::{parse_perf_stat, OiProbe, PerfCounters};
pub use payloads::{payload_size_report, standard_payload, PayloadConfig, PayloadSize, SizeStatus};
pub use runner::{
    HttpRunner, ProcessRunner, RunnerError, ServeConfig, ServerCommands, ToolRunner, WasmRunner,
    WasmtimeServe,
};

use crate::catalog::ToolDefinition;
use crate::models::ToolMeasurement;
use crate::observability::{ProfilerMetrics, StructuredLogger};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Timed invocations of catalog tools on this node
#[derive(Clone)]
pub struct MeasurementSession {
    pub hostname: String,
    pub runs: u32,
    /// Recorded as the sample of a run that timed out
    pub timeout: Duration,
    pub payloads: PayloadConfig,
    logger: StructuredLogger,
    metrics: Option<ProfilerMetrics>,
}

impl MeasurementSession {
    pub fn new(hostname: impl Into<String>, runs: u32, timeout: Duration) -> Self {
        let hostname = hostname.into();
        Self {
            logger: StructuredLogger::new(hostname.clone()),
            hostname,
            runs: runs.max(1),
            timeout,
            payloads: PayloadConfig::default(),
            metrics: None,
        }
    }

    pub fn with_payloads(mut self, payloads: PayloadConfig) -> Self {
        self.payloads = payloads;
        self
    }

    pub fn with_metrics(mut self, metrics: ProfilerMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Serialized `tools/call` request, `None` for a tool without a payload
    pub fn request_for(&self, tool: &ToolDefinition) -> Option<Vec<u8>> {
        let arguments = standard_payload(tool.name, &self.payloads)?;
        serde_json::to_vec(&tool_call_request(1, tool.name, &arguments)).ok()
    }

    /// Measure one tool. `None` when no run succeeded or timed out.
    pub async fn measure_tool(
        &self,
        runner: &dyn ToolRunner,
        tool: &ToolDefinition,
    ) -> Option<ToolMeasurement> {
        let runtime = runner.runtime();
        let Some(request) = self.request_for(tool) else {
            self.logger.log_tool_skipped(runtime, tool.name, "no standard payload");
            return None;
        };

        let mut samples = Vec::with_capacity(self.runs as usize);
        let mut output_size = 0u64;
        let mut completed = 0u32;

        for run in 0..self.runs {
            let start = Instant::now();
            let result = runner.invoke(tool, &request).await;
            let elapsed = start.elapsed().as_secs_f64();

            match result {
                Ok(response) => {
                    output_size = response.len() as u64;
                    completed += 1;
                    samples.push(elapsed);
                    if let Some(m) = &self.metrics {
                        m.observe_tool_exec(runtime, tool.name, elapsed);
                    }
                    debug!(tool = tool.name, run, elapsed, "Run complete");
                }
                Err(e) if e.is_timeout() => {
                    warn!(tool = tool.name, run, timeout = ?self.timeout, "Run timed out");
                    samples.push(self.timeout.as_secs_f64());
                    if let Some(m) = &self.metrics {
                        m.inc_tool_timed_out(runtime, tool.name);
                    }
                }
                Err(e) => {
                    warn!(tool = tool.name, run, error = %e, "Run failed");
                    if let Some(m) = &self.metrics {
                        m.inc_tool_failed(runtime, tool.name);
                    }
                }
            }
        }

        if completed == 0 {
            let reason = if samples.is_empty() {
                "every run failed"
            } else {
                "every run timed out"
            };
            self.logger.log_tool_skipped(runtime, tool.name, reason);
            return None;
        }

        match ToolMeasurement::from_samples(
            tool.name,
            tool.server,
            self.hostname.clone(),
            runtime,
            request.len() as u64,
            output_size,
            samples,
        ) {
            Ok(measurement) => {
                self.logger.log_tool_measured(&measurement);
                Some(measurement)
            }
            Err(e) => {
                self.logger.log_tool_skipped(runtime, tool.name, &e.to_string());
                None
            }
        }
    }

    /// Measure `tools` in order, keeping only those that produced a record
    pub async fn measure_all(
        &self,
        runner: &dyn ToolRunner,
        tools: &[&ToolDefinition],
    ) -> Vec<ToolMeasurement> {
        let mut out = Vec::with_capacity(tools.len());
        for tool in tools {
            if let Some(m) = self.measure_tool(runner, tool).await {
                out.push(m);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::find_tool;
    use crate::models::Runtime;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Answers with a fixed body; fails or times out on chosen calls
    struct ScriptedRunner {
        calls: AtomicU32,
        fail_on: Vec<u32>,
        timeout_on: Vec<u32>,
    }

    impl ScriptedRunner {
        fn new(fail_on: Vec<u32>, timeout_on: Vec<u32>) -> Self {
            Self {
                calls: AtomicU32::new(0),
                fail_on,
                timeout_on,
            }
        }
    }

    #[async_trait]
    impl ToolRunner for ScriptedRunner {
        fn runtime(&self) -> Runtime {
            Runtime::Wasm
        }

        async fn invoke(&self, _tool: &ToolDefinition, _request: &[u8]) -> Result<Vec<u8>, RunnerError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_on.contains(&call) {
                return Err(RunnerError::Rpc {
                    code: -32000,
                    message: "boom".to_string(),
                });
            }
            if self.timeout_on.contains(&call) {
                return Err(RunnerError::Timeout(Duration::from_secs(30)));
            }
            Ok(vec![b'x'; 256])
        }
    }

    #[tokio::test]
    async fn test_successful_runs() {
        let session = MeasurementSession::new("edge-1", 3, Duration::from_secs(30));
        let runner = ScriptedRunner::new(vec![], vec![]);
        let tool = find_tool("parse_logs").unwrap();

        let m = session.measure_tool(&runner, tool).await.unwrap();
        assert_eq!(m.run_count, 3);
        assert_eq!(m.runtime, Runtime::Wasm);
        assert_eq!(m.server, "log_parser");
        assert_eq!(m.node_hostname, "edge-1");
        assert_eq!(m.output_size, 256);
        assert_eq!(m.input_size, session.request_for(tool).unwrap().len() as u64);
        assert!(m.input_size > payloads::STANDARD_INPUT_SIZE as u64);
    }

    #[tokio::test]
    async fn test_timeout_counts_as_sample_and_failure_is_dropped() {
        let session = MeasurementSession::new("edge-1", 3, Duration::from_secs(30));
        let runner = ScriptedRunner::new(vec![0], vec![1]);
        let tool = find_tool("git_status").unwrap();

        let m = session.measure_tool(&runner, tool).await.unwrap();
        assert_eq!(m.run_count, 2);
        assert!(m.raw_samples.contains(&30.0));
        assert!(m.execution_time >= 15.0);
    }

    #[tokio::test]
    async fn test_no_successful_run_yields_nothing() {
        let session = MeasurementSession::new("edge-1", 2, Duration::from_secs(30));
        let tool = find_tool("fetch").unwrap();

        let failing = ScriptedRunner::new(vec![0, 1], vec![]);
        assert!(session.measure_tool(&failing, tool).await.is_none());

        let slow = ScriptedRunner::new(vec![], vec![0, 1]);
        assert!(session.measure_tool(&slow, tool).await.is_none());
    }

    #[tokio::test]
    async fn test_metrics_are_recorded() {
        let metrics = ProfilerMetrics::new();
        let session =
            MeasurementSession::new("edge-1", 2, Duration::from_secs(30)).with_metrics(metrics.clone());
        let runner = ScriptedRunner::new(vec![1], vec![]);
        let tool = find_tool("get_current_time").unwrap();
        session.measure_tool(&runner, tool).await.unwrap();

        let text = metrics.render().unwrap();
        assert!(text.contains("edge_bench_tool_exec_seconds_count{runtime=\"wasm\",tool=\"get_current_time\"} 1"));
        assert!(text.contains("edge_bench_tool_runs_failed_total{runtime=\"wasm\",tool=\"get_current_time\"} 1"));
    }

    #[tokio::test]
    async fn test_measure_all_with_process_runner() {
        let commands = ServerCommands::new("/nonexistent", "/tmp")
            .with_override("time", vec!["cat".to_string()]);
        let runner = ProcessRunner::new(commands, Duration::from_secs(5));
        let session = MeasurementSession::new("edge-1", 1, Duration::from_secs(5));

        let tools = [
            find_tool("get_current_time").unwrap(),
            find_tool("convert_time").unwrap(),
            find_tool("parse_logs").unwrap(),
        ];
        let measured = session.measure_all(&runner, &tools).await;
        let names: Vec<_> = measured.iter().map(|m| m.tool_name.as_str()).collect();
        // parse_logs needs a python server that does not exist here
        assert_eq!(names, vec!["get_current_time", "convert_time"]);
        assert!(measured.iter().all(|m| m.input_size == m.output_size));
    }
}
