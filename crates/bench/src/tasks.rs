//! Subcommand implementations

use crate::config::BenchConfig;
use anyhow::{bail, Context as _, Result};
use profiler_lib::bench::{FlopsBenchmark, Iperf3Benchmark, LatencyProbe, NodeBenchmark, Phase};
use profiler_lib::catalog::{self, ToolDefinition};
use profiler_lib::measure::{
    payload_size_report, HttpRunner, MeasurementSession, OiProbe, PayloadConfig, ProcessRunner,
    ServeConfig, ServerCommands, SizeStatus, WasmRunner, WasmtimeServe,
};
use profiler_lib::models::{OperationalIntensity, Runtime, ToolMeasurement};
use profiler_lib::observability::{ProfilerMetrics, StructuredLogger};
use profiler_lib::{store, testdata};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{info, warn};

/// Everything a subcommand needs
#[derive(Clone)]
pub struct Context {
    pub config: BenchConfig,
    pub hostname: String,
    pub logger: StructuredLogger,
    pub metrics: ProfilerMetrics,
}

impl Context {
    fn payloads(&self) -> PayloadConfig {
        PayloadConfig {
            data_dir: self.config.data_dir.clone(),
        }
    }

    fn server_commands(&self) -> ServerCommands {
        ServerCommands::new(&self.config.edgeagent_root, &self.config.data_dir)
    }

    fn session(&self, runs: Option<u32>) -> MeasurementSession {
        MeasurementSession::new(
            self.hostname.clone(),
            runs.unwrap_or(self.config.runs),
            self.config.command_timeout(),
        )
        .with_payloads(self.payloads())
        .with_metrics(self.metrics.clone())
    }
}

/// Hardware benchmark phases, merged into `node_<hostname>.yaml`
pub async fn node(
    ctx: &Context,
    phases: &[Phase],
    iperf_server: Option<String>,
    ping_host: Option<String>,
) -> Result<()> {
    let config = &ctx.config;
    let mut bench = NodeBenchmark::new(ctx.hostname.clone(), config.output_dir.clone());
    bench.flops = FlopsBenchmark {
        matrix_size: config.flops_matrix_size,
        iterations: config.flops_iterations,
        ..FlopsBenchmark::default()
    };
    bench.memory_method = config.memory_method;
    bench.sysbench.total_size = config.sysbench_total_size.clone();
    bench.sysbench.timeout = config.command_timeout();

    let iperf_server = iperf_server.or_else(|| config.iperf_server.clone());
    bench.iperf3 = iperf_server.as_ref().map(|server| Iperf3Benchmark {
        port: config.iperf_port,
        duration_secs: config.iperf_duration_secs,
        ..Iperf3Benchmark::new(server.clone())
    });
    bench.latency = ping_host
        .or_else(|| config.ping_host.clone())
        .or(iperf_server)
        .map(|host| LatencyProbe {
            count: config.ping_count,
            ..LatencyProbe::new(host)
        });

    let node = bench.run(phases).await?;
    ctx.logger.log_node_benchmarked(&node);
    ctx.metrics.set_node(&node);
    println!(
        "{}",
        config
            .output_dir
            .join(store::node_file_name(&ctx.hostname))
            .display()
    );
    Ok(())
}

/// Catalog tools picked by `--tool` names or `--server`, all by default
pub fn select_tools(names: &[String], server: Option<&str>) -> Vec<&'static ToolDefinition> {
    if !names.is_empty() {
        return names
            .iter()
            .filter_map(|name| {
                let tool = catalog::find_tool(name);
                if tool.is_none() {
                    warn!(tool = %name, "Unknown tool, ignoring");
                }
                tool
            })
            .collect();
    }
    match server {
        Some(server) => catalog::tools_for_server(server).collect(),
        None => catalog::all_tools().iter().collect(),
    }
}

/// Tools grouped by server, keeping catalog order within a server
fn by_server(tools: &[&'static ToolDefinition]) -> BTreeMap<&'static str, Vec<&'static ToolDefinition>> {
    let mut grouped: BTreeMap<&str, Vec<&ToolDefinition>> = BTreeMap::new();
    for tool in tools {
        grouped.entry(tool.server).or_default().push(*tool);
    }
    grouped
}

/// Time every selected tool and write `<runtime>_tool_exec_time_<hostname>.json`
pub async fn measure(
    ctx: &Context,
    runtime: Runtime,
    names: &[String],
    server: Option<&str>,
    runs: Option<u32>,
) -> Result<()> {
    let tools = select_tools(names, server);
    if tools.is_empty() {
        bail!("No tools selected");
    }
    let session = ctx.session(runs);
    let config = &ctx.config;
    info!(runtime = %runtime, tools = tools.len(), runs = session.runs, "Measuring tools");

    let measurements: Vec<ToolMeasurement> = match runtime {
        Runtime::Native => {
            let runner = ProcessRunner::new(ctx.server_commands(), config.command_timeout());
            session.measure_all(&runner, &tools).await
        }
        Runtime::Wasm => {
            let runner = WasmRunner::new(&config.wasm_dir, &config.data_dir, config.command_timeout());
            session.measure_all(&runner, &tools).await
        }
        Runtime::Http => measure_http(ctx, &session, &tools).await?,
    };

    if measurements.is_empty() {
        warn!(runtime = %runtime, "No tool produced a measurement");
    }
    let path = store::save_measurements(&config.output_dir, runtime, &ctx.hostname, &measurements)?;
    info!(path = %path.display(), measured = measurements.len(), selected = tools.len(), "Measurements saved");
    println!("{}", path.display());
    Ok(())
}

/// One `wasmtime serve` per server, stopped before the next one starts
async fn measure_http(
    ctx: &Context,
    session: &MeasurementSession,
    tools: &[&'static ToolDefinition],
) -> Result<Vec<ToolMeasurement>> {
    let config = &ctx.config;
    let mut serve = ServeConfig::new(&config.wasm_dir, &config.data_dir, config.http_port)
        .with_api_keys_from_env();
    serve.startup_delay = config.startup_delay();

    let mut out = Vec::new();
    for (server, server_tools) in by_server(tools) {
        let instance = match WasmtimeServe::start(&serve, server).await {
            Ok(instance) => instance,
            Err(e) => {
                for tool in &server_tools {
                    ctx.logger
                        .log_tool_skipped(Runtime::Http, tool.name, &e.to_string());
                }
                continue;
            }
        };
        let runner = HttpRunner::new(instance.url().clone(), config.command_timeout())
            .context("Failed to create HTTP client")?;
        match runner.list_tools().await {
            Ok(names) => info!(server, advertised = names.len(), "Server ready"),
            Err(e) => warn!(server, error = %e, "tools/list failed"),
        }
        out.extend(session.measure_all(&runner, &server_tools).await);
        instance.stop().await;
    }
    Ok(out)
}

/// Run native tools under perf and merge into `tool_oi_measurements.json`
pub async fn operational_intensity(
    ctx: &Context,
    names: &[String],
    server: Option<&str>,
    runs: Option<u32>,
) -> Result<()> {
    let tools = select_tools(names, server);
    let session = ctx.session(runs);
    let probe = OiProbe::new(ctx.server_commands(), session.runs, ctx.config.command_timeout());
    if !probe.available().await {
        bail!("perf is not available; install linux-tools and set kernel.perf_event_paranoid=-1");
    }

    let path = ctx.config.output_dir.join(store::OI_FILE_NAME);
    let mut records: BTreeMap<String, OperationalIntensity> = if path.exists() {
        store::load_operational_intensity(&path)?
            .into_iter()
            .map(|r| (r.tool_name.clone(), r))
            .collect()
    } else {
        BTreeMap::new()
    };

    let mut measured = 0;
    for tool in &tools {
        let Some(request) = session.request_for(tool) else {
            continue;
        };
        if let Some(record) = probe.measure(tool, &request).await {
            records.insert(record.tool_name.clone(), record);
            measured += 1;
        }
    }

    let records: Vec<_> = records.into_values().collect();
    store::save_operational_intensity(&path, &records)?;
    info!(path = %path.display(), measured, total = records.len(), "OI measurements saved");
    println!("{}", path.display());
    Ok(())
}

pub async fn generate_data(
    ctx: &Context,
    dir: Option<PathBuf>,
    seed: Option<u64>,
    git_init: bool,
) -> Result<()> {
    let dir = dir.unwrap_or_else(|| ctx.config.data_dir.clone());
    let files = testdata::generate_all(&dir, seed.unwrap_or(ctx.config.seed))?;
    for file in &files {
        println!("{:?}\t{}", file.status, file.path.display());
    }
    if git_init {
        let repo = dir.join(testdata::GIT_REPO_DIR);
        if !testdata::init_git_repo(&repo).await? {
            info!(repo = %repo.display(), "Git repository already initialized");
        }
    }
    Ok(())
}

pub fn payloads(ctx: &Context) {
    let report = payload_size_report(&ctx.payloads());
    println!("{:<28} {:<20} {:>10} {:>8}  STATUS", "TOOL", "SERVER", "BYTES", "TARGET");
    for entry in &report {
        let status = match entry.status {
            SizeStatus::Ok => "ok",
            SizeStatus::TooSmall => "too small",
            SizeStatus::TooLarge => "too large",
        };
        println!(
            "{:<28} {:<20} {:>10} {:>7.1}%  {}",
            entry.tool, entry.server, entry.bytes, entry.percent_of_target, status
        );
    }
    let ok = report.iter().filter(|p| p.status == SizeStatus::Ok).count();
    println!("{}/{} payloads within 50-150% of 10 KB", ok, report.len());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_tools() {
        assert_eq!(select_tools(&[], None).len(), catalog::tool_count());
        assert_eq!(select_tools(&[], Some("time")).len(), 2);

        let names = vec!["git_log".to_string(), "no_such_tool".to_string()];
        let picked = select_tools(&names, Some("time"));
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].name, "git_log");
    }

    #[test]
    fn test_by_server_groups() {
        let tools = select_tools(&[], None);
        let grouped = by_server(&tools);
        assert_eq!(grouped.len(), catalog::SERVERS.len());
        assert_eq!(grouped["filesystem"].len(), 14);
        assert_eq!(grouped["git"].len(), 12);
    }
}
