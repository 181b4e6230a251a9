//! edge-bench - per-node benchmarks for the edge tool profiler
//!
//! Runs on every node of the testbed: hardware benchmarks, per-tool
//! execution measurement, operational intensity and test-data generation.
//! Results land in the output directory for `edgeprof` to classify.

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use profiler_lib::bench::{MemoryMethod, Phase};
use profiler_lib::models::Runtime;
use profiler_lib::observability::{ProfilerMetrics, StructuredLogger};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;
mod tasks;

const BENCH_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Per-node hardware and tool-execution benchmarks
#[derive(Parser)]
#[command(name = "edge-bench")]
#[command(author, version, about = "Per-node benchmarks for the edge tool profiler", long_about = None)]
pub struct Cli {
    /// Configuration file (TOML or YAML)
    #[arg(long, short, env = "EDGE_BENCH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Hostname used in records and file names
    #[arg(long)]
    pub hostname: Option<String>,

    /// Output directory for node and measurement files
    #[arg(long, short)]
    pub output_dir: Option<PathBuf>,

    /// Log as JSON lines
    #[arg(long)]
    pub log_json: bool,

    /// Write Prometheus metrics here when done (textfile collector format)
    #[arg(long)]
    pub metrics_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Measure peak FLOPS
    Cpu,

    /// Measure memory bandwidth
    Memory {
        #[arg(long, value_enum)]
        method: Option<MemoryArg>,
    },

    /// Measure network bandwidth and latency
    Network {
        /// iperf3 server to measure against
        #[arg(long)]
        iperf_server: Option<String>,

        /// Host to ping
        #[arg(long)]
        ping_host: Option<String>,
    },

    /// Run every hardware benchmark
    Node {
        #[arg(long)]
        iperf_server: Option<String>,

        #[arg(long)]
        ping_host: Option<String>,
    },

    /// Measure tool execution time under one runtime
    Measure {
        #[arg(long, value_enum)]
        runtime: RuntimeArg,

        /// Only these tools (repeatable)
        #[arg(long = "tool")]
        tools: Vec<String>,

        /// Only the tools of this server
        #[arg(long)]
        server: Option<String>,

        /// Timed runs per tool
        #[arg(long)]
        runs: Option<u32>,
    },

    /// Measure operational intensity of native tools with perf
    Oi {
        #[arg(long = "tool")]
        tools: Vec<String>,

        #[arg(long)]
        server: Option<String>,

        #[arg(long)]
        runs: Option<u32>,
    },

    /// Generate the 10 KB test inputs
    GenerateData {
        /// Target directory (defaults to the configured data dir)
        #[arg(long)]
        dir: Option<PathBuf>,

        #[arg(long)]
        seed: Option<u64>,

        /// Also `git init` and commit the test repository
        #[arg(long)]
        git_init: bool,
    },

    /// Show the size of every standard payload against the 10 KB target
    Payloads,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum RuntimeArg {
    Native,
    Wasm,
    Http,
}

impl From<RuntimeArg> for Runtime {
    fn from(arg: RuntimeArg) -> Self {
        match arg {
            RuntimeArg::Native => Runtime::Native,
            RuntimeArg::Wasm => Runtime::Wasm,
            RuntimeArg::Http => Runtime::Http,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum MemoryArg {
    Auto,
    Sysbench,
    Stream,
}

impl From<MemoryArg> for MemoryMethod {
    fn from(arg: MemoryArg) -> Self {
        match arg {
            MemoryArg::Auto => MemoryMethod::Auto,
            MemoryArg::Sysbench => MemoryMethod::Sysbench,
            MemoryArg::Stream => MemoryMethod::Stream,
        }
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn detect_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    if dotenv::dotenv().is_ok() {
        info!("Loaded .env");
    }

    let mut config = config::BenchConfig::load(cli.config.as_deref())?;
    if let Some(dir) = cli.output_dir {
        config.output_dir = dir;
    }
    let hostname = cli
        .hostname
        .or_else(|| config.hostname.clone())
        .unwrap_or_else(detect_hostname);

    let logger = StructuredLogger::new(&hostname);
    logger.log_startup("edge-bench", BENCH_VERSION);
    let metrics = ProfilerMetrics::new();
    let ctx = tasks::Context {
        config,
        hostname,
        logger,
        metrics: metrics.clone(),
    };

    match cli.command {
        Commands::Cpu => {
            tasks::node(&ctx, &[Phase::Cpu], None, None).await?;
        }
        Commands::Memory { method } => {
            let mut ctx = ctx.clone();
            if let Some(m) = method {
                ctx.config.memory_method = m.into();
            }
            tasks::node(&ctx, &[Phase::Memory], None, None).await?;
        }
        Commands::Network {
            iperf_server,
            ping_host,
        } => {
            tasks::node(&ctx, &[Phase::Network], iperf_server, ping_host).await?;
        }
        Commands::Node {
            iperf_server,
            ping_host,
        } => {
            tasks::node(&ctx, &Phase::ALL, iperf_server, ping_host).await?;
        }
        Commands::Measure {
            runtime,
            tools,
            server,
            runs,
        } => {
            tasks::measure(&ctx, runtime.into(), &tools, server.as_deref(), runs).await?;
        }
        Commands::Oi {
            tools,
            server,
            runs,
        } => {
            tasks::operational_intensity(&ctx, &tools, server.as_deref(), runs).await?;
        }
        Commands::GenerateData {
            dir,
            seed,
            git_init,
        } => {
            tasks::generate_data(&ctx, dir, seed, git_init).await?;
        }
        Commands::Payloads => tasks::payloads(&ctx),
    }

    if let Some(path) = cli.metrics_file {
        match metrics.write_textfile(&path) {
            Ok(()) => info!(path = %path.display(), "Metrics written"),
            Err(e) => warn!(path = %path.display(), error = %format!("{:#}", e), "Failed to write metrics"),
        }
    }

    Ok(())
}
