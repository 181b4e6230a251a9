//! Edge Tool Profiler CLI
//!
//! Classifies benchmarked nodes into tiers and computes per-tool alphas
//! from the files `edge-bench` leaves in the data directory.

mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use commands::{alpha, nodes, tools};
use profiler_lib::models::Runtime;
use profiler_lib::observability::StructuredLogger;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Edge Tool Profiler CLI
#[derive(Parser)]
#[command(name = "edgeprof")]
#[command(author, version, about = "CLI for the Edge Tool Profiler", long_about = None)]
pub struct Cli {
    /// Directory with node, measurement and OI files
    #[arg(long, short, env = "EDGEPROF_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Output format
    #[arg(long, short, value_enum)]
    pub format: Option<output::OutputFormat>,

    /// Enable verbose output
    #[arg(long, short)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compute per-tool alphas
    #[command(subcommand)]
    Alpha(AlphaCommands),

    /// Show nodes and their tiers
    Nodes,

    /// List the tool catalog
    Tools {
        /// Only tools of this server
        #[arg(long, short)]
        server: Option<String>,
    },

    /// Print a written profile
    Show {
        /// Profile file (YAML or JSON)
        path: PathBuf,
    },
}

#[derive(Subcommand)]
pub enum AlphaCommands {
    /// Roofline model: sigmoid of operational intensity vs. tier ridge point
    Roofline {
        /// OI file (defaults to tool_oi_measurements.json in the data dir)
        #[arg(long)]
        oi: Option<PathBuf>,

        /// Output file, YAML or JSON by extension
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Time-ratio model: execution time vs. payload transfer time
    TimeRatio {
        #[arg(long, value_enum, default_value = "all")]
        runtime: RuntimeSelection,

        /// Directory for profile_<runtime>.yaml (defaults to the data dir)
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum RuntimeSelection {
    Native,
    Wasm,
    Http,
    All,
}

impl RuntimeSelection {
    fn runtime(self) -> Option<Runtime> {
        match self {
            RuntimeSelection::Native => Some(Runtime::Native),
            RuntimeSelection::Wasm => Some(Runtime::Wasm),
            RuntimeSelection::Http => Some(Runtime::Http),
            RuntimeSelection::All => None,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "info" } else { "warn" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = config::Config::load()?;
    let data_dir = cli
        .data_dir
        .or(config.data_dir)
        .unwrap_or_else(|| PathBuf::from("."));
    let format = cli.format.or(config.default_format).unwrap_or_default();
    let logger = StructuredLogger::new("edgeprof");

    match cli.command {
        Commands::Alpha(alpha_cmd) => match alpha_cmd {
            AlphaCommands::Roofline { oi, output } => {
                alpha::roofline(&data_dir, oi, output, format, &logger)?;
            }
            AlphaCommands::TimeRatio {
                runtime,
                output_dir,
            } => {
                alpha::time_ratio(&data_dir, runtime.runtime(), output_dir, format, &logger)?;
            }
        },
        Commands::Nodes => {
            nodes::show_nodes(&data_dir, format)?;
        }
        Commands::Tools { server } => {
            tools::list_tools(server, format)?;
        }
        Commands::Show { path } => {
            alpha::show(&path, format)?;
        }
    }

    Ok(())
}
