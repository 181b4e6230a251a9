//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use profiler_lib::models::{AlphaClass, Tier};
use serde::{Deserialize, Serialize};
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print a table from a list of items
pub fn print_table<T: Tabled + Serialize>(items: &[T], format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            if items.is_empty() {
                println!("{}", "No items found".yellow());
                return;
            }
            let table = Table::new(items).with(Style::rounded()).to_string();
            println!("{}", table);
        }
        OutputFormat::Json => {
            if let Ok(json) = serde_json::to_string_pretty(&items) {
                println!("{}", json);
            }
        }
    }
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// FLOPS as GFLOPS
pub fn format_flops(flops: Option<f64>) -> String {
    match flops {
        Some(v) => format!("{:.2} GFLOPS", v / 1e9),
        None => "-".to_string(),
    }
}

/// Bytes/s as GB/s
pub fn format_bandwidth(bytes_per_sec: Option<f64>) -> String {
    match bytes_per_sec {
        Some(v) => format!("{:.2} GB/s", v / 1e9),
        None => "-".to_string(),
    }
}

/// Bits/s as Mbps
pub fn format_network(bits_per_sec: Option<f64>) -> String {
    match bits_per_sec {
        Some(v) => format!("{:.0} Mbps", v / 1e6),
        None => "-".to_string(),
    }
}

pub fn format_ratio(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.4}", v),
        None => "-".to_string(),
    }
}

/// Tier with its display class, e.g. `mid (EDGE)`
pub fn format_tier(tier: Tier) -> String {
    format!("{} ({})", tier, tier.display_class())
}

pub fn alpha_class_label(alpha: f64) -> &'static str {
    match AlphaClass::of(alpha) {
        AlphaClass::ComputeBound => "compute-bound",
        AlphaClass::Mixed => "mixed",
        AlphaClass::CommunicationBound => "communication-bound",
    }
}

/// Color alpha based on its class
pub fn color_alpha(alpha: f64) -> String {
    let formatted = format!("{:.3}", alpha);
    match AlphaClass::of(alpha) {
        AlphaClass::ComputeBound => formatted.green().to_string(),
        AlphaClass::Mixed => formatted.yellow().to_string(),
        AlphaClass::CommunicationBound => formatted.cyan().to_string(),
    }
}
