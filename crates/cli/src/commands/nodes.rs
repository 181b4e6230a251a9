//! Node and tier inspection

use anyhow::Result;
use colored::Colorize;
use profiler_lib::classifier::classify_tiers;
use profiler_lib::models::{NodeProfile, Tier, TierSpec};
use profiler_lib::store;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use tabled::Tabled;

use crate::output::{
    format_bandwidth, format_flops, format_network, format_ratio, format_tier, OutputFormat,
};

/// Row for the node table
#[derive(Tabled)]
struct NodeRow {
    #[tabled(rename = "Node")]
    hostname: String,
    #[tabled(rename = "Tier")]
    tier: String,
    #[tabled(rename = "Peak")]
    peak: String,
    #[tabled(rename = "Memory BW")]
    memory: String,
    #[tabled(rename = "Network")]
    network: String,
    #[tabled(rename = "Ridge")]
    ridge: String,
}

/// Row for the tier table
#[derive(Tabled)]
struct TierRow {
    #[tabled(rename = "Tier")]
    tier: String,
    #[tabled(rename = "Nodes")]
    nodes: usize,
    #[tabled(rename = "Avg Peak")]
    peak: String,
    #[tabled(rename = "Avg Memory BW")]
    memory: String,
    #[tabled(rename = "Avg Ridge")]
    ridge: String,
}

#[derive(Serialize)]
struct NodesOutput<'a> {
    nodes: &'a [NodeProfile],
    node_tiers: BTreeMap<&'a str, Tier>,
    node_specs: &'a BTreeMap<Tier, TierSpec>,
}

/// Show node documents and the tiers they fall into
pub fn show_nodes(data_dir: &Path, format: OutputFormat) -> Result<()> {
    let nodes = store::load_nodes(data_dir)?;
    let tiers = classify_tiers(&nodes)?;

    match format {
        OutputFormat::Json => {
            let output = NodesOutput {
                nodes: &nodes,
                node_tiers: tiers
                    .node_tiers
                    .iter()
                    .map(|(host, tier)| (host.as_str(), *tier))
                    .collect(),
                node_specs: &tiers.specs,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Table => {
            let node_rows: Vec<NodeRow> = nodes
                .iter()
                .map(|n| NodeRow {
                    hostname: n.hostname.clone(),
                    tier: tiers
                        .tier_of(&n.hostname)
                        .map(format_tier)
                        .unwrap_or_else(|| "-".to_string()),
                    peak: format_flops(n.peak_compute_rate),
                    memory: format_bandwidth(n.memory_bandwidth),
                    network: format_network(n.network_bandwidth),
                    ridge: format_ratio(n.ridge_point()),
                })
                .collect();
            let tier_rows: Vec<TierRow> = tiers
                .specs
                .iter()
                .map(|(tier, spec)| TierRow {
                    tier: format_tier(*tier),
                    nodes: spec.node_count,
                    peak: format_flops(spec.peak_compute_rate),
                    memory: format_bandwidth(spec.memory_bandwidth),
                    ridge: format_ratio(spec.ridge_point),
                })
                .collect();

            println!("{}", "Nodes".bold());
            print_rows(&node_rows);
            println!();
            println!("{}", "Tiers".bold());
            print_rows(&tier_rows);
        }
    }
    Ok(())
}

fn print_rows<T: Tabled>(rows: &[T]) {
    use tabled::{settings::Style, Table};
    println!("{}", Table::new(rows).with(Style::rounded()));
}
