//! Time-ratio alpha model
//!
//! Uses wall-clock execution time and payload size instead of operational
//! intensity: `alpha = t / (t + t_comm)` where `t_comm` is the time to move
//! request and response over the node's network link.

use super::{
    assemble_report, classify_tiers, mean, relative_cost, AlphaEstimator, ClassifierError,
    NEUTRAL_ALPHA,
};
use crate::catalog;
use crate::models::{
    AlphaModelKind, NodeProfile, ProfileReport, Runtime, Tier, ToolMeasurement, ToolProfile,
    DEFAULT_NETWORK_BANDWIDTH_BPS,
};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, info, warn};

/// Time-ratio alpha for one measurement.
///
/// Missing or non-positive bandwidth means no communication time is
/// charged. Zero execution time and zero transfer time give 0.5.
pub fn time_ratio_alpha(
    execution_time: f64,
    input_size: u64,
    output_size: u64,
    network_bandwidth_bps: Option<f64>,
) -> f64 {
    let t_comm = match network_bandwidth_bps {
        Some(bw) if bw > 0.0 => (input_size + output_size) as f64 / (bw / 8.0),
        _ => 0.0,
    };
    let total = execution_time + t_comm;
    if total <= 0.0 {
        return NEUTRAL_ALPHA;
    }
    (execution_time / total).clamp(0.0, 1.0)
}

/// Time-ratio estimator over the measurements of one runtime
#[derive(Debug, Clone)]
pub struct TimeRatioEstimator {
    runtime: Runtime,
    measurements: Vec<ToolMeasurement>,
}

/// Per-node figures for one tool
struct NodeSample {
    alpha: f64,
    exec_time: f64,
}

impl TimeRatioEstimator {
    pub fn new(runtime: Runtime, measurements: impl IntoIterator<Item = ToolMeasurement>) -> Self {
        Self {
            runtime,
            measurements: measurements.into_iter().collect(),
        }
    }

    pub fn runtime(&self) -> Runtime {
        self.runtime
    }

    /// Measurements of this runtime grouped by tool, then by host
    fn grouped(&self) -> BTreeMap<&str, BTreeMap<&str, Vec<&ToolMeasurement>>> {
        let mut grouped: BTreeMap<&str, BTreeMap<&str, Vec<&ToolMeasurement>>> = BTreeMap::new();
        for m in &self.measurements {
            if m.runtime != self.runtime {
                debug!(
                    tool = %m.tool_name,
                    runtime = %m.runtime,
                    expected = %self.runtime,
                    "Ignoring measurement from another runtime"
                );
                continue;
            }
            if catalog::find_tool(&m.tool_name).is_none() {
                warn!(tool = %m.tool_name, host = %m.node_hostname, "Measurement for unknown tool ignored");
                continue;
            }
            grouped
                .entry(m.tool_name.as_str())
                .or_default()
                .entry(m.node_hostname.as_str())
                .or_default()
                .push(m);
        }
        grouped
    }
}

impl AlphaEstimator for TimeRatioEstimator {
    fn kind(&self) -> AlphaModelKind {
        AlphaModelKind::TimeRatio
    }

    fn estimate(&self, nodes: &[NodeProfile]) -> Result<ProfileReport, ClassifierError> {
        let tiers = classify_tiers(nodes)?;
        let bandwidth: HashMap<&str, f64> = nodes
            .iter()
            .map(|n| (n.hostname.as_str(), n.effective_network_bandwidth()))
            .collect();

        let grouped = self.grouped();
        let mut tools = BTreeMap::new();
        let mut skipped = Vec::new();
        let mut measured_hosts = BTreeSet::new();

        for tool in catalog::all_tools() {
            let Some(by_host) = grouped.get(tool.name) else {
                warn!(tool = tool.name, runtime = %self.runtime, "No measurements, tool skipped");
                skipped.push(tool.name.to_string());
                continue;
            };

            let mut per_node: BTreeMap<String, NodeSample> = BTreeMap::new();
            for (host, records) in by_host {
                let bw = bandwidth.get(host).copied().unwrap_or_else(|| {
                    debug!(host = %host, "No node record, using default network bandwidth");
                    DEFAULT_NETWORK_BANDWIDTH_BPS
                });
                let alpha = mean(records.iter().map(|m| {
                    time_ratio_alpha(m.execution_time, m.input_size, m.output_size, Some(bw))
                }))
                .unwrap_or(NEUTRAL_ALPHA);
                let exec_time = mean(records.iter().map(|m| m.execution_time)).unwrap_or(0.0);
                measured_hosts.insert(host.to_string());
                per_node.insert(host.to_string(), NodeSample { alpha, exec_time });
            }

            let alpha = mean(per_node.values().map(|s| s.alpha)).unwrap_or(NEUTRAL_ALPHA);

            let mut tier_alphas: BTreeMap<Tier, Vec<f64>> = BTreeMap::new();
            for (host, sample) in &per_node {
                if let Some(tier) = tiers.tier_of(host) {
                    tier_alphas.entry(tier).or_default().push(sample.alpha);
                }
            }
            let alpha_by_tier: BTreeMap<Tier, f64> = tier_alphas
                .into_iter()
                .filter_map(|(tier, alphas)| mean(alphas).map(|a| (tier, a)))
                .collect();

            let cost_alphas: BTreeMap<Tier, f64> = tiers
                .tiers()
                .map(|t| (t, alpha_by_tier.get(&t).copied().unwrap_or(alpha)))
                .collect();
            let relative_cost_by_tier = relative_cost(&cost_alphas, &tiers.specs);

            let records: Vec<&ToolMeasurement> = by_host.values().flatten().copied().collect();
            let count = records.len() as u64;
            let avg_input = records.iter().map(|m| m.input_size).sum::<u64>() / count.max(1);
            let avg_output = records.iter().map(|m| m.output_size).sum::<u64>() / count.max(1);

            debug!(tool = tool.name, alpha, nodes = per_node.len(), "Time-ratio alpha computed");

            tools.insert(
                tool.name.to_string(),
                ToolProfile {
                    description: tool.description.to_string(),
                    data_locality: catalog::data_locality(tool.server),
                    operational_intensity: None,
                    oi_measured: None,
                    alpha,
                    alpha_by_tier,
                    relative_cost_by_tier,
                    alpha_by_node: per_node.iter().map(|(h, s)| (h.clone(), s.alpha)).collect(),
                    exec_time_by_node: per_node
                        .iter()
                        .map(|(h, s)| (h.clone(), s.exec_time))
                        .collect(),
                    avg_input_size_bytes: Some(avg_input),
                    avg_output_size_bytes: Some(avg_output),
                },
            );
        }

        info!(
            runtime = %self.runtime,
            profiled = tools.len(),
            skipped = skipped.len(),
            "Time-ratio profile computed"
        );

        Ok(assemble_report(
            AlphaModelKind::TimeRatio,
            Some(self.runtime),
            tools,
            tiers,
            measured_hosts.into_iter().collect(),
            skipped,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn measurement(tool: &str, host: &str, t: f64, size: u64) -> ToolMeasurement {
        ToolMeasurement::from_samples(tool, "", host, Runtime::Native, size, size, vec![t]).unwrap()
    }

    #[test]
    fn test_zero_payload_is_pure_compute() {
        assert_eq!(time_ratio_alpha(0.25, 0, 0, Some(1e6)), 1.0);
    }

    #[test]
    fn test_zero_time_is_pure_communication() {
        assert_eq!(time_ratio_alpha(0.0, 10, 20, Some(1e6)), 0.0);
    }

    #[test]
    fn test_zero_over_zero_is_neutral() {
        assert_eq!(time_ratio_alpha(0.0, 0, 0, Some(1e6)), 0.5);
        assert_eq!(time_ratio_alpha(0.0, 100, 100, None), 0.5);
    }

    #[test]
    fn test_missing_bandwidth_charges_no_transfer() {
        assert_eq!(time_ratio_alpha(0.1, 1_000_000, 1_000_000, None), 1.0);
        assert_eq!(time_ratio_alpha(0.1, 1_000_000, 1_000_000, Some(0.0)), 1.0);
        assert_eq!(time_ratio_alpha(0.1, 1_000_000, 1_000_000, Some(-5.0)), 1.0);
    }

    #[test]
    fn test_balanced_case() {
        // 1000 bytes at 8000 bit/s = 1 s of transfer
        let alpha = time_ratio_alpha(1.0, 500, 500, Some(8000.0));
        assert!((alpha - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_unmeasured_tools_skipped() {
        let nodes = vec![NodeProfile {
            peak_compute_rate: Some(1e9),
            memory_bandwidth: Some(1e9),
            network_bandwidth: Some(8000.0),
            ..NodeProfile::new("edge")
        }];
        let estimator = TimeRatioEstimator::new(
            Runtime::Native,
            vec![measurement("git_status", "edge", 1.0, 500)],
        );
        let report = estimator.estimate(&nodes).unwrap();
        assert_eq!(report.tools.len(), 1);
        assert_eq!(report.metadata.skipped_tools.len(), catalog::tool_count() - 1);
        assert!(report.metadata.skipped_tools.contains(&"git_log".to_string()));
        assert_eq!(report.metadata.runtime, Some(Runtime::Native));

        let profile = &report.tools["git_status"];
        assert!((profile.alpha - 0.5).abs() < 1e-12);
        assert_eq!(profile.avg_input_size_bytes, Some(500));
        assert_eq!(profile.alpha_by_tier.get(&Tier::Low).copied(), Some(profile.alpha));
    }

    #[test]
    fn test_alpha_averaged_across_nodes() {
        let nodes = vec![
            NodeProfile {
                peak_compute_rate: Some(1.0),
                network_bandwidth: Some(8000.0),
                ..NodeProfile::new("slow")
            },
            NodeProfile {
                peak_compute_rate: Some(10.0),
                network_bandwidth: Some(8000.0),
                ..NodeProfile::new("fast")
            },
        ];
        // slow: 1 / (1 + 1) = 0.5; fast: zero payload -> 1.0
        let estimator = TimeRatioEstimator::new(
            Runtime::Native,
            vec![
                measurement("fetch", "slow", 1.0, 500),
                measurement("fetch", "fast", 1.0, 0),
            ],
        );
        let report = estimator.estimate(&nodes).unwrap();
        let fetch = &report.tools["fetch"];
        assert!((fetch.alpha - 0.75).abs() < 1e-12);
        assert_eq!(fetch.alpha_by_node.len(), 2);
        assert_eq!(fetch.alpha_by_tier.get(&Tier::Mid).copied(), Some(1.0));
        assert_eq!(report.metadata.measured_nodes, vec!["fast", "slow"]);
    }

    #[test]
    fn test_host_without_node_record_uses_default_bandwidth() {
        let nodes = vec![NodeProfile::new("known")];
        // 12.5 MB at 100 Mbit/s = 1 s
        let estimator = TimeRatioEstimator::new(
            Runtime::Native,
            vec![measurement("convert_time", "stranger", 1.0, 6_250_000)],
        );
        let report = estimator.estimate(&nodes).unwrap();
        let profile = &report.tools["convert_time"];
        assert!((profile.alpha - 0.5).abs() < 1e-12);
        assert!(profile.alpha_by_tier.is_empty());
    }

    #[test]
    fn test_other_runtime_and_unknown_tools_ignored() {
        let nodes = vec![NodeProfile::new("n")];
        let mut wasm = measurement("git_status", "n", 1.0, 10);
        wasm.runtime = Runtime::Wasm;
        let estimator = TimeRatioEstimator::new(
            Runtime::Native,
            vec![wasm, measurement("not_a_tool", "n", 1.0, 10)],
        );
        let report = estimator.estimate(&nodes).unwrap();
        assert!(report.tools.is_empty());
        assert_eq!(report.metadata.skipped_tools.len(), catalog::tool_count());
    }

    #[test]
    fn test_no_nodes_is_fatal() {
        let estimator = TimeRatioEstimator::new(Runtime::Http, vec![]);
        assert_eq!(estimator.estimate(&[]), Err(ClassifierError::NoNodes));
    }
}
