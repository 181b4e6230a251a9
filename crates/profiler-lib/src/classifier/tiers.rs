//! Node tier classification
//!
//! Nodes are stable-sorted by peak compute rate (unknown rate sorts as 0,
//! i.e. the weakest) and bucketed: the slowest node is `low`, the fastest
//! is `high` and everything in between is `mid`. Two nodes give
//! {low, mid}, one node gives {low}.

use super::{mean, ClassifierError};
use crate::models::{NodeProfile, Tier, TierSpec};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

/// Result of tier classification
#[derive(Debug, Clone, PartialEq)]
pub struct TierAssignment {
    /// Hostname to tier, in ascending compute-rate order
    pub node_tiers: Vec<(String, Tier)>,
    /// Averaged spec of every tier that has members
    pub specs: BTreeMap<Tier, TierSpec>,
}

impl TierAssignment {
    pub fn tier_of(&self, hostname: &str) -> Option<Tier> {
        self.node_tiers
            .iter()
            .find(|(host, _)| host == hostname)
            .map(|(_, tier)| *tier)
    }

    pub fn spec(&self, tier: Tier) -> Option<&TierSpec> {
        self.specs.get(&tier)
    }

    /// Tiers present in this run, low to high
    pub fn tiers(&self) -> impl Iterator<Item = Tier> + '_ {
        self.specs.keys().copied()
    }
}

/// Assign each node to a tier and average the per-tier specs
pub fn classify_tiers(nodes: &[NodeProfile]) -> Result<TierAssignment, ClassifierError> {
    if nodes.is_empty() {
        return Err(ClassifierError::NoNodes);
    }

    let mut seen = HashSet::new();
    for node in nodes {
        if !seen.insert(node.hostname.as_str()) {
            return Err(ClassifierError::InvalidRecord {
                what: "node set".to_string(),
                reason: format!("duplicate hostname {}", node.hostname),
            });
        }
    }

    let mut sorted: Vec<&NodeProfile> = nodes.iter().collect();
    // sort_by is stable: equal rates keep input order
    sorted.sort_by(|a, b| {
        a.peak_compute_rate
            .unwrap_or(0.0)
            .total_cmp(&b.peak_compute_rate.unwrap_or(0.0))
    });

    let count = sorted.len();
    let node_tiers: Vec<(String, Tier)> = sorted
        .iter()
        .enumerate()
        .map(|(i, node)| (node.hostname.clone(), tier_for_position(i, count)))
        .collect();

    let mut members: BTreeMap<Tier, Vec<&NodeProfile>> = BTreeMap::new();
    for (node, (_, tier)) in sorted.iter().zip(&node_tiers) {
        members.entry(*tier).or_default().push(node);
    }

    let specs = members
        .into_iter()
        .map(|(tier, nodes)| (tier, average_spec(&nodes)))
        .collect();

    for (host, tier) in &node_tiers {
        debug!(hostname = %host, tier = %tier, class = tier.display_class(), "Node classified");
    }

    Ok(TierAssignment { node_tiers, specs })
}

fn tier_for_position(index: usize, count: usize) -> Tier {
    match count {
        1 => Tier::Low,
        2 => {
            if index == 0 {
                Tier::Low
            } else {
                Tier::Mid
            }
        }
        _ => {
            if index == 0 {
                Tier::Low
            } else if index == count - 1 {
                Tier::High
            } else {
                Tier::Mid
            }
        }
    }
}

/// Unweighted mean over the members that report each value.
/// The ridge point is the mean of member ridge points.
fn average_spec(nodes: &[&NodeProfile]) -> TierSpec {
    TierSpec {
        peak_compute_rate: mean(nodes.iter().filter_map(|n| n.peak_compute_rate)),
        memory_bandwidth: mean(nodes.iter().filter_map(|n| n.memory_bandwidth)),
        ridge_point: mean(nodes.iter().filter_map(|n| n.ridge_point())),
        node_count: nodes.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(host: &str, rate: Option<f64>, bw: Option<f64>) -> NodeProfile {
        NodeProfile {
            peak_compute_rate: rate,
            memory_bandwidth: bw,
            ..NodeProfile::new(host)
        }
    }

    #[test]
    fn test_empty_input_is_configuration_error() {
        assert_eq!(classify_tiers(&[]), Err(ClassifierError::NoNodes));
    }

    #[test]
    fn test_three_nodes_by_value_not_order() {
        let nodes = vec![
            node("a", Some(10.0), Some(1.0)),
            node("b", Some(50.0), Some(1.0)),
            node("c", Some(30.0), Some(1.0)),
        ];
        let tiers = classify_tiers(&nodes).unwrap();
        assert_eq!(tiers.tier_of("a"), Some(Tier::Low));
        assert_eq!(tiers.tier_of("b"), Some(Tier::High));
        assert_eq!(tiers.tier_of("c"), Some(Tier::Mid));
    }

    #[test]
    fn test_interior_nodes_share_mid() {
        let nodes: Vec<_> = (1..=5)
            .map(|i| node(&format!("n{}", i), Some(i as f64 * 10.0), Some(10.0)))
            .collect();
        let tiers = classify_tiers(&nodes).unwrap();
        let mid = tiers.spec(Tier::Mid).unwrap();
        assert_eq!(mid.node_count, 3);
        assert_eq!(mid.peak_compute_rate, Some(30.0));
        assert_eq!(mid.ridge_point, Some(3.0));
    }

    #[test]
    fn test_two_nodes_low_and_mid() {
        let nodes = vec![node("big", Some(100.0), None), node("small", Some(1.0), None)];
        let tiers = classify_tiers(&nodes).unwrap();
        assert_eq!(tiers.tier_of("small"), Some(Tier::Low));
        assert_eq!(tiers.tier_of("big"), Some(Tier::Mid));
        assert!(tiers.spec(Tier::High).is_none());
    }

    #[test]
    fn test_single_node_is_low_only() {
        let tiers = classify_tiers(&[node("solo", Some(5.0), Some(5.0))]).unwrap();
        assert_eq!(tiers.tiers().collect::<Vec<_>>(), vec![Tier::Low]);
    }

    #[test]
    fn test_unknown_rate_sorts_weakest() {
        let nodes = vec![
            node("fast", Some(100.0), None),
            node("unknown", None, None),
            node("slow", Some(1.0), None),
        ];
        let tiers = classify_tiers(&nodes).unwrap();
        assert_eq!(tiers.tier_of("unknown"), Some(Tier::Low));
        assert_eq!(tiers.tier_of("slow"), Some(Tier::Mid));
    }

    #[test]
    fn test_ties_keep_input_order() {
        let nodes = vec![
            node("first", Some(10.0), None),
            node("second", Some(10.0), None),
            node("third", Some(10.0), None),
        ];
        let tiers = classify_tiers(&nodes).unwrap();
        assert_eq!(tiers.tier_of("first"), Some(Tier::Low));
        assert_eq!(tiers.tier_of("second"), Some(Tier::Mid));
        assert_eq!(tiers.tier_of("third"), Some(Tier::High));
    }

    #[test]
    fn test_ridge_is_mean_of_ridges() {
        let nodes = vec![
            node("lo", Some(1.0), Some(1.0)),
            node("x", Some(10.0), Some(1.0)),
            node("y", Some(10.0), Some(10.0)),
            node("hi", Some(1000.0), Some(1.0)),
        ];
        let tiers = classify_tiers(&nodes).unwrap();
        let mid = tiers.spec(Tier::Mid).unwrap();
        // (10 + 1) / 2, not mean rate / mean bandwidth = 10 / 5.5
        assert_eq!(mid.ridge_point, Some(5.5));
        assert_eq!(mid.peak_compute_rate, Some(10.0));
        assert_eq!(mid.memory_bandwidth, Some(5.5));
    }

    #[test]
    fn test_missing_values_not_counted_as_zero() {
        let nodes = vec![
            node("lo", Some(1.0), Some(1.0)),
            node("m1", Some(10.0), Some(10.0)),
            node("m2", Some(20.0), None),
            node("hi", Some(100.0), None),
        ];
        let tiers = classify_tiers(&nodes).unwrap();
        let mid = tiers.spec(Tier::Mid).unwrap();
        assert_eq!(mid.memory_bandwidth, Some(10.0));
        assert_eq!(mid.ridge_point, Some(1.0));

        let high = tiers.spec(Tier::High).unwrap();
        assert_eq!(high.memory_bandwidth, None);
        assert_eq!(high.ridge_point, None);
    }

    #[test]
    fn test_duplicate_hostname_rejected() {
        let nodes = vec![node("a", Some(1.0), None), node("a", Some(2.0), None)];
        assert!(matches!(
            classify_tiers(&nodes),
            Err(ClassifierError::InvalidRecord { .. })
        ));
    }
}
