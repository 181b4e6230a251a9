use super::*;
use crate::models::{OperationalIntensity, Tier, TierSpec};
use std::collections::BTreeMap;
use proptest::prelude::*;

fn node(host: &str, rate: f64, bw: f64) -> NodeProfile {
    NodeProfile {
        peak_compute_rate: Some(rate),
        memory_bandwidth: Some(bw),
        ..NodeProfile::new(host)
    }
}

fn oi(tool: &str, value: f64) -> OperationalIntensity {
    OperationalIntensity {
        tool_name: tool.to_string(),
        server: None,
        operational_intensity: value,
        runs: None,
        instructions: None,
        cache_misses: None,
    }
}

#[test]
fn test_two_node_roofline_scenario() {
    let nodes = vec![node("A", 10.0, 100.0), node("B", 100.0, 100.0)];
    let estimator = RooflineEstimator::new(vec![oi("fetch", 1.0)]);
    let report = estimator.estimate(&nodes).unwrap();

    assert_eq!(report.node_tiers["A"], Tier::Low);
    assert_eq!(report.node_tiers["B"], Tier::Mid);
    assert_eq!(report.node_specs[&Tier::Low].ridge_point, Some(0.1));
    assert_eq!(report.node_specs[&Tier::Mid].ridge_point, Some(1.0));

    let fetch = &report.tools["fetch"];
    let low = fetch.alpha_by_tier[&Tier::Low];
    let mid = fetch.alpha_by_tier[&Tier::Mid];
    assert!((low - 0.9901).abs() < 1e-3, "low tier alpha {}", low);
    assert!((mid - 0.5).abs() < 1e-12);
    assert!((fetch.alpha - (low + mid) / 2.0).abs() < 1e-12);
    assert!((fetch.alpha - 0.745).abs() < 1e-2, "tool alpha {}", fetch.alpha);
    assert_eq!(fetch.oi_measured, Some(true));
    assert_eq!(report.tools.len(), crate::catalog::tool_count());
}

#[test]
fn test_roofline_alpha_is_mean_of_tier_alphas() {
    let nodes = vec![
        node("a", 1e9, 2e9),
        node("b", 5e9, 2e9),
        node("c", 2e10, 4e9),
    ];
    let estimator = RooflineEstimator::new(vec![oi("resize_image", 3.0)]);
    let report = estimator.estimate(&nodes).unwrap();
    for profile in report.tools.values() {
        let mean_of_tiers =
            profile.alpha_by_tier.values().sum::<f64>() / profile.alpha_by_tier.len() as f64;
        assert!((profile.alpha - mean_of_tiers).abs() < 1e-12);
    }
}

#[test]
fn test_identical_inverse_cost_is_half() {
    let specs: BTreeMap<_, _> = Tier::ORDER
        .iter()
        .map(|t| {
            (
                *t,
                TierSpec {
                    peak_compute_rate: Some(4.0),
                    memory_bandwidth: Some(2.0),
                    ridge_point: Some(2.0),
                    node_count: 1,
                },
            )
        })
        .collect();
    let alphas: BTreeMap<_, _> = Tier::ORDER.iter().map(|t| (*t, 0.42)).collect();
    assert_eq!(relative_cost(&alphas, &specs), [0.5, 0.5, 0.5]);
}

#[test]
fn test_empty_node_set_produces_no_report() {
    let roofline = RooflineEstimator::new(vec![]);
    assert_eq!(roofline.estimate(&[]), Err(ClassifierError::NoNodes));
}

#[test]
fn test_estimators_are_shareable() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<RooflineEstimator>();
    assert_send_sync::<TimeRatioEstimator>();
    assert_send_sync::<Box<dyn AlphaEstimator>>();
}

#[test]
fn test_distribution_counts_every_tool() {
    let nodes = vec![node("only", 1.0, 1.0)];
    let report = RooflineEstimator::new(vec![oi("fetch", 100.0), oi("git_log", 0.001)])
        .estimate(&nodes)
        .unwrap();
    let dist = &report.metadata.distribution;
    assert_eq!(
        dist.compute_bound + dist.mixed + dist.communication_bound,
        report.metadata.total_tools
    );
    assert!(dist.compute_bound >= 1);
    assert!(dist.communication_bound >= 1);
}

proptest! {
    #[test]
    fn prop_roofline_alpha_in_open_unit_interval(oi in 1e-3f64..1e3, ridge in 1e-3f64..1e3) {
        let alpha = roofline_alpha(Some(oi), Some(ridge));
        prop_assert!(alpha > 0.0 && alpha < 1.0);
    }

    #[test]
    fn prop_roofline_increasing_in_oi(oi in 1e-3f64..1e3, ridge in 1e-3f64..1e3, factor in 1.01f64..10.0) {
        prop_assert!(roofline_alpha(Some(oi * factor), Some(ridge)) > roofline_alpha(Some(oi), Some(ridge)));
    }

    #[test]
    fn prop_roofline_decreasing_in_ridge(oi in 1e-3f64..1e3, ridge in 1e-3f64..1e3, factor in 1.01f64..10.0) {
        prop_assert!(roofline_alpha(Some(oi), Some(ridge * factor)) < roofline_alpha(Some(oi), Some(ridge)));
    }

    #[test]
    fn prop_roofline_half_at_ridge(ridge in 1e-6f64..1e9) {
        prop_assert!((roofline_alpha(Some(ridge), Some(ridge)) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn prop_time_ratio_in_unit_interval(
        t in 0.0f64..100.0,
        input in 0u64..10_000_000,
        output in 0u64..10_000_000,
        bw in 1.0f64..1e11,
    ) {
        let alpha = time_ratio_alpha(t, input, output, Some(bw));
        prop_assert!((0.0..=1.0).contains(&alpha));
    }

    #[test]
    fn prop_time_ratio_zero_payload(t in 1e-9f64..100.0, bw in 1.0f64..1e11) {
        prop_assert_eq!(time_ratio_alpha(t, 0, 0, Some(bw)), 1.0);
    }

    #[test]
    fn prop_time_ratio_zero_time(input in 0u64..1_000_000, output in 1u64..1_000_000, bw in 1.0f64..1e11) {
        prop_assert_eq!(time_ratio_alpha(0.0, input, output, Some(bw)), 0.0);
    }

    #[test]
    fn prop_tier_assignment_follows_rate(rates in proptest::collection::vec(0.0f64..1e12, 3..12)) {
        let nodes: Vec<_> = rates
            .iter()
            .enumerate()
            .map(|(i, r)| node(&format!("n{}", i), *r, 1.0))
            .collect();
        let tiers = classify_tiers(&nodes).unwrap();
        let low = tiers.node_tiers.first().map(|(h, _)| h.clone()).unwrap();
        let high = tiers.node_tiers.last().map(|(h, _)| h.clone()).unwrap();
        let rate_of = |h: &str| nodes.iter().find(|n| n.hostname == h).and_then(|n| n.peak_compute_rate).unwrap();
        for n in &nodes {
            prop_assert!(rate_of(&low) <= n.peak_compute_rate.unwrap());
            prop_assert!(rate_of(&high) >= n.peak_compute_rate.unwrap());
        }
        prop_assert_eq!(tiers.spec(Tier::Mid).map(|s| s.node_count), Some(nodes.len() - 2));
    }
}
