//! Relative per-tier execution cost

use super::NEUTRAL_ALPHA;
use crate::models::{Tier, TierSpec};
use std::collections::BTreeMap;

/// Cost reported for a tier with no usable spec, ordered [low, mid, high]:
/// an unseen low tier is assumed worst, an unseen high tier best.
pub const PLACEHOLDER_COST: [f64; 3] = [1.0, 0.5, 0.0];

/// `alpha / peak_compute_rate + (1 - alpha) / memory_bandwidth`
///
/// `None` when either denominator is missing or not positive.
pub fn inverse_cost(alpha: f64, spec: &TierSpec) -> Option<f64> {
    let rate = spec.peak_compute_rate.filter(|r| *r > 0.0)?;
    let bw = spec.memory_bandwidth.filter(|b| *b > 0.0)?;
    Some(alpha / rate + (1.0 - alpha) / bw)
}

/// Min-max normalized inverse cost per tier.
///
/// Tiers that cannot be costed keep their placeholder. When every costed
/// tier has the same inverse cost, each of them gets exactly 0.5.
pub fn relative_cost(
    alpha_by_tier: &BTreeMap<Tier, f64>,
    specs: &BTreeMap<Tier, TierSpec>,
) -> [f64; 3] {
    let costs: Vec<(Tier, f64)> = specs
        .iter()
        .filter_map(|(tier, spec)| {
            let alpha = alpha_by_tier.get(tier).copied()?;
            inverse_cost(alpha, spec).map(|c| (*tier, c))
        })
        .collect();

    let mut result = PLACEHOLDER_COST;
    if costs.is_empty() {
        return result;
    }

    let min = costs.iter().map(|(_, c)| *c).fold(f64::INFINITY, f64::min);
    let max = costs.iter().map(|(_, c)| *c).fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;

    for (tier, cost) in costs {
        result[tier.index()] = if range > 0.0 {
            (cost - min) / range
        } else {
            NEUTRAL_ALPHA
        };
    }
    result
}
