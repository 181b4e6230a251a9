//! Performance classification and alpha estimation
//!
//! Buckets nodes into compute tiers and computes, for every catalog tool,
//! an alpha in [0, 1] saying how computation-bound the tool is. Two
//! interchangeable estimators exist:
//! - [`RooflineEstimator`]: sigmoid over operational intensity vs. the
//!   tier ridge point
//! - [`TimeRatioEstimator`]: measured execution time vs. the time needed
//!   to move the tool's payload over the node's network link
//!
//! A run uses exactly one estimator. Estimators own their (immutable)
//! inputs and keep no state between calls, so one instance can be shared
//! across threads.

mod cost;
mod roofline;
mod tiers;
mod time_ratio;

#[cfg(test)]
mod tests;

pub use cost::{inverse_cost, relative_cost, PLACEHOLDER_COST};
pub use roofline::{
    roofline_alpha, RooflineEstimator, ALPHA_FLOOR, DEFAULT_OPERATIONAL_INTENSITY,
    ROOFLINE_STEEPNESS,
};
pub use tiers::{classify_tiers, TierAssignment};
pub use time_ratio::{time_ratio_alpha, TimeRatioEstimator};

use crate::models::{
    AlphaDistribution, AlphaModelKind, NodeProfile, ProfileReport, ReportMetadata, Runtime,
    ToolProfile,
};
use std::collections::BTreeMap;
use thiserror::Error;

/// Alpha reported when the inputs carry no discriminating information
pub const NEUTRAL_ALPHA: f64 = 0.5;

/// Errors raised by the classifier
#[derive(Debug, Error, PartialEq)]
pub enum ClassifierError {
    /// Configuration error: tiers cannot be formed without nodes
    #[error("no node records supplied; at least one node is required to form tiers")]
    NoNodes,

    #[error("invalid {what}: {reason}")]
    InvalidRecord { what: String, reason: String },
}

/// Trait for alpha estimation models
pub trait AlphaEstimator: Send + Sync {
    /// Model identifier written into the report
    fn kind(&self) -> AlphaModelKind;

    /// Classify `nodes` into tiers and profile every catalog tool
    fn estimate(&self, nodes: &[NodeProfile]) -> Result<ProfileReport, ClassifierError>;
}

/// Arithmetic mean, `None` for an empty input
pub(crate) fn mean(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    let mut sum = 0.0;
    let mut count = 0usize;
    for v in values {
        sum += v;
        count += 1;
    }
    (count > 0).then(|| sum / count as f64)
}

pub(crate) fn assemble_report(
    model: AlphaModelKind,
    runtime: Option<Runtime>,
    tools: BTreeMap<String, ToolProfile>,
    tiers: TierAssignment,
    measured_nodes: Vec<String>,
    skipped_tools: Vec<String>,
) -> ProfileReport {
    let distribution = AlphaDistribution::from_alphas(tools.values().map(|p| p.alpha));
    let node_tiers = tiers
        .node_tiers
        .iter()
        .map(|(host, tier)| (host.clone(), *tier))
        .collect();

    ProfileReport {
        model,
        metadata: ReportMetadata {
            generated_at: chrono::Utc::now(),
            runtime,
            measured_nodes,
            total_tools: tools.len(),
            skipped_tools,
            distribution,
        },
        tools,
        node_specs: tiers.specs,
        node_tiers,
    }
}
