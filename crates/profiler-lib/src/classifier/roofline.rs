//! Roofline alpha model
//!
//! `alpha = sigmoid(k * (ln(OI) - ln(ridge_point)))` with `k = 2`.
//! A tool whose operational intensity sits far above a tier's ridge point
//! is compute-bound there (alpha near 1), far below is memory-bound
//! (alpha near 0), exactly at the ridge gives 0.5.

use super::{
    assemble_report, mean, relative_cost, AlphaEstimator, ClassifierError, TierAssignment,
    NEUTRAL_ALPHA,
};
use crate::catalog::{self, ToolDefinition};
use crate::models::{
    AlphaModelKind, NodeProfile, OperationalIntensity, ProfileReport, Tier, ToolProfile,
};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

/// Sigmoid steepness
pub const ROOFLINE_STEEPNESS: f64 = 2.0;

/// Inputs at or below zero are raised to this before taking logarithms
pub const ALPHA_FLOOR: f64 = 1e-6;

/// OI assumed for catalog tools without a measurement
pub const DEFAULT_OPERATIONAL_INTENSITY: f64 = 0.5;

/// Roofline alpha for one tool on one tier
pub fn roofline_alpha(operational_intensity: Option<f64>, ridge_point: Option<f64>) -> f64 {
    let oi = floored(operational_intensity);
    let ridge = floored(ridge_point);
    if ridge == 0.0 {
        return NEUTRAL_ALPHA;
    }
    let x = ROOFLINE_STEEPNESS * (oi.ln() - ridge.ln());
    sigmoid(x)
}

fn floored(value: Option<f64>) -> f64 {
    // f64::max ignores NaN, so NaN also lands on the floor
    value.unwrap_or(ALPHA_FLOOR).max(ALPHA_FLOOR)
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Roofline estimator over a table of per-tool operational intensities
#[derive(Debug, Clone, Default)]
pub struct RooflineEstimator {
    intensities: HashMap<String, f64>,
}

impl RooflineEstimator {
    pub fn new(records: impl IntoIterator<Item = OperationalIntensity>) -> Self {
        let intensities = records
            .into_iter()
            .map(|r| (r.tool_name, r.operational_intensity))
            .collect();
        Self { intensities }
    }

    /// Measured OI for a tool, if any
    pub fn intensity(&self, tool_name: &str) -> Option<f64> {
        self.intensities.get(tool_name).copied()
    }

    /// Profile one tool against the classified tiers
    pub fn profile_tool(&self, tool: &ToolDefinition, tiers: &TierAssignment) -> ToolProfile {
        let measured = self.intensity(tool.name);
        let oi = measured.unwrap_or(DEFAULT_OPERATIONAL_INTENSITY);

        let alpha_by_tier: BTreeMap<Tier, f64> = tiers
            .specs
            .iter()
            .map(|(tier, spec)| (*tier, roofline_alpha(Some(oi), spec.ridge_point)))
            .collect();

        let alpha = mean(alpha_by_tier.values().copied()).unwrap_or(NEUTRAL_ALPHA);
        let relative_cost_by_tier = relative_cost(&alpha_by_tier, &tiers.specs);

        debug!(
            tool = tool.name,
            operational_intensity = oi,
            oi_measured = measured.is_some(),
            alpha,
            "Roofline alpha computed"
        );

        ToolProfile {
            description: tool.description.to_string(),
            data_locality: catalog::data_locality(tool.server),
            operational_intensity: Some(oi),
            oi_measured: Some(measured.is_some()),
            alpha,
            alpha_by_tier,
            relative_cost_by_tier,
            alpha_by_node: BTreeMap::new(),
            exec_time_by_node: BTreeMap::new(),
            avg_input_size_bytes: None,
            avg_output_size_bytes: None,
        }
    }
}

impl AlphaEstimator for RooflineEstimator {
    fn kind(&self) -> AlphaModelKind {
        AlphaModelKind::Roofline
    }

    fn estimate(&self, nodes: &[NodeProfile]) -> Result<ProfileReport, ClassifierError> {
        let tiers = super::classify_tiers(nodes)?;

        let tools: BTreeMap<String, ToolProfile> = catalog::all_tools()
            .iter()
            .map(|tool| (tool.name.to_string(), self.profile_tool(tool, &tiers)))
            .collect();

        let unmeasured = catalog::all_tools()
            .iter()
            .filter(|t| self.intensity(t.name).is_none())
            .count();
        info!(
            tools = tools.len(),
            unmeasured_oi = unmeasured,
            tiers = tiers.specs.len(),
            "Roofline profile computed"
        );

        let measured_nodes = nodes.iter().map(|n| n.hostname.clone()).collect();
        Ok(assemble_report(
            AlphaModelKind::Roofline,
            None,
            tools,
            tiers,
            measured_nodes,
            Vec::new(),
        ))
    }
}
