//! Core data models for the edge tool profiler

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Network bandwidth assumed when a node has no measurement (100 Mbit/s)
pub const DEFAULT_NETWORK_BANDWIDTH_BPS: f64 = 100_000_000.0;

/// Alpha at or above this value counts as computation-bound
pub const COMPUTE_BOUND_THRESHOLD: f64 = 0.7;

/// Alpha at or below this value counts as communication-bound
pub const COMMUNICATION_BOUND_THRESHOLD: f64 = 0.3;

/// Reasons a node or measurement record is rejected
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecordError {
    #[error("{0} is empty")]
    Empty(&'static str),

    #[error("{field} must be a non-negative number, got {value}")]
    InvalidValue { field: &'static str, value: f64 },

    #[error("no samples")]
    NoSamples,

    #[error("run_count {run_count} does not match {samples} raw samples")]
    RunCountMismatch { run_count: u32, samples: usize },
}

/// Hardware performance record for one machine
///
/// Produced by the node benchmarks and persisted as `node_<hostname>.yaml`.
/// Rates are optional because each benchmark phase may be skipped or fail
/// independently; the ridge point is always derived, never stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeProfile {
    pub hostname: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_cores: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_freq_mhz: Option<f64>,
    /// Floating-point operations per second
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peak_compute_rate: Option<f64>,
    /// Bytes per second
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_bandwidth: Option<f64>,
    /// Bits per second
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_bandwidth: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_latency_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub measured_at: Option<DateTime<Utc>>,
}

impl NodeProfile {
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            ..Default::default()
        }
    }

    /// Peak compute rate divided by memory bandwidth, when both are known
    pub fn ridge_point(&self) -> Option<f64> {
        match (self.peak_compute_rate, self.memory_bandwidth) {
            (Some(rate), Some(bw)) if bw > 0.0 => Some(rate / bw),
            _ => None,
        }
    }

    /// Measured network bandwidth, or the 100 Mbit/s fallback
    pub fn effective_network_bandwidth(&self) -> f64 {
        self.network_bandwidth.unwrap_or(DEFAULT_NETWORK_BANDWIDTH_BPS)
    }

    /// Reject records that cannot have come from a benchmark
    pub fn validate(&self) -> Result<(), RecordError> {
        if self.hostname.trim().is_empty() {
            return Err(RecordError::Empty("hostname"));
        }
        let rates = [
            ("peak_compute_rate", self.peak_compute_rate),
            ("memory_bandwidth", self.memory_bandwidth),
            ("network_bandwidth", self.network_bandwidth),
        ];
        for (field, value) in rates {
            if let Some(v) = value {
                if !v.is_finite() || v < 0.0 {
                    return Err(RecordError::InvalidValue { field, value: v });
                }
            }
        }
        Ok(())
    }
}

/// Runtime a tool was executed under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Runtime {
    /// Native process speaking JSON-RPC on stdio
    Native,
    /// `wasmtime run` sandbox on stdio
    Wasm,
    /// `wasmtime serve` over HTTP
    Http,
}

impl Runtime {
    pub const ALL: [Runtime; 3] = [Runtime::Native, Runtime::Wasm, Runtime::Http];

    pub fn as_str(&self) -> &'static str {
        match self {
            Runtime::Native => "native",
            Runtime::Wasm => "wasm",
            Runtime::Http => "http",
        }
    }
}

impl fmt::Display for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Execution measurement for one tool on one node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolMeasurement {
    pub tool_name: String,
    #[serde(default)]
    pub server: String,
    pub node_hostname: String,
    pub runtime: Runtime,
    /// Mean of `raw_samples`, in seconds
    pub execution_time: f64,
    /// Request size in bytes
    pub input_size: u64,
    /// Response size in bytes
    pub output_size: u64,
    pub run_count: u32,
    /// Per-run wall-clock seconds
    pub raw_samples: Vec<f64>,
}

impl ToolMeasurement {
    /// Build a measurement from timed runs, rejecting unusable samples
    pub fn from_samples(
        tool_name: impl Into<String>,
        server: impl Into<String>,
        node_hostname: impl Into<String>,
        runtime: Runtime,
        input_size: u64,
        output_size: u64,
        raw_samples: Vec<f64>,
    ) -> Result<Self, RecordError> {
        if raw_samples.is_empty() {
            return Err(RecordError::NoSamples);
        }
        if let Some(bad) = raw_samples.iter().find(|s| !s.is_finite() || **s < 0.0) {
            return Err(RecordError::InvalidValue {
                field: "raw_samples",
                value: *bad,
            });
        }
        let execution_time = raw_samples.iter().sum::<f64>() / raw_samples.len() as f64;
        Ok(Self {
            tool_name: tool_name.into(),
            server: server.into(),
            node_hostname: node_hostname.into(),
            runtime,
            execution_time,
            input_size,
            output_size,
            run_count: raw_samples.len() as u32,
            raw_samples,
        })
    }

    /// Re-check a deserialized record
    pub fn validate(&self) -> Result<(), RecordError> {
        if self.tool_name.is_empty() {
            return Err(RecordError::Empty("tool_name"));
        }
        if !self.execution_time.is_finite() || self.execution_time < 0.0 {
            return Err(RecordError::InvalidValue {
                field: "execution_time",
                value: self.execution_time,
            });
        }
        if self.run_count == 0 {
            return Err(RecordError::NoSamples);
        }
        if self.raw_samples.len() != self.run_count as usize {
            return Err(RecordError::RunCountMismatch {
                run_count: self.run_count,
                samples: self.raw_samples.len(),
            });
        }
        if let Some(bad) = self.raw_samples.iter().find(|s| !s.is_finite() || **s < 0.0) {
            return Err(RecordError::InvalidValue {
                field: "raw_samples",
                value: *bad,
            });
        }
        Ok(())
    }
}

/// Operational intensity measured for one tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationalIntensity {
    pub tool_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
    /// FLOPs (approximated by instructions) per byte of memory traffic
    pub operational_intensity: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runs: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_misses: Option<u64>,
}

/// Compute-capacity tier a node is bucketed into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Low,
    Mid,
    High,
}

impl Tier {
    /// Fixed output order for per-tier vectors
    pub const ORDER: [Tier; 3] = [Tier::Low, Tier::Mid, Tier::High];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Low => "low",
            Tier::Mid => "mid",
            Tier::High => "high",
        }
    }

    /// Deployment class shown in tables
    pub fn display_class(&self) -> &'static str {
        match self {
            Tier::Low => "DEVICE",
            Tier::Mid => "EDGE",
            Tier::High => "CLOUD",
        }
    }

    pub fn index(&self) -> usize {
        match self {
            Tier::Low => 0,
            Tier::Mid => 1,
            Tier::High => 2,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Averaged hardware spec of the nodes in one tier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierSpec {
    pub peak_compute_rate: Option<f64>,
    pub memory_bandwidth: Option<f64>,
    /// Mean of member ridge points, not the ratio of the averages
    pub ridge_point: Option<f64>,
    pub node_count: usize,
}

/// Data locality class of a tool, keyed on its server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataLocality {
    LocalData,
    LocalCompute,
    LocalUtility,
    VersionControl,
    Network,
    Unknown,
}

impl DataLocality {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataLocality::LocalData => "local_data",
            DataLocality::LocalCompute => "local_compute",
            DataLocality::LocalUtility => "local_utility",
            DataLocality::VersionControl => "version_control",
            DataLocality::Network => "network",
            DataLocality::Unknown => "unknown",
        }
    }
}

impl fmt::Display for DataLocality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which alpha estimator produced a report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlphaModelKind {
    Roofline,
    TimeRatio,
}

/// Per-tool output of the classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolProfile {
    pub description: String,
    pub data_locality: DataLocality,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operational_intensity: Option<f64>,
    /// False when the roofline input had no OI for this tool
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oi_measured: Option<bool>,
    pub alpha: f64,
    pub alpha_by_tier: BTreeMap<Tier, f64>,
    /// Min-max normalized cost, ordered [low, mid, high]
    pub relative_cost_by_tier: [f64; 3],
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub alpha_by_node: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub exec_time_by_node: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_input_size_bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_output_size_bytes: Option<u64>,
}

/// Coarse reading of an alpha value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlphaClass {
    ComputeBound,
    Mixed,
    CommunicationBound,
}

impl AlphaClass {
    pub fn of(alpha: f64) -> Self {
        if alpha >= COMPUTE_BOUND_THRESHOLD {
            AlphaClass::ComputeBound
        } else if alpha <= COMMUNICATION_BOUND_THRESHOLD {
            AlphaClass::CommunicationBound
        } else {
            AlphaClass::Mixed
        }
    }
}

/// Count of tools per alpha class
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlphaDistribution {
    pub compute_bound: usize,
    pub mixed: usize,
    pub communication_bound: usize,
}

impl AlphaDistribution {
    pub fn from_alphas(alphas: impl IntoIterator<Item = f64>) -> Self {
        let mut dist = Self::default();
        for alpha in alphas {
            match AlphaClass::of(alpha) {
                AlphaClass::ComputeBound => dist.compute_bound += 1,
                AlphaClass::Mixed => dist.mixed += 1,
                AlphaClass::CommunicationBound => dist.communication_bound += 1,
            }
        }
        dist
    }
}

/// Run-level information attached to a report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub generated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<Runtime>,
    pub measured_nodes: Vec<String>,
    pub total_tools: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped_tools: Vec<String>,
    pub distribution: AlphaDistribution,
}

/// Full classifier output for one profiling run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileReport {
    pub model: AlphaModelKind,
    pub tools: BTreeMap<String, ToolProfile>,
    pub node_specs: BTreeMap<Tier, TierSpec>,
    pub node_tiers: BTreeMap<String, Tier>,
    pub metadata: ReportMetadata,
}

impl ProfileReport {
    /// Presentation copy with alphas and costs rounded to `decimals`
    /// places and operational intensity to one more.
    pub fn rounded(&self, decimals: i32) -> Self {
        let mut report = self.clone();
        for profile in report.tools.values_mut() {
            profile.alpha = round_to(profile.alpha, decimals);
            profile.operational_intensity = profile
                .operational_intensity
                .map(|oi| round_to(oi, decimals + 1));
            for alpha in profile.alpha_by_tier.values_mut() {
                *alpha = round_to(*alpha, decimals);
            }
            for alpha in profile.alpha_by_node.values_mut() {
                *alpha = round_to(*alpha, decimals);
            }
            for t in profile.exec_time_by_node.values_mut() {
                *t = round_to(*t, decimals + 1);
            }
            for cost in profile.relative_cost_by_tier.iter_mut() {
                *cost = round_to(*cost, decimals);
            }
        }
        report
    }
}

/// Round half away from zero to `decimals` places
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
