//! Profiling library for edge/cloud tool placement
//!
//! This crate provides the core functionality for:
//! - Node hardware benchmarks (FLOPS, memory and network bandwidth)
//! - Per-tool execution measurement across native, WASM and HTTP runtimes
//! - Tier classification and alpha (compute vs. communication) estimation
//! - Record persistence and observability

pub mod bench;
pub mod catalog;
pub mod classifier;
pub mod measure;
pub mod models;
pub mod observability;
pub mod store;
pub mod testdata;

pub use classifier::{
    classify_tiers, relative_cost, roofline_alpha, time_ratio_alpha, AlphaEstimator,
    ClassifierError, RooflineEstimator, TierAssignment, TimeRatioEstimator,
};
pub use models::*;
pub use observability::{ProfilerMetrics, StructuredLogger};
