//! Alpha estimation commands

use anyhow::{bail, Result};
use colored::Colorize;
use profiler_lib::catalog;
use profiler_lib::classifier::{AlphaEstimator, RooflineEstimator, TimeRatioEstimator};
use profiler_lib::models::{ProfileReport, Runtime};
use profiler_lib::observability::StructuredLogger;
use profiler_lib::store;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tabled::Tabled;
use tracing::warn;

use crate::output::{
    alpha_class_label, color_alpha, print_info, print_success, print_table, print_warning,
    OutputFormat,
};

/// Decimal places of alphas in written profiles
const REPORT_DECIMALS: i32 = 3;

/// Row for the per-tool alpha table
#[derive(Tabled, Serialize)]
struct ToolAlphaRow {
    #[tabled(rename = "Tool")]
    tool: String,
    #[tabled(rename = "Server")]
    server: String,
    #[tabled(rename = "Locality")]
    locality: String,
    #[tabled(rename = "Alpha")]
    alpha: String,
    #[tabled(rename = "Class")]
    class: String,
    #[tabled(rename = "Cost L/M/H")]
    cost: String,
}

fn rows(report: &ProfileReport) -> Vec<ToolAlphaRow> {
    report
        .tools
        .iter()
        .map(|(name, profile)| {
            let [low, mid, high] = profile.relative_cost_by_tier;
            ToolAlphaRow {
                tool: name.clone(),
                server: catalog::find_tool(name)
                    .map(|t| t.server.to_string())
                    .unwrap_or_default(),
                locality: profile.data_locality.to_string(),
                alpha: color_alpha(profile.alpha),
                class: alpha_class_label(profile.alpha).to_string(),
                cost: format!("{:.2}/{:.2}/{:.2}", low, mid, high),
            }
        })
        .collect()
}

fn print_report(report: &ProfileReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(report)?);
        }
        OutputFormat::Table => {
            print_table(&rows(report), format);
            let dist = &report.metadata.distribution;
            println!(
                "{} {}  {} {}  {} {}",
                "compute-bound:".bold(),
                dist.compute_bound,
                "mixed:".bold(),
                dist.mixed,
                "communication-bound:".bold(),
                dist.communication_bound
            );
            if !report.metadata.skipped_tools.is_empty() {
                print_warning(&format!(
                    "{} tools without measurements: {}",
                    report.metadata.skipped_tools.len(),
                    report.metadata.skipped_tools.join(", ")
                ));
            }
        }
    }
    Ok(())
}

fn write(report: &ProfileReport, path: &Path, logger: &StructuredLogger) -> Result<()> {
    logger.log_alpha_computed(report);
    store::write_report(path, &report.rounded(REPORT_DECIMALS))?;
    logger.log_report_written(path, report.model, report.tools.len());
    Ok(())
}

/// Roofline alphas from node documents and the OI file
pub fn roofline(
    data_dir: &Path,
    oi_file: Option<PathBuf>,
    output: Option<PathBuf>,
    format: OutputFormat,
    logger: &StructuredLogger,
) -> Result<()> {
    let nodes = store::load_nodes(data_dir)?;
    let oi_path = oi_file.unwrap_or_else(|| data_dir.join(store::OI_FILE_NAME));
    let intensities = if oi_path.exists() {
        store::load_operational_intensity(&oi_path)?
    } else {
        warn!(path = %oi_path.display(), "No OI measurements, every tool uses the default OI");
        Vec::new()
    };

    let estimator = RooflineEstimator::new(intensities);
    let report = estimator.estimate(&nodes)?;

    let output = output.unwrap_or_else(|| data_dir.join("tool_profiles.yaml"));
    write(&report, &output, logger)?;

    let unmeasured = report
        .tools
        .values()
        .filter(|p| p.oi_measured == Some(false))
        .count();
    print_report(&report, format)?;
    if format == OutputFormat::Table {
        if unmeasured > 0 {
            print_info(&format!("{} tools use the default OI", unmeasured));
        }
        print_success(&format!("Wrote {}", output.display()));
    }
    Ok(())
}

/// Runtimes selected on the command line
pub fn runtimes(selection: Option<Runtime>) -> Vec<Runtime> {
    match selection {
        Some(runtime) => vec![runtime],
        None => Runtime::ALL.to_vec(),
    }
}

/// Time-ratio alphas, one `profile_<runtime>.yaml` per runtime
pub fn time_ratio(
    data_dir: &Path,
    selection: Option<Runtime>,
    output_dir: Option<PathBuf>,
    format: OutputFormat,
    logger: &StructuredLogger,
) -> Result<()> {
    let nodes = store::load_nodes(data_dir)?;
    let output_dir = output_dir.unwrap_or_else(|| data_dir.to_path_buf());

    let mut written = 0;
    for runtime in runtimes(selection) {
        let measurements = store::load_measurements(data_dir, runtime)?;
        if measurements.is_empty() {
            if selection.is_some() {
                bail!("No {} measurements in {}", runtime, data_dir.display());
            }
            warn!(runtime = %runtime, "No measurements, skipping runtime");
            continue;
        }

        let estimator = TimeRatioEstimator::new(runtime, measurements.into_values().flatten());
        let report = estimator.estimate(&nodes)?;
        let path = output_dir.join(format!("profile_{}.yaml", runtime));
        write(&report, &path, logger)?;

        if format == OutputFormat::Table {
            println!("{}", format!("[{}]", runtime).bold());
        }
        print_report(&report, format)?;
        if format == OutputFormat::Table {
            print_success(&format!("Wrote {}", path.display()));
        }
        written += 1;
    }

    if written == 0 {
        bail!("No measurement files found in {}", data_dir.display());
    }
    Ok(())
}

/// Print a previously written profile
pub fn show(path: &Path, format: OutputFormat) -> Result<()> {
    let report = store::read_report(path)?;
    print_report(&report, format)
}
