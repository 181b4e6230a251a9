//! On-disk record store
//!
//! Layout of a results directory:
//! - `node_<hostname>.yaml`: one [`NodeProfile`] per machine
//! - `<runtime>_tool_exec_time_<hostname>.json`: array of [`ToolMeasurement`]
//! - `tool_oi_measurements.json`: array of [`OperationalIntensity`]
//!
//! Loaders skip records that fail validation with a warning so one bad
//! document does not sink a profiling run.

use crate::models::{NodeProfile, OperationalIntensity, ProfileReport, Runtime, ToolMeasurement};
use anyhow::{bail, Context, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Default OI file name inside a results directory
pub const OI_FILE_NAME: &str = "tool_oi_measurements.json";

pub fn node_file_name(hostname: &str) -> String {
    format!("node_{}.yaml", hostname)
}

pub fn measurement_file_name(runtime: Runtime, hostname: &str) -> String {
    format!("{}_tool_exec_time_{}.json", runtime, hostname)
}

/// Files in `dir` whose name matches a glob pattern, sorted by file name.
///
/// Only the file name is matched, so `dir` may contain glob metacharacters.
/// A missing directory has no matches.
fn matching_files(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let matcher = glob::Pattern::new(pattern)
        .with_context(|| format!("Invalid glob pattern {}", pattern))?;
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e).with_context(|| format!("Failed to list {}", dir.display())),
    };
    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry.path()),
            Err(e) => {
                warn!(error = %e, "Unreadable directory entry skipped");
                None
            }
        })
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| matcher.matches(name))
        })
        .collect();
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(paths)
}

/// Read one node document
pub fn load_node(path: &Path) -> Result<NodeProfile> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let node: NodeProfile = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    if let Err(reason) = node.validate() {
        bail!("Invalid node record in {}: {}", path.display(), reason);
    }
    Ok(node)
}

/// Every valid node document in `dir`, in file-name order.
///
/// A hostname seen twice keeps the later document in the earlier slot.
pub fn load_nodes(dir: &Path) -> Result<Vec<NodeProfile>> {
    let mut nodes: Vec<NodeProfile> = Vec::new();
    for path in matching_files(dir, "node_*.yaml")? {
        let node = match load_node(&path) {
            Ok(node) => node,
            Err(e) => {
                warn!(path = %path.display(), error = %format!("{:#}", e), "Skipping node document");
                continue;
            }
        };
        if let Some(existing) = nodes.iter_mut().find(|n| n.hostname == node.hostname) {
            warn!(hostname = %node.hostname, path = %path.display(), "Duplicate node record replaces earlier one");
            *existing = node;
        } else {
            debug!(hostname = %node.hostname, path = %path.display(), "Loaded node record");
            nodes.push(node);
        }
    }
    info!(dir = %dir.display(), count = nodes.len(), "Node records loaded");
    Ok(nodes)
}

/// Write `node_<hostname>.yaml`, creating `dir` if needed
pub fn save_node(dir: &Path, node: &NodeProfile) -> Result<PathBuf> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    let path = dir.join(node_file_name(&node.hostname));
    let content = serde_yaml::to_string(node).context("Failed to serialize node record")?;
    fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    debug!(path = %path.display(), "Node record saved");
    Ok(path)
}

/// Load the node document for `hostname`, or a fresh record if none exists
pub fn load_or_new_node(dir: &Path, hostname: &str) -> Result<NodeProfile> {
    let path = dir.join(node_file_name(hostname));
    if path.exists() {
        load_node(&path)
    } else {
        Ok(NodeProfile::new(hostname))
    }
}

/// Measurements of one runtime in `dir`, grouped by node hostname
pub fn load_measurements(
    dir: &Path,
    runtime: Runtime,
) -> Result<BTreeMap<String, Vec<ToolMeasurement>>> {
    let pattern = format!("{}_tool_exec_time_*.json", runtime);
    let mut grouped: BTreeMap<String, Vec<ToolMeasurement>> = BTreeMap::new();

    for path in matching_files(dir, &pattern)? {
        let records = match read_measurement_file(&path) {
            Ok(records) => records,
            Err(e) => {
                warn!(path = %path.display(), error = %format!("{:#}", e), "Skipping measurement file");
                continue;
            }
        };
        for record in records {
            if let Err(reason) = record.validate() {
                warn!(path = %path.display(), tool = %record.tool_name, reason = %reason, "Skipping invalid measurement");
                continue;
            }
            grouped
                .entry(record.node_hostname.clone())
                .or_default()
                .push(record);
        }
    }

    info!(
        dir = %dir.display(),
        runtime = %runtime,
        nodes = grouped.len(),
        "Measurements loaded"
    );
    Ok(grouped)
}

fn read_measurement_file(path: &Path) -> Result<Vec<ToolMeasurement>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Write `<runtime>_tool_exec_time_<hostname>.json`
pub fn save_measurements(
    dir: &Path,
    runtime: Runtime,
    hostname: &str,
    measurements: &[ToolMeasurement],
) -> Result<PathBuf> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    let path = dir.join(measurement_file_name(runtime, hostname));
    let content =
        serde_json::to_string_pretty(measurements).context("Failed to serialize measurements")?;
    fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

/// Read an OI file. Entries with a non-finite or negative OI are dropped.
pub fn load_operational_intensity(path: &Path) -> Result<Vec<OperationalIntensity>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let records: Vec<OperationalIntensity> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    Ok(records
        .into_iter()
        .filter(|r| {
            let ok = r.operational_intensity.is_finite() && r.operational_intensity >= 0.0;
            if !ok {
                warn!(tool = %r.tool_name, value = r.operational_intensity, "Skipping invalid OI entry");
            }
            ok
        })
        .collect())
}

pub fn save_operational_intensity(path: &Path, records: &[OperationalIntensity]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let content = serde_json::to_string_pretty(records).context("Failed to serialize OI records")?;
    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
}

/// Write a report as YAML (`.yaml`/`.yml`) or JSON (anything else)
pub fn write_report(path: &Path, report: &ProfileReport) -> Result<()> {
    let content = match path.extension().and_then(|e| e.to_str()) {
        Some("yaml") | Some("yml") => {
            serde_yaml::to_string(report).context("Failed to serialize report")?
        }
        _ => serde_json::to_string_pretty(report).context("Failed to serialize report")?,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    info!(path = %path.display(), tools = report.tools.len(), "Report written");
    Ok(())
}

/// Read a report written by [`write_report`]
pub fn read_report(path: &Path) -> Result<ProfileReport> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    match path.extension().and_then(|e| e.to_str()) {
        Some("yaml") | Some("yml") => serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display())),
        _ => serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{AlphaEstimator, RooflineEstimator};
    use tempfile::TempDir;

    fn node(host: &str, rate: f64) -> NodeProfile {
        NodeProfile {
            peak_compute_rate: Some(rate),
            memory_bandwidth: Some(1e9),
            ..NodeProfile::new(host)
        }
    }

    #[test]
    fn test_nodes_roundtrip_in_file_name_order() {
        let dir = TempDir::new().unwrap();
        save_node(dir.path(), &node("zeta", 1.0)).unwrap();
        save_node(dir.path(), &node("alpha", 2.0)).unwrap();

        let nodes = load_nodes(dir.path()).unwrap();
        let hosts: Vec<_> = nodes.iter().map(|n| n.hostname.as_str()).collect();
        assert_eq!(hosts, vec!["alpha", "zeta"]);
        assert_eq!(nodes[1].peak_compute_rate, Some(1.0));
    }

    #[test]
    fn test_data_dir_with_glob_characters() {
        let root = TempDir::new().unwrap();
        let dir = root.path().join("run[1]*?");
        fs::create_dir(&dir).unwrap();
        save_node(&dir, &node("edge-1", 1.0)).unwrap();
        save_measurements(
            &dir,
            Runtime::Native,
            "edge-1",
            &[ToolMeasurement::from_samples("git_status", "git", "edge-1", Runtime::Native, 10, 20, vec![0.1])
                .unwrap()],
        )
        .unwrap();

        let nodes = load_nodes(&dir).unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].hostname, "edge-1");
        let measurements = load_measurements(&dir, Runtime::Native).unwrap();
        assert_eq!(measurements["edge-1"].len(), 1);
    }

    #[test]
    fn test_missing_dir_has_no_documents() {
        let root = TempDir::new().unwrap();
        assert!(load_nodes(&root.path().join("absent")).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_node_documents_skipped() {
        let dir = TempDir::new().unwrap();
        save_node(dir.path(), &node("good", 1.0)).unwrap();
        fs::write(dir.path().join("node_broken.yaml"), "hostname: [unterminated").unwrap();
        fs::write(
            dir.path().join("node_negative.yaml"),
            "hostname: negative\nmemory_bandwidth: -4.0\n",
        )
        .unwrap();
        fs::write(dir.path().join("unrelated.yaml"), "hostname: other\n").unwrap();

        let nodes = load_nodes(dir.path()).unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].hostname, "good");
    }

    #[test]
    fn test_duplicate_hostname_replaced() {
        let dir = TempDir::new().unwrap();
        save_node(dir.path(), &node("edge", 1.0)).unwrap();
        fs::write(
            dir.path().join("node_edge_copy.yaml"),
            "hostname: edge\npeak_compute_rate: 9.0\n",
        )
        .unwrap();
        let nodes = load_nodes(dir.path()).unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].peak_compute_rate, Some(9.0));
    }

    #[test]
    fn test_load_or_new_node() {
        let dir = TempDir::new().unwrap();
        let fresh = load_or_new_node(dir.path(), "pi").unwrap();
        assert_eq!(fresh, NodeProfile::new("pi"));

        save_node(dir.path(), &node("pi", 3.0)).unwrap();
        let loaded = load_or_new_node(dir.path(), "pi").unwrap();
        assert_eq!(loaded.peak_compute_rate, Some(3.0));
    }

    #[test]
    fn test_measurements_grouped_by_host() {
        let dir = TempDir::new().unwrap();
        let m = |tool: &str, host: &str| {
            ToolMeasurement::from_samples(tool, "git", host, Runtime::Wasm, 10, 20, vec![0.1])
                .unwrap()
        };
        save_measurements(dir.path(), Runtime::Wasm, "a", &[m("git_log", "a"), m("git_status", "a")])
            .unwrap();
        save_measurements(dir.path(), Runtime::Wasm, "b", &[m("git_log", "b")]).unwrap();
        save_measurements(dir.path(), Runtime::Native, "c", &[m("git_log", "c")]).unwrap();

        let grouped = load_measurements(dir.path(), Runtime::Wasm).unwrap();
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped["a"].len(), 2);
        assert!(dir.path().join("wasm_tool_exec_time_a.json").exists());
    }

    #[test]
    fn test_invalid_measurements_skipped() {
        let dir = TempDir::new().unwrap();
        let body = r#"[
            {"tool_name": "git_log", "node_hostname": "a", "runtime": "native",
             "execution_time": 0.2, "input_size": 1, "output_size": 2,
             "run_count": 1, "raw_samples": [0.2]},
            {"tool_name": "git_diff", "node_hostname": "a", "runtime": "native",
             "execution_time": -1.0, "input_size": 1, "output_size": 2,
             "run_count": 1, "raw_samples": [-1.0]}
        ]"#;
        fs::write(dir.path().join("native_tool_exec_time_a.json"), body).unwrap();
        fs::write(dir.path().join("native_tool_exec_time_b.json"), "not json").unwrap();

        let grouped = load_measurements(dir.path(), Runtime::Native).unwrap();
        assert_eq!(grouped.len(), 1);
        assert_eq!(grouped["a"].len(), 1);
        assert_eq!(grouped["a"][0].server, "");
    }

    #[test]
    fn test_oi_file_filters_bad_entries() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(OI_FILE_NAME);
        fs::write(
            &path,
            r#"[{"tool_name": "resize_image", "operational_intensity": 4.2, "runs": 3},
                {"tool_name": "fetch", "operational_intensity": -1.0}]"#,
        )
        .unwrap();
        let records = load_operational_intensity(&path).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].runs, Some(3));

        save_operational_intensity(&path, &records).unwrap();
        assert_eq!(load_operational_intensity(&path).unwrap(), records);
    }

    #[test]
    fn test_report_format_follows_extension() {
        let dir = TempDir::new().unwrap();
        let report = RooflineEstimator::new(vec![])
            .estimate(&[node("n", 1e9)])
            .unwrap();

        let yaml = dir.path().join("out/profile.yaml");
        let json = dir.path().join("profile.json");
        write_report(&yaml, &report).unwrap();
        write_report(&json, &report).unwrap();

        assert!(fs::read_to_string(&yaml).unwrap().starts_with("model: roofline"));
        assert!(fs::read_to_string(&json).unwrap().trim_start().starts_with('{'));
        assert_eq!(read_report(&json).unwrap(), report);
        assert_eq!(read_report(&yaml).unwrap().tools.len(), report.tools.len());
    }
}
