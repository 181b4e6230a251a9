//! edge-bench integration tests

use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn edge_bench(args: &[&str], cwd: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_edge-bench"))
        .args(args)
        .current_dir(cwd)
        .env_remove("EDGE_BENCH_CONFIG")
        .env("RUST_LOG", "warn")
        .output()
        .expect("Failed to execute edge-bench")
}

/// Test that the CLI shows help
#[test]
fn test_help() {
    let dir = TempDir::new().unwrap();
    let output = edge_bench(&["--help"], dir.path());
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "help should succeed");
    for command in ["cpu", "memory", "network", "node", "measure", "oi", "generate-data", "payloads"] {
        assert!(stdout.contains(command), "Should show {} command", command);
    }
}

#[test]
fn test_measure_requires_runtime() {
    let dir = TempDir::new().unwrap();
    let output = edge_bench(&["measure"], dir.path());
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("--runtime"));
}

#[test]
fn test_generate_data() {
    let dir = TempDir::new().unwrap();
    let data = dir.path().join("data");
    let output = edge_bench(
        &["generate-data", "--dir", data.to_str().unwrap(), "--seed", "42"],
        dir.path(),
    );
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    for name in ["test_10kb.log", "test_10kb.json", "test_10kb.txt", "test_10kb.png", "git_repo/README.md"] {
        assert!(data.join(name).exists(), "{} missing", name);
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.matches("Created").count(), 5);
}

#[test]
fn test_payloads_table() {
    let dir = TempDir::new().unwrap();
    let output = edge_bench(&["payloads"], dir.path());
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("summarize_text"));
    assert!(stdout.contains("git_status"));
    assert!(stdout.contains("/49 payloads"));
}

#[test]
fn test_cpu_writes_node_document() {
    let dir = TempDir::new().unwrap();
    let results = dir.path().join("results");
    let metrics = dir.path().join("edge_bench.prom");
    let output = Command::new(env!("CARGO_BIN_EXE_edge-bench"))
        .args([
            "--hostname",
            "test-node",
            "--output-dir",
            results.to_str().unwrap(),
            "--metrics-file",
            metrics.to_str().unwrap(),
            "cpu",
        ])
        .current_dir(dir.path())
        .env("EDGE_BENCH_FLOPS_MATRIX_SIZE", "32")
        .env("EDGE_BENCH_FLOPS_ITERATIONS", "1")
        .output()
        .expect("Failed to execute edge-bench");
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let doc = std::fs::read_to_string(results.join("node_test-node.yaml")).unwrap();
    let node: serde_yaml::Value = serde_yaml::from_str(&doc).unwrap();
    assert_eq!(node["hostname"].as_str(), Some("test-node"));
    assert!(node["peak_compute_rate"].as_f64().unwrap() > 0.0);

    let prom = std::fs::read_to_string(&metrics).unwrap();
    assert!(prom.contains("edge_bench_node_peak_flops{hostname=\"test-node\"}"));
}

#[test]
fn test_measure_native_with_missing_servers_writes_empty_file() {
    let dir = TempDir::new().unwrap();
    let results = dir.path().join("results");
    let output = Command::new(env!("CARGO_BIN_EXE_edge-bench"))
        .args([
            "--hostname",
            "test-node",
            "--output-dir",
            results.to_str().unwrap(),
            "measure",
            "--runtime",
            "native",
            "--server",
            "log_parser",
            "--runs",
            "1",
        ])
        .current_dir(dir.path())
        .env("EDGE_BENCH_EDGEAGENT_ROOT", dir.path())
        .output()
        .expect("Failed to execute edge-bench");
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let text = std::fs::read_to_string(results.join("native_tool_exec_time_test-node.json")).unwrap();
    let records: Vec<serde_json::Value> = serde_json::from_str(&text).unwrap();
    assert!(records.is_empty());
}
