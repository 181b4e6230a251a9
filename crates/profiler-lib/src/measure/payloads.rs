//! Standard tool arguments
//!
//! Inline-data tools (summarize, log_parser, data_aggregate, thinking) get
//! roughly 10 KB of input so their alphas are comparable across nodes.
//! File-based tools (filesystem, git, image) get small path arguments and
//! process the 10 KB files written by [`crate::testdata`].

use crate::catalog;
use crate::testdata::{GIT_REPO_DIR, JSON_FILE, PNG_FILE, TEXT_FILE};
use serde::Serialize;
use serde_json::{json, Value};
use std::path::PathBuf;

/// Target serialized argument size
pub const STANDARD_INPUT_SIZE: usize = 10 * 1024;

const STANDARD_TEXT: &str = "Lorem ipsum dolor sit amet, consectetur adipiscing elit.
Sed do eiusmod tempor incididunt ut labore et dolore magna aliqua.
Ut enim ad minim veniam, quis nostrud exercitation ullamco laboris.
Nisi ut aliquip ex ea commodo consequat. Duis aute irure dolor in.
Reprehenderit in voluptate velit esse cillum dolore eu fugiat nulla.
Excepteur sint occaecat cupidatat non proident, sunt in culpa qui.
Officia deserunt mollit anim id est laborum consectetur adipiscing.";

const STANDARD_LOG_ENTRY: &str =
    "2024-01-01 12:00:00 ERROR [worker-1] service - Processing request failed with error code 500";

#[derive(Debug, Clone)]
pub struct PayloadConfig {
    /// Directory holding the generated test files
    pub data_dir: PathBuf,
}

impl Default for PayloadConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("/tmp"),
        }
    }
}

impl PayloadConfig {
    fn path(&self, name: &str) -> String {
        self.data_dir.join(name).to_string_lossy().into_owned()
    }

    fn dir(&self) -> String {
        self.data_dir.to_string_lossy().into_owned()
    }
}

/// Whole copies of `line` until the text reaches [`STANDARD_INPUT_SIZE`]
fn filled(line: &str) -> String {
    let mut out = String::with_capacity(STANDARD_INPUT_SIZE + line.len() + 1);
    while out.len() < STANDARD_INPUT_SIZE {
        out.push_str(line);
        out.push('\n');
    }
    out
}

fn text_10kb() -> String {
    filled(STANDARD_TEXT)
}

fn log_10kb() -> String {
    filled(STANDARD_LOG_ENTRY)
}

fn level(i: usize) -> &'static str {
    if i % 3 == 0 {
        "info"
    } else {
        "error"
    }
}

fn log_entries(count: usize) -> Value {
    (0..count)
        .map(|i| json!({"_level": level(i), "message": format!("msg {}", i)}))
        .collect()
}

fn list_items(count: usize) -> Value {
    (0..count)
        .map(|i| {
            let letter = ((b'A' + (i % 5) as u8) as char).to_string();
            json!({
                "id": i,
                "type": letter,
                "value": i * 10,
                "category": letter,
                "timestamp": format!("2024-01-{:02}", i % 30 + 1),
            })
        })
        .collect()
}

/// Standard arguments for `tool`, `None` for a tool outside the catalog
pub fn standard_payload(tool: &str, config: &PayloadConfig) -> Option<Value> {
    let repo = config.path(GIT_REPO_DIR);
    let text_file = config.path(TEXT_FILE);
    let png_file = config.path(PNG_FILE);

    let payload = match tool {
        // time
        "get_current_time" => json!({"timezone": "Asia/Seoul"}),
        "convert_time" => json!({
            "source_timezone": "Asia/Seoul",
            "time": "12:00",
            "target_timezone": "America/New_York",
        }),

        // sequentialthinking / fetch
        "sequentialthinking" => json!({
            "thought": text_10kb(),
            "nextThoughtNeeded": false,
            "thoughtNumber": 1,
            "totalThoughts": 1,
        }),
        "fetch" => json!({"url": "https://example.com"}),

        // summarize
        "summarize_text" => json!({"text": text_10kb(), "max_length": 100}),
        "summarize_documents" => json!({
            "documents": (0..20)
                .map(|i| json!({"title": format!("doc{}", i), "content": STANDARD_TEXT}))
                .collect::<Vec<_>>(),
        }),
        "get_provider_info" => json!({}),

        // log_parser
        "parse_logs" => json!({"log_content": log_10kb(), "format_type": "auto"}),
        "filter_entries" => json!({"entries": log_entries(240), "min_level": "warning"}),
        "compute_log_statistics" => json!({"entries": log_entries(240)}),
        "search_entries" => json!({"entries": log_entries(240), "pattern": "error"}),
        "extract_time_range" => json!({
            "entries": (0..130)
                .map(|i| json!({
                    "timestamp": format!("2024-01-{:02}T{:02}:00:00Z", i / 10 + 1, i % 24),
                    "_level": level(i),
                    "message": format!("msg {}", i),
                }))
                .collect::<Vec<_>>(),
        }),

        // data_aggregate
        "aggregate_list" => json!({"items": list_items(120), "group_by": "category"}),
        "merge_summaries" => json!({
            "summaries": (0..320)
                .map(|i| json!({"count": i * 100, "sum": i * 1000}))
                .collect::<Vec<_>>(),
        }),
        "combine_research_results" => json!({
            "results": (0..35)
                .map(|i| json!({
                    "source": format!("Database_{}", (b'A' + (i % 26) as u8) as char),
                    "data": &STANDARD_TEXT[..180],
                    "confidence": 0.95,
                    "timestamp": "2024-01-01T12:00:00Z",
                }))
                .collect::<Vec<_>>(),
        }),
        "deduplicate" => json!({
            "items": (0..145)
                .map(|i| json!({
                    "id": i % 75,
                    "name": format!("item_{}", i % 75),
                    "value": i * 10,
                    "metadata": "x".repeat(10),
                }))
                .collect::<Vec<_>>(),
            "key_fields": ["name"],
        }),
        "compute_trends" => json!({"time_series": list_items(120), "bucket_count": 10}),

        // image_resize
        "get_image_info" | "compute_image_hash" => json!({"image_path": png_file}),
        "resize_image" => json!({"image_path": png_file, "max_size": 800}),
        "scan_directory" => json!({"directory": config.dir()}),
        "compare_hashes" => json!({
            "hashes": (0..100)
                .map(|i| json!({
                    "hash": format!("hash_{:04}_{}", i, "a".repeat(50)),
                    "path": config.path(&format!("image_{}.png", i)),
                }))
                .collect::<Vec<_>>(),
        }),
        "batch_resize" => json!({"image_paths": vec![png_file; 5], "max_size": 800}),

        // filesystem
        "read_file" | "read_text_file" | "get_file_info" => json!({"path": text_file}),
        "read_media_file" => json!({"path": png_file}),
        "read_multiple_files" => json!({"paths": [text_file, config.path(JSON_FILE)]}),
        "write_file" => json!({"path": config.path("test_write.txt"), "content": text_10kb()}),
        "edit_file" => json!({
            "path": text_file,
            "edits": [{"oldText": "Lorem", "newText": "LOREM"}],
            "dryRun": true,
        }),
        "create_directory" => json!({"path": config.path("test_dir_new")}),
        "list_directory" | "list_directory_with_sizes" | "directory_tree" => {
            json!({"path": config.dir()})
        }
        "move_file" => json!({
            "source": config.path("test_move_src.txt"),
            "destination": config.path("test_move_dst.txt"),
        }),
        "search_files" => json!({"path": config.dir(), "pattern": "*.txt"}),
        "list_allowed_directories" => json!({}),

        // git
        "git_status" | "git_diff_unstaged" | "git_diff_staged" | "git_reset" => {
            json!({"repo_path": repo})
        }
        "git_diff" => json!({"repo_path": repo, "target": "HEAD~1"}),
        "git_commit" => json!({"repo_path": repo, "message": "test commit"}),
        "git_add" => json!({"repo_path": repo, "files": ["README.md"]}),
        "git_log" => json!({"repo_path": repo, "max_count": 10}),
        "git_create_branch" => json!({"repo_path": repo, "branch_name": "test-branch"}),
        "git_checkout" => json!({"repo_path": repo, "branch_name": "main"}),
        "git_show" => json!({"repo_path": repo, "revision": "HEAD"}),
        "git_branch" => json!({"repo_path": repo, "branch_type": "all"}),

        _ => return None,
    };
    Some(payload)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeStatus {
    Ok,
    TooSmall,
    TooLarge,
}

/// Serialized argument size of one tool against the 10 KB target
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PayloadSize {
    pub tool: String,
    pub server: String,
    pub bytes: usize,
    pub percent_of_target: f64,
    pub status: SizeStatus,
}

impl PayloadSize {
    fn new(tool: &str, server: &str, bytes: usize) -> Self {
        let target = STANDARD_INPUT_SIZE as f64;
        let size = bytes as f64;
        let status = if size > target * 1.5 {
            SizeStatus::TooLarge
        } else if size < target * 0.5 {
            SizeStatus::TooSmall
        } else {
            SizeStatus::Ok
        };
        Self {
            tool: tool.to_string(),
            server: server.to_string(),
            bytes,
            percent_of_target: size / target * 100.0,
            status,
        }
    }
}

/// Sizes of every catalog tool's payload, sorted by tool name.
/// File-based tools are expected to show up as too small.
pub fn payload_size_report(config: &PayloadConfig) -> Vec<PayloadSize> {
    let mut report: Vec<PayloadSize> = catalog::all_tools()
        .iter()
        .filter_map(|tool| {
            let payload = standard_payload(tool.name, config)?;
            let bytes = serde_json::to_vec(&payload).map(|v| v.len()).unwrap_or(0);
            Some(PayloadSize::new(tool.name, tool.server, bytes))
        })
        .collect();
    report.sort_by(|a, b| a.tool.cmp(&b.tool));
    report
}
