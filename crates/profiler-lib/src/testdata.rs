//! Synthetic 10 KB inputs for the file-based tools
//!
//! Generation is deterministic for a given seed and never overwrites a
//! file that already exists.

use crate::bench::process::{run_command, CommandSpec};
use anyhow::{Context, Result};
use chrono::{Duration as ChronoDuration, NaiveDate, NaiveDateTime};
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ColorType, ImageEncoder};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

pub const LOG_FILE: &str = "test_10kb.log";
pub const JSON_FILE: &str = "test_10kb.json";
pub const TEXT_FILE: &str = "test_10kb.txt";
pub const PNG_FILE: &str = "test_10kb.png";
pub const GIT_REPO_DIR: &str = "git_repo";

const TARGET_BYTES: usize = 10 * 1024;
const IMAGE_SIDE: u32 = 60;
const JSON_ITEMS: usize = 80;

const LEVELS: [&str; 4] = ["DEBUG", "INFO", "WARNING", "ERROR"];
const CATEGORIES: [&str; 5] = ["A", "B", "C", "D", "E"];

const README: &str = "# Test Repository\n\nThis is a test git repository for MCP git tools.\n";

/// What happened to one output file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    Created,
    Existing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    pub path: PathBuf,
    pub status: FileStatus,
}

fn start_time() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 12, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

/// Write `path` with `write` unless it already exists
fn generate_file<F>(path: PathBuf, write: F) -> Result<GeneratedFile>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<()>,
{
    if path.exists() {
        info!(path = %path.display(), "Test file already exists");
        return Ok(GeneratedFile {
            path,
            status: FileStatus::Existing,
        });
    }
    let file = File::create(&path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    write(&mut writer)?;
    writer
        .flush()
        .with_context(|| format!("Failed to write {}", path.display()))?;

    let size = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
    info!(path = %path.display(), size_kb = size as f64 / 1024.0, "Generated test file");
    Ok(GeneratedFile {
        path,
        status: FileStatus::Created,
    })
}

fn write_log(out: &mut impl Write, rng: &mut StdRng) -> Result<()> {
    let mut written = 0;
    let mut request_id = 1000u32;
    let mut ts = start_time();
    while written < TARGET_BYTES {
        let level = LEVELS[rng.gen_range(0..LEVELS.len())];
        let worker = rng.gen_range(1..10);
        let line = format!(
            "{} {} [worker-{}] service - Processing request {}\n",
            ts.format("%Y-%m-%d %H:%M:%S"),
            level,
            worker,
            request_id
        );
        out.write_all(line.as_bytes())?;
        written += line.len();
        request_id += 1;
        ts += ChronoDuration::seconds(rng.gen_range(1..=5));
    }
    Ok(())
}

fn write_json(out: &mut impl Write, rng: &mut StdRng) -> Result<()> {
    let base = start_time();
    let items: Vec<_> = (0..JSON_ITEMS)
        .map(|i| {
            let ts = base + ChronoDuration::hours(i as i64);
            json!({
                "id": i,
                "timestamp": ts.format("%Y-%m-%dT%H:%M:%S").to_string(),
                "value": rng.gen_range(100..=1000),
                "category": CATEGORIES[rng.gen_range(0..CATEGORIES.len())],
                // repeats after 60 so dedup has work to do
                "name": format!("item_{}", i % 60),
            })
        })
        .collect();
    serde_json::to_writer_pretty(out, &items).context("Failed to serialize JSON test data")
}

fn write_text(out: &mut impl Write) -> Result<()> {
    let line = "Lorem ipsum dolor sit amet, consectetur adipiscing elit. ".repeat(10);
    let mut written = 0;
    while written < TARGET_BYTES {
        out.write_all(line.as_bytes())?;
        out.write_all(b"\n")?;
        written += line.len() + 1;
    }
    Ok(())
}

fn write_png(out: &mut impl Write, rng: &mut StdRng) -> Result<()> {
    let mut pixels = vec![0u8; (IMAGE_SIDE * IMAGE_SIDE * 3) as usize];
    rng.fill(pixels.as_mut_slice());
    PngEncoder::new_with_quality(out, CompressionType::Fast, FilterType::NoFilter)
        .write_image(&pixels, IMAGE_SIDE, IMAGE_SIDE, ColorType::Rgb8)
        .context("Failed to encode PNG test data")
}

/// Generate every test input under `dir`
pub fn generate_all(dir: &Path, seed: u64) -> Result<Vec<GeneratedFile>> {
    std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    let mut rng = StdRng::seed_from_u64(seed);

    let mut files = vec![
        generate_file(dir.join(PNG_FILE), |w| write_png(w, &mut rng))?,
        generate_file(dir.join(LOG_FILE), |w| write_log(w, &mut rng))?,
        generate_file(dir.join(JSON_FILE), |w| write_json(w, &mut rng))?,
        generate_file(dir.join(TEXT_FILE), |w| write_text(w))?,
    ];

    let repo = dir.join(GIT_REPO_DIR);
    std::fs::create_dir_all(&repo).with_context(|| format!("Failed to create {}", repo.display()))?;
    files.push(generate_file(repo.join("README.md"), |w| {
        w.write_all(README.as_bytes())?;
        Ok(())
    })?);

    Ok(files)
}

/// `git init`, add and commit inside the test repository. Returns false
/// when the repository already has a `.git` directory.
pub async fn init_git_repo(repo: &Path) -> Result<bool> {
    if repo.join(".git").exists() {
        return Ok(false);
    }
    let steps: [&[&str]; 3] = [
        &["init", "-q", "-b", "main"],
        &["add", "."],
        &[
            "-c",
            "user.name=edge-bench",
            "-c",
            "user.email=edge-bench@localhost",
            "commit",
            "-q",
            "-m",
            "Initial commit",
        ],
    ];
    for args in steps {
        let spec = CommandSpec::new("git")
            .args(args.iter().copied())
            .current_dir(repo)
            .timeout(Duration::from_secs(30));
        let outcome = run_command(&spec)
            .await
            .with_context(|| format!("git {} failed", args.join(" ")))?;
        if !outcome.success() {
            warn!(stderr = %outcome.stderr_text().trim(), "git {} failed", args.join(" "));
            anyhow::bail!("git {} exited with {}", args.join(" "), outcome.status);
        }
    }
    info!(repo = %repo.display(), "Initialized test git repository");
    Ok(true)
}
