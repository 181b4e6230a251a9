//! Memory bandwidth measurement
//!
//! `sysbench memory` is preferred; a STREAM-style native kernel set is the
//! fallback when sysbench is not installed.

use super::process::{run_command, CommandSpec, ProcessError};
use regex::Regex;
use std::sync::OnceLock;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const MIB: f64 = 1024.0 * 1024.0;

fn sysbench_rate_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\((\d+\.?\d*)\s+MiB/sec\)").expect("Invalid sysbench regex"))
}

/// Bandwidth in bytes/s from `sysbench memory` output such as
/// `10240.00 MiB transferred (37472.03 MiB/sec)`
pub fn parse_sysbench_memory(stdout: &str) -> Option<f64> {
    let caps = sysbench_rate_regex().captures(stdout)?;
    let mib_per_sec: f64 = caps.get(1)?.as_str().parse().ok()?;
    Some(mib_per_sec * MIB)
}

/// `sysbench memory --memory-block-size=1M --memory-total-size=<size> run`
#[derive(Debug, Clone)]
pub struct SysbenchMemory {
    pub total_size: String,
    pub timeout: Duration,
}

impl Default for SysbenchMemory {
    fn default() -> Self {
        Self {
            total_size: "10G".to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

impl SysbenchMemory {
    pub fn command(&self) -> CommandSpec {
        CommandSpec::new("sysbench")
            .args([
                "memory".to_string(),
                "--memory-block-size=1M".to_string(),
                format!("--memory-total-size={}", self.total_size),
                "run".to_string(),
            ])
            .timeout(self.timeout)
    }

    /// Measured bandwidth in bytes/s, `None` when sysbench fails or its
    /// output cannot be parsed
    pub async fn run(&self) -> Result<Option<f64>, ProcessError> {
        let outcome = run_command(&self.command()).await?;
        if !outcome.success() {
            warn!(stderr = %outcome.stderr_text().trim(), "sysbench memory failed");
            return Ok(None);
        }
        let bandwidth = parse_sysbench_memory(&outcome.stdout_text());
        match bandwidth {
            Some(bw) => info!(gib_per_sec = bw / MIB / 1024.0, "sysbench memory bandwidth"),
            None => warn!("Could not parse sysbench output"),
        }
        Ok(bandwidth)
    }
}

/// Best bandwidth of each STREAM kernel, bytes/s
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamResult {
    pub copy: f64,
    pub scale: f64,
    pub add: f64,
    pub triad: f64,
}

impl StreamResult {
    /// Triad is the figure the roofline model uses
    pub fn bandwidth(&self) -> f64 {
        self.triad
    }
}

/// Native STREAM benchmark (Copy, Scale, Add, Triad)
#[derive(Debug, Clone)]
pub struct StreamBenchmark {
    pub array_len: usize,
    pub iterations: u32,
}

impl Default for StreamBenchmark {
    fn default() -> Self {
        Self {
            array_len: 20_000_000,
            iterations: 10,
        }
    }
}

impl StreamBenchmark {
    /// CPU and memory bound; run on a blocking thread
    pub fn run(&self) -> StreamResult {
        let n = self.array_len.max(1);
        let scalar = 3.0f64;
        let mut a = vec![1.0f64; n];
        let mut b = vec![2.0f64; n];
        let mut c = vec![0.0f64; n];

        let word = std::mem::size_of::<f64>() as f64;
        let two_arrays = 2.0 * word * n as f64;
        let three_arrays = 3.0 * word * n as f64;

        let mut best = [f64::MAX; 4];
        for _ in 0..self.iterations.max(1) {
            let t = Instant::now();
            c.copy_from_slice(&a);
            best[0] = best[0].min(t.elapsed().as_secs_f64());

            let t = Instant::now();
            for (bi, ci) in b.iter_mut().zip(&c) {
                *bi = scalar * ci;
            }
            best[1] = best[1].min(t.elapsed().as_secs_f64());

            let t = Instant::now();
            for ((ci, ai), bi) in c.iter_mut().zip(&a).zip(&b) {
                *ci = ai + bi;
            }
            best[2] = best[2].min(t.elapsed().as_secs_f64());

            let t = Instant::now();
            for ((ai, bi), ci) in a.iter_mut().zip(&b).zip(&c) {
                *ai = bi + scalar * ci;
            }
            best[3] = best[3].min(t.elapsed().as_secs_f64());
        }
        debug!(checksum = a[n - 1] + b[n - 1] + c[n - 1], "STREAM done");

        let rate = |bytes: f64, secs: f64| bytes / secs.max(1e-9);
        let result = StreamResult {
            copy: rate(two_arrays, best[0]),
            scale: rate(two_arrays, best[1]),
            add: rate(three_arrays, best[2]),
            triad: rate(three_arrays, best[3]),
        };
        info!(
            copy_mib_s = result.copy / MIB,
            triad_mib_s = result.triad / MIB,
            "STREAM benchmark finished"
        );
        result
    }
}
