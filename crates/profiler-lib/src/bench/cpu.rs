//! CPU identification and peak FLOPS measurement

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info};

/// CPU facts read from `/proc/cpuinfo`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CpuInfo {
    pub model: Option<String>,
    pub cores: Option<u32>,
    pub freq_mhz: Option<f64>,
}

impl CpuInfo {
    /// Parse cpuinfo text. aarch64 kernels report the board in `Model`
    /// instead of `model name`.
    pub fn parse(cpuinfo: &str, machine: &str) -> Self {
        let mut model = None;
        let mut freq_mhz = None;

        for line in cpuinfo.lines() {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim();
            let value = value.trim();

            if model.is_none()
                && (key == "model name" || (key == "Model" && machine == "aarch64"))
                && !value.is_empty()
            {
                model = Some(value.to_string());
            }
            if freq_mhz.is_none() && key == "cpu MHz" {
                freq_mhz = value.parse::<f64>().ok().filter(|f| *f > 0.0);
            }
        }

        Self {
            model,
            cores: None,
            freq_mhz,
        }
    }

    /// Read the running machine's CPU info
    pub fn detect() -> Self {
        let text = std::fs::read_to_string("/proc/cpuinfo").unwrap_or_default();
        let mut info = Self::parse(&text, std::env::consts::ARCH);
        info.cores = std::thread::available_parallelism()
            .ok()
            .map(|n| n.get() as u32);
        info
    }
}

/// Result of a FLOPS run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlopsResult {
    /// Best single-iteration rate, FLOP/s
    pub best_flops: f64,
    /// Total FLOPs over total time
    pub average_flops: f64,
    pub iterations: u32,
}

/// Native DGEMM benchmark, `2 * n^3` FLOPs per multiply
#[derive(Debug, Clone)]
pub struct FlopsBenchmark {
    pub matrix_size: usize,
    pub iterations: u32,
    pub warmup: u32,
    pub seed: u64,
}

impl Default for FlopsBenchmark {
    fn default() -> Self {
        Self {
            matrix_size: 512,
            iterations: 5,
            warmup: 1,
            seed: 42,
        }
    }
}

impl FlopsBenchmark {
    /// Run the benchmark on the calling thread. CPU bound, so async
    /// callers should wrap it in `spawn_blocking`.
    pub fn run(&self) -> FlopsResult {
        let n = self.matrix_size.max(1);
        let mut rng = StdRng::seed_from_u64(self.seed);
        let a: Vec<f64> = (0..n * n).map(|_| rng.gen::<f64>()).collect();
        let b: Vec<f64> = (0..n * n).map(|_| rng.gen::<f64>()).collect();
        let mut c = vec![0.0f64; n * n];

        for _ in 0..self.warmup {
            dgemm(n, &a, &b, &mut c);
        }

        let flops_per_iter = 2.0 * (n as f64).powi(3);
        let iterations = self.iterations.max(1);
        let mut best = 0.0f64;
        let mut total_secs = 0.0f64;

        for i in 0..iterations {
            let start = Instant::now();
            dgemm(n, &a, &b, &mut c);
            let secs = start.elapsed().as_secs_f64().max(1e-9);
            total_secs += secs;
            best = best.max(flops_per_iter / secs);
            debug!(iteration = i, gflops = flops_per_iter / secs / 1e9, "DGEMM iteration");
        }

        let average = flops_per_iter * iterations as f64 / total_secs;
        // keep the product observable so the multiply is not optimized out
        debug!(checksum = c.iter().take(n).sum::<f64>(), "DGEMM done");
        info!(
            matrix_size = n,
            best_gflops = best / 1e9,
            average_gflops = average / 1e9,
            "FLOPS benchmark finished"
        );

        FlopsResult {
            best_flops: best,
            average_flops: average,
            iterations,
        }
    }
}

/// Row-major `c = a * b` with the i-k-j loop order for sequential access
fn dgemm(n: usize, a: &[f64], b: &[f64], c: &mut [f64]) {
    c.iter_mut().for_each(|x| *x = 0.0);
    for i in 0..n {
        let row = &mut c[i * n..(i + 1) * n];
        for k in 0..n {
            let aik = a[i * n + k];
            let b_row = &b[k * n..(k + 1) * n];
            for (cij, bkj) in row.iter_mut().zip(b_row) {
                *cij += aik * bkj;
            }
        }
    }
}
