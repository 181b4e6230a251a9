//! Operational intensity from hardware counters
//!
//! `OI = instructions / (cache_misses * 64)`: instructions stand in for
//! FLOPs, each last-level cache miss for one cache line of DRAM traffic.

use super::runner::{RunnerError, ServerCommands};
use crate::bench::process::{run_command, CommandSpec, ProcessError};
use crate::catalog::ToolDefinition;
use crate::models::OperationalIntensity;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const CACHE_LINE_SIZE: u64 = 64;

const PARANOID_PATH: &str = "/proc/sys/kernel/perf_event_paranoid";

/// Counter totals from one `perf stat` run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PerfCounters {
    pub instructions: u64,
    pub cache_misses: u64,
}

impl PerfCounters {
    /// `None` when no misses were counted
    pub fn operational_intensity(&self) -> Option<f64> {
        if self.cache_misses == 0 {
            return None;
        }
        Some(self.instructions as f64 / (self.cache_misses * CACHE_LINE_SIZE) as f64)
    }
}

fn event_matches(event: &str, name: &str) -> bool {
    // "instructions", "instructions:u", "cpu_core/instructions/"
    event == name
        || event.starts_with(&format!("{}:", name))
        || event.contains(&format!("/{}/", name))
}

/// Parse `perf stat -x,` output. Hybrid CPUs report one line per core
/// type; those are summed. `<not counted>` lines are ignored.
pub fn parse_perf_stat(stderr: &str) -> Option<PerfCounters> {
    let mut instructions = None::<u64>;
    let mut cache_misses = None::<u64>;

    for line in stderr.lines() {
        let fields: Vec<&str> = line.split(',').collect();
        if fields.len() < 3 {
            continue;
        }
        let Ok(value) = fields[0].trim().parse::<u64>() else {
            continue;
        };
        let event = fields[2].trim();
        if event_matches(event, "instructions") {
            *instructions.get_or_insert(0) += value;
        } else if event_matches(event, "cache-misses") {
            *cache_misses.get_or_insert(0) += value;
        }
    }

    Some(PerfCounters {
        instructions: instructions?,
        cache_misses: cache_misses?,
    })
}

/// Current `kernel.perf_event_paranoid`, if readable
pub fn perf_event_paranoid() -> Option<i32> {
    std::fs::read_to_string(PARANOID_PATH)
        .ok()
        .and_then(|s| s.trim().parse().ok())
}

/// Runs native tool invocations under `perf stat`
#[derive(Debug, Clone)]
pub struct OiProbe {
    pub commands: ServerCommands,
    pub perf: String,
    pub runs: u32,
    pub timeout: Duration,
    /// Working directory of the measured process
    pub working_dir: Option<PathBuf>,
}

impl OiProbe {
    pub fn new(commands: ServerCommands, runs: u32, timeout: Duration) -> Self {
        Self {
            commands,
            perf: "perf".to_string(),
            runs,
            timeout,
            working_dir: None,
        }
    }

    /// `perf stat -e instructions,cache-misses -x, -- <server argv>`
    pub fn command(&self, server: &str) -> Result<CommandSpec, RunnerError> {
        let argv = self.commands.argv(server)?;
        let mut spec = CommandSpec::new(self.perf.clone())
            .args([
                "stat",
                "-e",
                "instructions,cache-misses",
                "-x,",
                "--",
            ])
            .args(argv)
            .timeout(self.timeout);
        if let Some(dir) = &self.working_dir {
            spec = spec.current_dir(dir.clone());
        }
        Ok(spec)
    }

    /// Perf must be installed and the paranoid level low enough to count
    /// user-space events of child processes
    pub async fn available(&self) -> bool {
        let spec = CommandSpec::new(self.perf.clone())
            .arg("--version")
            .timeout(Duration::from_secs(5));
        match run_command(&spec).await {
            Ok(outcome) if outcome.success() => {
                if let Some(level) = perf_event_paranoid() {
                    if level > 2 {
                        warn!(level, "perf_event_paranoid is too high, run: sudo sysctl -w kernel.perf_event_paranoid=-1");
                        return false;
                    }
                }
                true
            }
            Ok(_) | Err(ProcessError::NotFound(_)) => false,
            Err(e) => {
                warn!(error = %e, "perf check failed");
                false
            }
        }
    }

    /// Mean OI over the successful runs, `None` if no run produced counters
    pub async fn measure(&self, tool: &ToolDefinition, request: &[u8]) -> Option<OperationalIntensity> {
        let spec = match self.command(tool.server) {
            Ok(spec) => spec.stdin(request.to_vec()),
            Err(e) => {
                warn!(tool = tool.name, error = %e, "Cannot launch server under perf");
                return None;
            }
        };

        let mut samples: Vec<PerfCounters> = Vec::new();
        for run in 0..self.runs {
            let counters = match run_command(&spec).await {
                Ok(outcome) => parse_perf_stat(&outcome.stderr_text()),
                Err(e) => {
                    warn!(tool = tool.name, run, error = %e, "perf run failed");
                    None
                }
            };
            match counters {
                Some(c) if c.operational_intensity().is_some() => samples.push(c),
                _ => debug!(tool = tool.name, run, "No usable counters"),
            }
        }

        if samples.is_empty() {
            warn!(tool = tool.name, "No OI measurement");
            return None;
        }

        let n = samples.len() as f64;
        let oi = samples
            .iter()
            .filter_map(PerfCounters::operational_intensity)
            .sum::<f64>()
            / n;
        let instructions = samples.iter().map(|c| c.instructions).sum::<u64>() / samples.len() as u64;
        let cache_misses = samples.iter().map(|c| c.cache_misses).sum::<u64>() / samples.len() as u64;

        info!(tool = tool.name, oi, runs = samples.len(), "Operational intensity measured");
        Some(OperationalIntensity {
            tool_name: tool.name.to_string(),
            server: Some(tool.server.to_string()),
            operational_intensity: oi,
            runs: Some(samples.len() as u32),
            instructions: Some(instructions),
            cache_misses: Some(cache_misses),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::find_tool;

    const PERF_CSV: &str = "\
1200000,,instructions:u,812345,100.00,,
5000,,cache-misses:u,812345,100.00,,
";

    #[test]
    fn test_parse_csv() {
        let c = parse_perf_stat(PERF_CSV).unwrap();
        assert_eq!(c.instructions, 1_200_000);
        assert_eq!(c.cache_misses, 5_000);
        let oi = c.operational_intensity().unwrap();
        assert!((oi - 1_200_000.0 / 320_000.0).abs() < 1e-12);
    }

    #[test]
    fn test_parse_hybrid_cpu_sums_core_types() {
        let out = "\
1000,,cpu_core/instructions/,100,100.00,,
500,,cpu_atom/instructions/,100,100.00,,
10,,cpu_core/cache-misses/,100,100.00,,
<not counted>,,cpu_atom/cache-misses/,0,0.00,,
";
        let c = parse_perf_stat(out).unwrap();
        assert_eq!(c.instructions, 1500);
        assert_eq!(c.cache_misses, 10);
    }

    #[test]
    fn test_parse_missing_counter() {
        assert!(parse_perf_stat("1200000,,instructions:u,1,100.00,,\n").is_none());
        assert!(parse_perf_stat("<not supported>,,cache-misses,0,0,,\n").is_none());
        assert!(parse_perf_stat("").is_none());
    }

    #[test]
    fn test_zero_misses_has_no_intensity() {
        let c = PerfCounters {
            instructions: 10,
            cache_misses: 0,
        };
        assert_eq!(c.operational_intensity(), None);
    }

    #[test]
    fn test_command_wraps_server() {
        let commands = ServerCommands::new("/nonexistent", "/tmp")
            .with_override("time", vec!["mcp-server-time".to_string()]);
        let probe = OiProbe::new(commands, 3, Duration::from_secs(10));
        let spec = probe.command("time").unwrap();
        assert_eq!(spec.program, "perf");
        assert_eq!(
            spec.args,
            vec!["stat", "-e", "instructions,cache-misses", "-x,", "--", "mcp-server-time"]
        );
    }

    #[tokio::test]
    async fn test_measure_with_stand_in_perf() {
        // `sh stat -e ... -- mcp-server-time` runs ./stat as a script
        let dir = tempfile::TempDir::new().unwrap();
        let script = format!("cat > /dev/null\nprintf '{}' >&2\n", PERF_CSV.replace('\n', "\\n"));
        std::fs::write(dir.path().join("stat"), script).unwrap();

        let commands = ServerCommands::new("/nonexistent", "/tmp")
            .with_override("time", vec!["mcp-server-time".to_string()]);
        let mut probe = OiProbe::new(commands, 2, Duration::from_secs(5));
        probe.perf = "sh".to_string();
        probe.working_dir = Some(dir.path().to_path_buf());

        let tool = find_tool("get_current_time").unwrap();
        let oi = probe.measure(tool, b"{}").await.unwrap();
        assert_eq!(oi.tool_name, "get_current_time");
        assert_eq!(oi.runs, Some(2));
        assert_eq!(oi.instructions, Some(1_200_000));
        assert!((oi.operational_intensity - 3.75).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_measure_without_counters() {
        let commands = ServerCommands::new("/nonexistent", "/tmp")
            .with_override("time", vec!["mcp-server-time".to_string()]);
        let mut probe = OiProbe::new(commands, 2, Duration::from_secs(5));
        probe.perf = "true".to_string();
        let tool = find_tool("get_current_time").unwrap();
        assert!(probe.measure(tool, b"{}").await.is_none());
    }
}
