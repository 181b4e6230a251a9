//! External command execution with a timeout

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("command not found: {0}")]
    NotFound(String),

    #[error("{program} timed out after {timeout:?}")]
    Timeout { program: String, timeout: Duration },

    #[error("failed to run {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// A command to run
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub stdin: Option<Vec<u8>>,
    pub env: Vec<(String, String)>,
    pub current_dir: Option<PathBuf>,
    pub timeout: Duration,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            stdin: None,
            env: Vec::new(),
            current_dir: None,
            timeout: Duration::from_secs(60),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn stdin(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Captured result of a finished command
#[derive(Debug, Clone)]
pub struct CommandOutcome {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub elapsed: Duration,
}

impl CommandOutcome {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Run a command to completion, feeding `stdin` and capturing output.
///
/// The child is killed if the timeout fires.
pub async fn run_command(spec: &CommandSpec) -> Result<CommandOutcome, ProcessError> {
    let mut cmd = Command::new(&spec.program);
    cmd.args(&spec.args)
        .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(if spec.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = &spec.current_dir {
        cmd.current_dir(dir);
    }

    debug!(program = %spec.program, args = ?spec.args, "Running command");
    let start = Instant::now();

    let mut child = cmd.spawn().map_err(|e| spawn_error(&spec.program, e))?;

    let io_error = |source| ProcessError::Io {
        program: spec.program.clone(),
        source,
    };

    let result = timeout(spec.timeout, async {
        if let (Some(input), Some(mut pipe)) = (&spec.stdin, child.stdin.take()) {
            pipe.write_all(input).await?;
            pipe.shutdown().await?;
            drop(pipe);
        }
        child.wait_with_output().await
    })
    .await;

    match result {
        Ok(Ok(output)) => Ok(CommandOutcome {
            status: output.status,
            stdout: output.stdout,
            stderr: output.stderr,
            elapsed: start.elapsed(),
        }),
        Ok(Err(e)) => Err(io_error(e)),
        Err(_) => Err(ProcessError::Timeout {
            program: spec.program.clone(),
            timeout: spec.timeout,
        }),
    }
}

pub(crate) fn spawn_error(program: &str, e: std::io::Error) -> ProcessError {
    if e.kind() == std::io::ErrorKind::NotFound {
        ProcessError::NotFound(program.to_string())
    } else {
        ProcessError::Io {
            program: program.to_string(),
            source: e,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_captures_stdout_and_stdin() {
        let spec = CommandSpec::new("cat").stdin("hello edge");
        let outcome = run_command(&spec).await.unwrap();
        assert!(outcome.success());
        assert_eq!(outcome.stdout_text(), "hello edge");
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_not_an_error() {
        let spec = CommandSpec::new("sh").args(["-c", "echo oops >&2; exit 3"]);
        let outcome = run_command(&spec).await.unwrap();
        assert!(!outcome.success());
        assert_eq!(outcome.status.code(), Some(3));
        assert_eq!(outcome.stderr_text().trim(), "oops");
    }

    #[tokio::test]
    async fn test_missing_binary() {
        let spec = CommandSpec::new("definitely-not-a-real-binary-xyz");
        assert!(matches!(run_command(&spec).await, Err(ProcessError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_timeout() {
        let spec = CommandSpec::new("sleep")
            .arg("5")
            .timeout(Duration::from_millis(100));
        let err = run_command(&spec).await.unwrap_err();
        assert!(matches!(err, ProcessError::Timeout { .. }));
    }
}
