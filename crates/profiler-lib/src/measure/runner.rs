//! Tool runners, one per runtime
//!
//! A runner turns a JSON-RPC request into a response body. Timing is done
//! by the caller so every runtime is measured the same way.

use super::jsonrpc::RpcResponse;
use crate::bench::process::{run_command, spawn_error, CommandSpec, ProcessError};
use crate::catalog::ToolDefinition;
use crate::models::Runtime;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};
use url::Url;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("no launch command for server {0}")]
    UnsupportedServer(String),

    #[error("server binary not found: {0}")]
    ServerNotFound(PathBuf),

    #[error("server exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    #[error("JSON-RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl RunnerError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, RunnerError::Timeout(_))
    }
}

/// Executes tool calls for one runtime
#[async_trait]
pub trait ToolRunner: Send + Sync {
    fn runtime(&self) -> Runtime;

    /// Send `request` (a serialized `tools/call`) and return the raw response
    async fn invoke(&self, tool: &ToolDefinition, request: &[u8]) -> Result<Vec<u8>, RunnerError>;
}

fn from_process(e: ProcessError) -> RunnerError {
    match e {
        ProcessError::Timeout { timeout, .. } => RunnerError::Timeout(timeout),
        other => RunnerError::Process(other),
    }
}

/// Fail on a JSON-RPC error object; a body that is not JSON-RPC passes
fn check_rpc(body: &[u8]) -> Result<(), RunnerError> {
    match RpcResponse::parse(body).and_then(|r| r.error) {
        Some(err) => Err(RunnerError::Rpc {
            code: err.code,
            message: err.message,
        }),
        None => Ok(()),
    }
}

/// Launch commands for the native MCP servers
#[derive(Debug, Clone)]
pub struct ServerCommands {
    /// Checkout holding `servers/*.py`
    pub edgeagent_root: PathBuf,
    /// Directory the filesystem server may access
    pub data_dir: PathBuf,
    pub python: String,
    /// Per-server argv replacing the built-in table
    pub overrides: HashMap<String, Vec<String>>,
}

impl ServerCommands {
    pub fn new(edgeagent_root: impl Into<PathBuf>, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            edgeagent_root: edgeagent_root.into(),
            data_dir: data_dir.into(),
            python: "python3".to_string(),
            overrides: HashMap::new(),
        }
    }

    pub fn with_override(mut self, server: &str, argv: Vec<String>) -> Self {
        self.overrides.insert(server.to_string(), argv);
        self
    }

    pub fn argv(&self, server: &str) -> Result<Vec<String>, RunnerError> {
        if let Some(argv) = self.overrides.get(server) {
            return Ok(argv.clone());
        }

        let npm = match server {
            "filesystem" => Some(vec![
                "mcp-server-filesystem".to_string(),
                self.data_dir.to_string_lossy().into_owned(),
            ]),
            "git" => Some(vec!["mcp-server-git".to_string()]),
            "fetch" => Some(vec!["mcp-server-fetch".to_string()]),
            "time" => Some(vec!["mcp-server-time".to_string()]),
            "sequentialthinking" => Some(vec!["mcp-server-sequential-thinking".to_string()]),
            _ => None,
        };
        if let Some(argv) = npm {
            return Ok(argv);
        }

        let script = match server {
            "summarize" => "summarize_server.py",
            "log_parser" => "log_parser_server.py",
            "data_aggregate" => "data_aggregate_server.py",
            "image_resize" => "image_resize_server.py",
            _ => return Err(RunnerError::UnsupportedServer(server.to_string())),
        };
        let path = self.edgeagent_root.join("servers").join(script);
        if !path.exists() {
            return Err(RunnerError::ServerNotFound(path));
        }
        Ok(vec![self.python.clone(), path.to_string_lossy().into_owned()])
    }
}

/// Native servers on stdio, one process per call
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    pub commands: ServerCommands,
    pub timeout: Duration,
}

impl ProcessRunner {
    pub fn new(commands: ServerCommands, timeout: Duration) -> Self {
        Self { commands, timeout }
    }
}

async fn run_stdio(argv: &[String], request: &[u8], timeout: Duration) -> Result<Vec<u8>, RunnerError> {
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| RunnerError::UnsupportedServer("empty command".to_string()))?;
    let spec = CommandSpec::new(program.clone())
        .args(args.iter().cloned())
        .stdin(request.to_vec())
        .timeout(timeout);

    let outcome = run_command(&spec).await.map_err(from_process)?;
    if !outcome.success() {
        let mut stderr = outcome.stderr_text();
        stderr.truncate(200);
        return Err(RunnerError::Failed {
            status: outcome.status.to_string(),
            stderr,
        });
    }
    check_rpc(&outcome.stdout)?;
    Ok(outcome.stdout)
}

#[async_trait]
impl ToolRunner for ProcessRunner {
    fn runtime(&self) -> Runtime {
        Runtime::Native
    }

    async fn invoke(&self, tool: &ToolDefinition, request: &[u8]) -> Result<Vec<u8>, RunnerError> {
        let argv = self.commands.argv(tool.server)?;
        run_stdio(&argv, request, self.timeout).await
    }
}

/// Component file name of a server's WASM build
pub fn wasm_file_name(server: &str, http: bool) -> String {
    let stem = match server {
        "sequentialthinking" => "sequential_thinking",
        other => other,
    };
    if http {
        format!("mcp_server_{}_http.wasm", stem)
    } else {
        format!("mcp_server_{}.wasm", stem)
    }
}

/// Servers that make outgoing HTTP requests
fn needs_outgoing_http(server: &str) -> bool {
    matches!(server, "fetch" | "summarize")
}

/// `wasmtime run` on stdio, one instance per call
#[derive(Debug, Clone)]
pub struct WasmRunner {
    pub wasmtime: String,
    pub wasm_dir: PathBuf,
    pub data_dir: PathBuf,
    pub timeout: Duration,
}

impl WasmRunner {
    pub fn new(wasm_dir: impl Into<PathBuf>, data_dir: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            wasmtime: "wasmtime".to_string(),
            wasm_dir: wasm_dir.into(),
            data_dir: data_dir.into(),
            timeout,
        }
    }

    pub fn argv(&self, server: &str) -> Result<Vec<String>, RunnerError> {
        let wasm = self.wasm_dir.join(wasm_file_name(server, false));
        if !wasm.exists() {
            return Err(RunnerError::ServerNotFound(wasm));
        }
        let mut argv = vec![self.wasmtime.clone(), "run".to_string()];
        if needs_outgoing_http(server) {
            argv.extend(["--wasi".to_string(), "http".to_string()]);
        }
        argv.push(format!("--dir={}", self.data_dir.display()));
        argv.push(wasm.to_string_lossy().into_owned());
        Ok(argv)
    }
}

#[async_trait]
impl ToolRunner for WasmRunner {
    fn runtime(&self) -> Runtime {
        Runtime::Wasm
    }

    async fn invoke(&self, tool: &ToolDefinition, request: &[u8]) -> Result<Vec<u8>, RunnerError> {
        let argv = self.argv(tool.server)?;
        run_stdio(&argv, request, self.timeout).await
    }
}

/// JSON-RPC over HTTP POST to a `wasmtime serve` endpoint
#[derive(Debug, Clone)]
pub struct HttpRunner {
    client: reqwest::Client,
    url: Url,
    timeout: Duration,
}

impl HttpRunner {
    pub fn new(url: Url, timeout: Duration) -> Result<Self, RunnerError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url,
            timeout,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Names advertised by the server's `tools/list`
    pub async fn list_tools(&self) -> Result<Vec<String>, RunnerError> {
        let body = serde_json::to_vec(&super::jsonrpc::tools_list_request(1))
            .unwrap_or_default();
        let response = self.post(body).await?;
        Ok(RpcResponse::parse(&response)
            .map(|r| r.tool_names())
            .unwrap_or_default())
    }

    async fn post(&self, body: Vec<u8>) -> Result<Vec<u8>, RunnerError> {
        let response = self
            .client
            .post(self.url.clone())
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| self.map_http(e))?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(|e| self.map_http(e))?;
        if !status.is_success() {
            let mut text = String::from_utf8_lossy(&bytes).into_owned();
            text.truncate(200);
            return Err(RunnerError::Failed {
                status: status.to_string(),
                stderr: text,
            });
        }
        Ok(bytes.to_vec())
    }

    fn map_http(&self, e: reqwest::Error) -> RunnerError {
        if e.is_timeout() {
            RunnerError::Timeout(self.timeout)
        } else {
            RunnerError::Http(e)
        }
    }
}

#[async_trait]
impl ToolRunner for HttpRunner {
    fn runtime(&self) -> Runtime {
        Runtime::Http
    }

    async fn invoke(&self, _tool: &ToolDefinition, request: &[u8]) -> Result<Vec<u8>, RunnerError> {
        let body = self.post(request.to_vec()).await?;
        check_rpc(&body)?;
        Ok(body)
    }
}

/// Settings for launching `wasmtime serve`
#[derive(Debug, Clone)]
pub struct ServeConfig {
    pub wasmtime: String,
    pub wasm_dir: PathBuf,
    pub data_dir: PathBuf,
    pub port: u16,
    pub startup_delay: Duration,
    /// Passed into the guest with `--env`
    pub env: Vec<(String, String)>,
}

impl ServeConfig {
    pub fn new(wasm_dir: impl Into<PathBuf>, data_dir: impl Into<PathBuf>, port: u16) -> Self {
        Self {
            wasmtime: "wasmtime".to_string(),
            wasm_dir: wasm_dir.into(),
            data_dir: data_dir.into(),
            port,
            startup_delay: Duration::from_secs(2),
            env: Vec::new(),
        }
    }

    /// Forward API keys from the host environment when set
    pub fn with_api_keys_from_env(mut self) -> Self {
        for key in ["OPENAI_API_KEY", "ANTHROPIC_API_KEY"] {
            match std::env::var(key) {
                Ok(value) if !value.is_empty() => self.env.push((key.to_string(), value)),
                _ => debug!(key, "API key not set"),
            }
        }
        self
    }

    pub fn argv(&self, wasm: &Path) -> Vec<String> {
        let mut argv = vec![
            self.wasmtime.clone(),
            "serve".to_string(),
            "--addr".to_string(),
            format!("127.0.0.1:{}", self.port),
            "-S".to_string(),
            "cli".to_string(),
            "-S".to_string(),
            "http".to_string(),
            format!("--dir={}", self.data_dir.display()),
        ];
        for (key, value) in &self.env {
            argv.push("--env".to_string());
            argv.push(format!("{}={}", key, value));
        }
        argv.push(wasm.to_string_lossy().into_owned());
        argv
    }
}

/// A running `wasmtime serve`, killed when dropped
pub struct WasmtimeServe {
    child: Child,
    url: Url,
    server: String,
}

impl WasmtimeServe {
    /// Spawn the HTTP build of `server` and wait out the startup delay
    pub async fn start(config: &ServeConfig, server: &str) -> Result<Self, RunnerError> {
        let wasm = config.wasm_dir.join(wasm_file_name(server, true));
        if !wasm.exists() {
            return Err(RunnerError::ServerNotFound(wasm));
        }
        let argv = config.argv(&wasm);
        let child = Command::new(&argv[0])
            .args(&argv[1..])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| RunnerError::Process(spawn_error(&config.wasmtime, e)))?;

        let url = Url::parse(&format!("http://127.0.0.1:{}/", config.port))
            .map_err(|e| RunnerError::UnsupportedServer(format!("bad serve address: {}", e)))?;

        info!(server, port = config.port, "Started wasmtime serve");
        tokio::time::sleep(config.startup_delay).await;

        Ok(Self {
            child,
            url,
            server: server.to_string(),
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub async fn stop(mut self) {
        if let Err(e) = self.child.kill().await {
            warn!(server = %self.server, error = %e, "Failed to stop wasmtime serve");
        } else {
            debug!(server = %self.server, "Stopped wasmtime serve");
        }
    }
}
