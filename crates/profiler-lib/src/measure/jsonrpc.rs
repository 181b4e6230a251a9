//! JSON-RPC 2.0 bodies for the MCP `tools/*` methods

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const JSONRPC_VERSION: &str = "2.0";

/// `tools/call` request for one tool
pub fn tool_call_request(id: u64, tool: &str, arguments: &Value) -> Value {
    json!({
        "jsonrpc": JSONRPC_VERSION,
        "method": "tools/call",
        "params": {
            "name": tool,
            "arguments": arguments,
        },
        "id": id,
    })
}

pub fn tools_list_request(id: u64) -> Value {
    json!({
        "jsonrpc": JSONRPC_VERSION,
        "method": "tools/list",
        "id": id,
    })
}

/// Error object of a JSON-RPC response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// A JSON-RPC response, successful or not
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<RpcError>,
}

impl RpcResponse {
    /// Parse the first JSON-RPC response line in `body`. Servers on stdio
    /// may print log lines before the response.
    pub fn parse(body: &[u8]) -> Option<Self> {
        if let Ok(resp) = serde_json::from_slice::<RpcResponse>(body) {
            return Some(resp);
        }
        String::from_utf8_lossy(body)
            .lines()
            .filter(|l| l.trim_start().starts_with('{'))
            .filter_map(|l| serde_json::from_str::<Value>(l).ok())
            .find(|v| v.get("jsonrpc").is_some())
            .and_then(|v| serde_json::from_value(v).ok())
    }

    /// Tool names from a `tools/list` result
    pub fn tool_names(&self) -> Vec<String> {
        self.result
            .as_ref()
            .and_then(|r| r.get("tools"))
            .and_then(Value::as_array)
            .map(|tools| {
                tools
                    .iter()
                    .filter_map(|t| t.get("name").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_call_shape() {
        let req = tool_call_request(7, "git_log", &json!({"repo_path": "/tmp/git_repo"}));
        assert_eq!(req["jsonrpc"], "2.0");
        assert_eq!(req["method"], "tools/call");
        assert_eq!(req["params"]["name"], "git_log");
        assert_eq!(req["params"]["arguments"]["repo_path"], "/tmp/git_repo");
        assert_eq!(req["id"], 7);
    }

    #[test]
    fn test_parse_response_after_log_lines() {
        let body = b"Secure MCP Filesystem Server running on stdio\n{\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{\"content\":[]}}\n";
        let resp = RpcResponse::parse(body).unwrap();
        assert!(resp.error.is_none());
        assert!(resp.result.is_some());
    }

    #[test]
    fn test_parse_error_response() {
        let body = br#"{"jsonrpc":"2.0","id":1,"error":{"code":-32601,"message":"Method not found"}}"#;
        let resp = RpcResponse::parse(body).unwrap();
        assert_eq!(resp.error.unwrap().code, -32601);
    }

    #[test]
    fn test_tool_names() {
        let body = br#"{"jsonrpc":"2.0","id":1,"result":{"tools":[{"name":"summarize_text"},{"name":"get_provider_info"}]}}"#;
        let names = RpcResponse::parse(body).unwrap().tool_names();
        assert_eq!(names, vec!["summarize_text", "get_provider_info"]);
        assert!(RpcResponse::parse(b"garbage").is_none());
    }
}
