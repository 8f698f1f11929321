//! Minimal MCP (JSON-RPC 2.0) surface: `initialize`, `ping`, `tools/list`
//! and `tools/call`. Tool failures come back as tool results flagged
//! `isError`, not as JSON-RPC errors, so agents can read the message and
//! retry.

use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::RwLock;

use crate::{
    service::TableService,
    tools::{self, ALL_TOOLS, Tool, ToolError},
};

pub const PROTOCOL_VERSION: &str = "2024-11-05";
pub const SERVER_NAME: &str = "drive-tables";

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;

#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(default)]
    pub jsonrpc: Option<String>,
    /// Absent for notifications.
    #[serde(default)]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    fn failure(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CallParams {
    name: String,
    #[serde(default)]
    arguments: Value,
}

/// Decodes a raw request body. Failures come back as the JSON-RPC error
/// response to send: `-32700` for invalid JSON and `-32600` for JSON that is
/// not a request object, echoing the `id` when one can be read.
pub fn parse_request(body: &[u8]) -> Result<JsonRpcRequest, JsonRpcResponse> {
    let value = serde_json::from_slice::<Value>(body).map_err(|err| {
        JsonRpcResponse::failure(Value::Null, PARSE_ERROR, format!("Parse error: {err}"))
    })?;
    let id = value.get("id").cloned().unwrap_or(Value::Null);
    serde_json::from_value::<JsonRpcRequest>(value).map_err(|err| {
        JsonRpcResponse::failure(id, INVALID_REQUEST, format!("Invalid request: {err}"))
    })
}

/// Handles one request; notifications yield `None`.
pub async fn handle(
    service: &RwLock<TableService>,
    request: JsonRpcRequest,
) -> Option<JsonRpcResponse> {
    let id = request.id?;
    debug!("MCP request '{}'", request.method);
    let response = match request.method.as_str() {
        "initialize" => JsonRpcResponse::success(
            id,
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": { "tools": {} },
                "serverInfo": {
                    "name": SERVER_NAME,
                    "version": env!("CARGO_PKG_VERSION"),
                },
            }),
        ),
        "ping" => JsonRpcResponse::success(id, json!({})),
        "tools/list" => JsonRpcResponse::success(
            id,
            json!({ "tools": ALL_TOOLS.iter().map(|tool| tool.descriptor()).collect::<Vec<_>>() }),
        ),
        "tools/call" => call_tool(service, id, request.params).await,
        other => JsonRpcResponse::failure(id, METHOD_NOT_FOUND, format!("Method '{other}' not found")),
    };
    Some(response)
}

async fn call_tool(service: &RwLock<TableService>, id: Value, params: Value) -> JsonRpcResponse {
    let params = match serde_json::from_value::<CallParams>(params) {
        Ok(params) => params,
        Err(err) => return JsonRpcResponse::failure(id, INVALID_PARAMS, err.to_string()),
    };
    let tool = match params.name.parse::<Tool>() {
        Ok(tool) => tool,
        Err(err) => return JsonRpcResponse::failure(id, INVALID_PARAMS, err.to_string()),
    };
    match tools::call(service, tool, params.arguments).await {
        Ok(value) => JsonRpcResponse::success(id, tool_result(&value, false)),
        Err(err @ ToolError::InvalidParams(_)) => {
            JsonRpcResponse::failure(id, INVALID_PARAMS, err.to_string())
        }
        Err(err) => JsonRpcResponse::success(id, tool_result(&Value::String(err.to_string()), true)),
    }
}

fn tool_result(value: &Value, is_error: bool) -> Value {
    let text = match value {
        Value::String(text) => text.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    };
    json!({
        "content": [{ "type": "text", "text": text }],
        "isError": is_error,
    })
}
