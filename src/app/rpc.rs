use crate::app::tools::all_tool_schemas;
use crate::core::dispatcher::CommandDispatcher;
use crate::domain::model::{Command, DispatchResult, DownstreamStatus};
use crate::utils::error::{GatewayError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const JSONRPC_VERSION: &str = "2.0";
pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";

pub const PARSE_ERROR: i64 = -32700;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;

fn default_jsonrpc() -> String {
    JSONRPC_VERSION.to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(default = "default_jsonrpc")]
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Value,
    #[serde(default)]
    pub id: Option<Value>,
}

impl JsonRpcRequest {
    pub fn is_notification(&self) -> bool {
        self.id.is_none() && self.method.starts_with("notifications/")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    pub fn parse_error(err: &serde_json::Error) -> Self {
        Self {
            code: PARSE_ERROR,
            message: format!("Parse error: {}", err),
            data: None,
        }
    }

    pub fn method_not_found(method: &str) -> Self {
        Self {
            code: METHOD_NOT_FOUND,
            message: format!("Method not found: {}", method),
            data: None,
        }
    }
}

impl From<&GatewayError> for JsonRpcError {
    fn from(err: &GatewayError) -> Self {
        let code = match err {
            GatewayError::InvalidParameter { .. } | GatewayError::UnknownCommand { .. } => INVALID_PARAMS,
            _ => INTERNAL_ERROR,
        };

        let mut data = json!({ "kind": err.kind() });
        if let Some(field) = err.field() {
            data["field"] = json!(field);
        }

        let message = match code {
            INVALID_PARAMS => err.to_string(),
            _ => format!("Internal error: {}", err),
        };

        Self {
            code,
            message,
            data: Some(data),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    pub id: Option<Value>,
}

impl JsonRpcResponse {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            result: Some(result),
            error: None,
            id,
        }
    }

    pub fn error(id: Option<Value>, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            result: None,
            error: Some(error),
            id,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Deserialize)]
struct ToolCallParams {
    name: String,
    #[serde(default)]
    arguments: Value,
}

/// Routes MCP methods; `tools/call` ends up in the dispatcher.
pub struct RpcHandler {
    dispatcher: CommandDispatcher,
    info: ServerInfo,
}

impl RpcHandler {
    pub fn new(dispatcher: CommandDispatcher, info: ServerInfo) -> Self {
        Self { dispatcher, info }
    }

    pub fn info(&self) -> &ServerInfo {
        &self.info
    }

    pub fn dispatcher(&self) -> &CommandDispatcher {
        &self.dispatcher
    }

    /// Returns `None` for notifications, which get no reply.
    pub async fn handle(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        if request.is_notification() {
            tracing::debug!(method = %request.method, "Notification received");
            return None;
        }

        tracing::info!(method = %request.method, "Processing JSON-RPC request");

        let outcome = match request.method.as_str() {
            "initialize" => Ok(self.initialize()),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(json!({ "tools": all_tool_schemas() })),
            "tools/call" => self.tools_call(request.params).await,
            other => {
                tracing::warn!(method = %other, "Unknown method");
                return Some(JsonRpcResponse::error(
                    request.id,
                    JsonRpcError::method_not_found(other),
                ));
            }
        };

        Some(match outcome {
            Ok(result) => JsonRpcResponse::success(request.id, result),
            Err(e) => {
                tracing::warn!(method = %request.method, error = %e, "JSON-RPC request failed");
                JsonRpcResponse::error(request.id, JsonRpcError::from(&e))
            }
        })
    }

    fn initialize(&self) -> Value {
        json!({
            "protocolVersion": MCP_PROTOCOL_VERSION,
            "capabilities": {
                "tools": { "listChanged": false }
            },
            "serverInfo": {
                "name": self.info.name,
                "version": self.info.version,
            }
        })
    }

    async fn tools_call(&self, params: Value) -> Result<Value> {
        let params: ToolCallParams = serde_json::from_value(params).map_err(|e| {
            GatewayError::invalid_parameter(None, "params", format!("expected {{name, arguments}}: {}", e))
        })?;

        let command = Command::parse(&params.name, &params.arguments)?;
        let result = self.dispatcher.dispatch(command).await;

        tool_result(&result)
    }
}

fn tool_result(result: &DispatchResult) -> Result<Value> {
    let structured = serde_json::to_value(result)?;
    let is_error = result.downstream_status != DownstreamStatus::Success;

    Ok(json!({
        "content": [
            { "type": "text", "text": result.summary() }
        ],
        "structuredContent": structured,
        "isError": is_error,
    }))
}
