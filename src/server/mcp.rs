//! Line-delimited JSON-RPC 2.0 over stdio, and the catalog of coaching tools.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, error, info};

use super::{handle_tool_call, SharedState};
use crate::error::McpError;

#[cfg(test)]
#[path = "mcp_tests.rs"]
mod mcp_tests;

/// An incoming message. A missing `id` marks a notification.
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

/// Exactly one of `result` and `error` is set; `id` is `null` when the
/// request could not be parsed.
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct Capabilities {
    pub tools: ToolCapabilities,
}

#[derive(Debug, Serialize)]
pub struct ToolCapabilities {
    /// Always false: the catalog is fixed at build time.
    #[serde(rename = "listChanged")]
    pub list_changed: bool,
}

/// Reply to `initialize`.
#[derive(Debug, Serialize)]
pub struct InitializeResult {
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    pub capabilities: Capabilities,
    #[serde(rename = "serverInfo")]
    pub server_info: ServerInfo,
}

/// One entry of `tools/list`.
#[derive(Debug, Clone, Serialize)]
pub struct Tool {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

#[derive(Debug, Deserialize)]
pub struct ToolCallParams {
    pub name: String,
    #[serde(default)]
    pub arguments: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct ToolResultContent {
    #[serde(rename = "type")]
    pub content_type: String,
    pub text: String,
}

/// Reply to `tools/call`. Failures of an analysis are reported here with
/// `isError` rather than as a JSON-RPC error.
#[derive(Debug, Serialize)]
pub struct ToolCallResult {
    pub content: Vec<ToolResultContent>,
    #[serde(rename = "isError", skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
}

impl ToolResultContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content_type: "text".to_string(),
            text: text.into(),
        }
    }
}

impl JsonRpcResponse {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: id.unwrap_or(Value::Null),
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Option<Value>, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: id.unwrap_or(Value::Null),
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
            }),
        }
    }
}

/// Serves the coaching tools to one MCP client on stdin/stdout.
pub struct McpServer {
    state: SharedState,
}

impl McpServer {
    pub fn new(state: SharedState) -> Self {
        Self { state }
    }

    /// Serve requests until stdin closes.
    pub async fn run(&self) -> std::io::Result<()> {
        info!("BDR coach MCP server starting...");

        let stdin = tokio::io::stdin();
        let mut stdout = tokio::io::stdout();
        let mut reader = BufReader::new(stdin);
        let mut line = String::new();

        loop {
            line.clear();
            let bytes_read = reader.read_line(&mut line).await?;

            if bytes_read == 0 {
                info!("EOF received, shutting down");
                break;
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            debug!(request = %trimmed, "Received request");

            let response = match serde_json::from_str::<JsonRpcRequest>(trimmed) {
                Ok(request) => self.handle_request(request).await,
                Err(e) => {
                    error!(error = %e, "Failed to parse request");
                    Some(JsonRpcResponse::error(
                        None,
                        -32700,
                        format!("Parse error: {}", e),
                    ))
                }
            };

            if let Some(response) = response {
                let response_json = serde_json::to_string(&response)?;
                debug!(response = %response_json, "Sending response");

                stdout.write_all(response_json.as_bytes()).await?;
                stdout.write_all(b"\n").await?;
                stdout.flush().await?;
            }
        }

        Ok(())
    }

    /// `None` means nothing is written back.
    async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let is_notification = request.id.is_none();

        match request.method.as_str() {
            "initialize" => Some(self.handle_initialize(request.id)),
            "initialized" => {
                debug!("Received initialized notification");
                None
            }
            "notifications/cancelled" => {
                debug!("Received cancelled notification");
                None
            }
            "tools/list" => Some(self.handle_tools_list(request.id)),
            "tools/call" => Some(self.handle_tool_call(request.id, request.params).await),
            "ping" => Some(JsonRpcResponse::success(
                request.id,
                Value::Object(Default::default()),
            )),
            method => {
                if is_notification {
                    debug!(method = %method, "Unknown notification, ignoring");
                    None
                } else {
                    error!(method = %method, "Unknown method");
                    Some(JsonRpcResponse::error(
                        request.id,
                        -32601,
                        format!("Method not found: {}", method),
                    ))
                }
            }
        }
    }

    fn handle_initialize(&self, id: Option<Value>) -> JsonRpcResponse {
        info!("Handling initialize request");

        let result = InitializeResult {
            protocol_version: "2024-11-05".to_string(),
            capabilities: Capabilities {
                tools: ToolCapabilities {
                    list_changed: false,
                },
            },
            server_info: ServerInfo {
                name: "bdr-coach".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        };

        match serde_json::to_value(result) {
            Ok(val) => JsonRpcResponse::success(id, val),
            Err(e) => {
                error!(error = %e, "Failed to serialize initialize result");
                JsonRpcResponse::error(id, -32603, format!("Internal error: {}", e))
            }
        }
    }

    fn handle_tools_list(&self, id: Option<Value>) -> JsonRpcResponse {
        info!("Handling tools/list request");

        let tools = tool_definitions();

        JsonRpcResponse::success(
            id,
            serde_json::json!({
                "tools": tools
            }),
        )
    }

    async fn handle_tool_call(&self, id: Option<Value>, params: Option<Value>) -> JsonRpcResponse {
        let params: ToolCallParams = match params {
            Some(p) => match serde_json::from_value(p) {
                Ok(p) => p,
                Err(e) => {
                    return JsonRpcResponse::error(id, -32602, format!("Invalid params: {}", e));
                }
            },
            None => {
                return JsonRpcResponse::error(id, -32602, "Missing params");
            }
        };

        info!(tool = %params.name, "Handling tool call");

        let (content, is_error) =
            match handle_tool_call(&self.state, &params.name, params.arguments).await {
                Ok(result) => {
                    let text = serde_json::to_string_pretty(&result).unwrap_or_else(|e| {
                        error!(error = %e, "Failed to serialize tool result");
                        format!("{{\"error\": \"Serialization failed: {}\"}}", e)
                    });
                    (ToolResultContent::text(text), None)
                }
                // The caller named a tool or sent arguments we cannot act on
                Err(e @ (McpError::UnknownTool { .. } | McpError::InvalidParameters { .. })) => {
                    return JsonRpcResponse::error(id, -32602, e.to_string());
                }
                Err(e) => (ToolResultContent::text(format!("Error: {}", e)), Some(true)),
            };

        let tool_result = ToolCallResult {
            content: vec![content],
            is_error,
        };

        match serde_json::to_value(tool_result) {
            Ok(val) => JsonRpcResponse::success(id, val),
            Err(e) => {
                error!(error = %e, "Failed to serialize tool call result");
                JsonRpcResponse::error(id.clone(), -32603, format!("Internal error: {}", e))
            }
        }
    }
}

/// Every tool the server advertises, in listing order
pub fn tool_definitions() -> Vec<Tool> {
    vec![
        // BDR management
        get_bdr_create_tool(),
        get_bdr_rename_tool(),
        get_bdr_delete_tool(),
        get_bdr_list_tool(),
        // Cold calls
        get_cold_call_analyze_tool(),
        get_cold_call_list_tool(),
        get_cold_call_get_tool(),
        get_cold_call_chart_tool(),
        get_cold_call_delete_tool(),
        get_cold_call_delete_all_tool(),
        // 1:1 meetings
        get_meeting_analyze_tool(),
        get_meeting_list_tool(),
        get_meeting_latest_tool(),
        get_meeting_delete_tool(),
        get_meeting_delete_all_tool(),
        // Reporting
        get_dashboard_tool(),
        get_stats_tool(),
    ]
}

fn no_arguments_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {},
        "additionalProperties": false
    })
}

fn id_schema(field: &str, description: &str) -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            field: {
                "type": "integer",
                "description": description
            }
        },
        "required": [field],
        "additionalProperties": false
    })
}

// ============================================================================
// BDR Tool Definitions
// ============================================================================

/// Get the BDR creation tool definition
fn get_bdr_create_tool() -> Tool {
    Tool {
        name: "bdr_create".to_string(),
        description: "Register a new BDR (business development representative). Names are unique.".to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "name": {
                    "type": "string",
                    "maxLength": 50,
                    "description": "Display name of the BDR"
                }
            },
            "required": ["name"],
            "additionalProperties": false
        }),
    }
}

/// Get the BDR rename tool definition
fn get_bdr_rename_tool() -> Tool {
    Tool {
        name: "bdr_rename".to_string(),
        description: "Rename an existing BDR. Fails if another BDR already uses the name."
            .to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "bdr_id": {
                    "type": "integer",
                    "description": "ID of the BDR to rename"
                },
                "name": {
                    "type": "string",
                    "maxLength": 50,
                    "description": "New display name"
                }
            },
            "required": ["bdr_id", "name"],
            "additionalProperties": false
        }),
    }
}

/// Get the BDR delete tool definition
fn get_bdr_delete_tool() -> Tool {
    Tool {
        name: "bdr_delete".to_string(),
        description: "Delete a BDR together with all of their cold calls and meetings. The deletion is atomic.".to_string(),
        input_schema: id_schema("bdr_id", "ID of the BDR to delete"),
    }
}

/// Get the BDR list tool definition
fn get_bdr_list_tool() -> Tool {
    Tool {
        name: "bdr_list".to_string(),
        description: "List all BDRs ordered by name.".to_string(),
        input_schema: no_arguments_schema(),
    }
}

// ============================================================================
// Cold Call Tool Definitions
// ============================================================================

/// Get the cold call analysis tool definition
fn get_cold_call_analyze_tool() -> Tool {
    Tool {
        name: "cold_call_analyze".to_string(),
        description: "Transcribe a recorded cold call, score it against the six-stage rubric (Warmer, Reframe, Rational Drowning, Emotional Impact, New Way, Your Solution) and store the analysis. Returns the stored record, per-stage scores with bands, the fallbacks applied and per-stage timings.".to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "bdr_id": {
                    "type": "integer",
                    "description": "ID of the BDR who made the call"
                },
                "prospect_name": {
                    "type": "string",
                    "maxLength": 100,
                    "description": "Name of the prospect"
                },
                "prospect_company": {
                    "type": "string",
                    "maxLength": 100,
                    "description": "Company of the prospect"
                },
                "commercial_insight": {
                    "type": "string",
                    "maxLength": 500,
                    "description": "Optional insight the BDR was expected to deliver"
                },
                "language": {
                    "type": "string",
                    "enum": ["pt", "en"],
                    "description": "Language of the call (default: en)"
                },
                "audio_path": {
                    "type": "string",
                    "description": "Path to the recording (mp3, mp4, m4a or wav by default)"
                }
            },
            "required": ["bdr_id", "prospect_name", "prospect_company", "audio_path"],
            "additionalProperties": false
        }),
    }
}

/// Get the cold call list tool definition
fn get_cold_call_list_tool() -> Tool {
    Tool {
        name: "cold_call_list".to_string(),
        description: "List analyzed cold calls, newest first. Without bdr_id every call is listed with its BDR name.".to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "bdr_id": {
                    "type": "integer",
                    "description": "Optional BDR to restrict the listing to"
                }
            },
            "additionalProperties": false
        }),
    }
}

/// Get the cold call lookup tool definition
fn get_cold_call_get_tool() -> Tool {
    Tool {
        name: "cold_call_get".to_string(),
        description: "Get one analyzed cold call by ID, including the full narrative.".to_string(),
        input_schema: id_schema("cold_call_id", "ID of the cold call"),
    }
}

/// Get the cold call chart tool definition
fn get_cold_call_chart_tool() -> Tool {
    Tool {
        name: "cold_call_chart".to_string(),
        description: "Render the six stage scores of one cold call as an SVG radar chart."
            .to_string(),
        input_schema: id_schema("cold_call_id", "ID of the cold call"),
    }
}

/// Get the cold call delete tool definition
fn get_cold_call_delete_tool() -> Tool {
    Tool {
        name: "cold_call_delete".to_string(),
        description: "Delete one cold call analysis.".to_string(),
        input_schema: id_schema("cold_call_id", "ID of the cold call to delete"),
    }
}

/// Get the cold call bulk delete tool definition
fn get_cold_call_delete_all_tool() -> Tool {
    Tool {
        name: "cold_call_delete_all".to_string(),
        description: "Delete every cold call analysis of every BDR.".to_string(),
        input_schema: no_arguments_schema(),
    }
}

// ============================================================================
// Meeting Tool Definitions
// ============================================================================

/// Get the 1:1 meeting analysis tool definition
fn get_meeting_analyze_tool() -> Tool {
    Tool {
        name: "meeting_analyze".to_string(),
        description: "Transcribe a recorded 1:1 meeting with a BDR, extract the summary and the agreed goals, and store them. Returns the BDR's previous meeting alongside the new one.".to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "bdr_id": {
                    "type": "integer",
                    "description": "ID of the BDR in the meeting"
                },
                "language": {
                    "type": "string",
                    "enum": ["pt", "en"],
                    "description": "Language of the meeting (default: en)"
                },
                "held_at": {
                    "type": "string",
                    "format": "date-time",
                    "description": "When the meeting took place (default: now)"
                },
                "audio_path": {
                    "type": "string",
                    "description": "Path to the recording"
                }
            },
            "required": ["bdr_id", "audio_path"],
            "additionalProperties": false
        }),
    }
}

/// Get the meeting list tool definition
fn get_meeting_list_tool() -> Tool {
    Tool {
        name: "meeting_list".to_string(),
        description: "List a BDR's 1:1 meeting analyses, newest first.".to_string(),
        input_schema: id_schema("bdr_id", "ID of the BDR"),
    }
}

/// Get the latest meeting tool definition
fn get_meeting_latest_tool() -> Tool {
    Tool {
        name: "meeting_latest".to_string(),
        description: "Get a BDR's most recent 1:1 meeting analysis, or null if there is none."
            .to_string(),
        input_schema: id_schema("bdr_id", "ID of the BDR"),
    }
}

/// Get the meeting delete tool definition
fn get_meeting_delete_tool() -> Tool {
    Tool {
        name: "meeting_delete".to_string(),
        description: "Delete one 1:1 meeting analysis.".to_string(),
        input_schema: id_schema("meeting_id", "ID of the meeting to delete"),
    }
}

/// Get the meeting bulk delete tool definition
fn get_meeting_delete_all_tool() -> Tool {
    Tool {
        name: "meeting_delete_all".to_string(),
        description: "Delete every 1:1 meeting analysis of every BDR.".to_string(),
        input_schema: no_arguments_schema(),
    }
}

// ============================================================================
// Reporting Tool Definitions
// ============================================================================

/// Get the dashboard tool definition
fn get_dashboard_tool() -> Tool {
    Tool {
        name: "dashboard".to_string(),
        description: "Average cold-call scores per stage, globally or for one BDR, over an optional time window. Includes a performance summary (overall score, band, strongest and weakest stage) and a radar chart.".to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "bdr_id": {
                    "type": "integer",
                    "description": "Optional BDR to restrict the dashboard to"
                },
                "period": {
                    "type": "string",
                    "enum": ["7d", "30d", "90d", "all"],
                    "description": "Time window (default: all)"
                },
                "language": {
                    "type": "string",
                    "enum": ["pt", "en"],
                    "description": "Language of the summary text (default: en)"
                }
            },
            "additionalProperties": false
        }),
    }
}

/// Get the statistics tool definition
fn get_stats_tool() -> Tool {
    Tool {
        name: "stats".to_string(),
        description: "Count BDRs, 1:1 meetings and cold calls.".to_string(),
        input_schema: no_arguments_schema(),
    }
}
