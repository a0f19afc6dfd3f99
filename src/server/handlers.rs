use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, warn};

use super::SharedState;
use crate::analysis::{build_dashboard, ColdCallRequest, DashboardRequest, MeetingRequest};
use crate::chart::render_radar;
use crate::error::{AppError, AppResult, McpError, McpResult, StorageError, ValidationError};
use crate::storage::Storage;
use crate::validation::{sanitize_text, validate_text, AudioUpload, MAX_BDR_NAME_LEN};

/// Route tool calls to appropriate handlers
pub async fn handle_tool_call(
    state: &SharedState,
    tool_name: &str,
    arguments: Option<Value>,
) -> McpResult<Value> {
    info!(tool = %tool_name, "Routing tool call");

    match tool_name {
        // BDR management
        "bdr_create" => handle_bdr_create(state, arguments).await,
        "bdr_rename" => handle_bdr_rename(state, arguments).await,
        "bdr_delete" => handle_bdr_delete(state, arguments).await,
        "bdr_list" => handle_bdr_list(state).await,
        // Cold calls
        "cold_call_analyze" => handle_cold_call_analyze(state, arguments).await,
        "cold_call_list" => handle_cold_call_list(state, arguments).await,
        "cold_call_get" => handle_cold_call_get(state, arguments).await,
        "cold_call_chart" => handle_cold_call_chart(state, arguments).await,
        "cold_call_delete" => handle_cold_call_delete(state, arguments).await,
        "cold_call_delete_all" => handle_cold_call_delete_all(state).await,
        // 1:1 meetings
        "meeting_analyze" => handle_meeting_analyze(state, arguments).await,
        "meeting_list" => handle_meeting_list(state, arguments).await,
        "meeting_latest" => handle_meeting_latest(state, arguments).await,
        "meeting_delete" => handle_meeting_delete(state, arguments).await,
        "meeting_delete_all" => handle_meeting_delete_all(state).await,
        // Reporting
        "dashboard" => handle_dashboard(state, arguments).await,
        "stats" => handle_stats(state).await,
        _ => Err(McpError::UnknownTool {
            tool_name: tool_name.to_string(),
        }),
    }
}

#[derive(Debug, Deserialize)]
struct BdrIdParams {
    bdr_id: i64,
}

#[derive(Debug, Deserialize)]
struct ColdCallIdParams {
    cold_call_id: i64,
}

#[derive(Debug, Deserialize)]
struct MeetingIdParams {
    meeting_id: i64,
}

#[derive(Debug, Serialize)]
struct Deleted {
    deleted: bool,
}

#[derive(Debug, Serialize)]
struct DeletedCount {
    deleted: u64,
}

// ============================================================================
// BDR handlers
// ============================================================================

/// Validate and clean a BDR name before it reaches storage
fn checked_bdr_name(name: &str) -> AppResult<String> {
    validate_text(name, "name", MAX_BDR_NAME_LEN)?;
    Ok(sanitize_text(name))
}

async fn handle_bdr_create(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    #[derive(Deserialize)]
    struct CreateParams {
        name: String,
    }

    execute_handler("bdr_create", arguments, |params: CreateParams| async move {
        let name = checked_bdr_name(&params.name)?;
        Ok::<_, AppError>(state.storage.create_bdr(&name).await?)
    })
    .await
}

async fn handle_bdr_rename(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    #[derive(Deserialize)]
    struct RenameParams {
        bdr_id: i64,
        name: String,
    }

    execute_handler("bdr_rename", arguments, |params: RenameParams| async move {
        let name = checked_bdr_name(&params.name)?;
        Ok::<_, AppError>(state.storage.rename_bdr(params.bdr_id, &name).await?)
    })
    .await
}

/// Deletes the BDR together with its cold calls and meetings
async fn handle_bdr_delete(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    execute_handler("bdr_delete", arguments, |params: BdrIdParams| async move {
        Ok::<_, AppError>(state.storage.delete_bdr(params.bdr_id).await?)
    })
    .await
}

async fn handle_bdr_list(state: &SharedState) -> McpResult<Value> {
    execute_without_arguments("bdr_list", || async move {
        Ok::<_, AppError>(state.storage.list_bdrs().await?)
    })
    .await
}

// ============================================================================
// Cold call handlers
// ============================================================================

/// Read the audio file referenced by a tool call, if any
async fn load_audio(path: Option<&str>) -> AppResult<Option<AudioUpload>> {
    let Some(path) = path.filter(|p| !p.trim().is_empty()) else {
        return Ok(None);
    };

    AudioUpload::from_path(path).await.map(Some).map_err(|e| {
        ValidationError::UnreadableFile {
            path: path.to_string(),
            message: e.to_string(),
        }
        .into()
    })
}

async fn handle_cold_call_analyze(
    state: &SharedState,
    arguments: Option<Value>,
) -> McpResult<Value> {
    #[derive(Deserialize)]
    struct AnalyzeParams {
        #[serde(flatten)]
        request: ColdCallRequest,
        audio_path: Option<String>,
    }

    execute_handler(
        "cold_call_analyze",
        arguments,
        |params: AnalyzeParams| async move {
            let audio = load_audio(params.audio_path.as_deref()).await?;
            state.cold_calls.analyze(params.request, audio).await
        },
    )
    .await
}

/// Lists one BDR's cold calls, or every cold call with its BDR name
async fn handle_cold_call_list(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    #[derive(Deserialize)]
    struct ListParams {
        bdr_id: Option<i64>,
    }

    let params: ListParams = parse_optional_arguments("cold_call_list", arguments)?;
    let result = match params.bdr_id {
        Some(bdr_id) => state
            .storage
            .list_cold_calls(bdr_id)
            .await
            .map(serde_json::to_value),
        None => state
            .storage
            .list_all_cold_calls()
            .await
            .map(serde_json::to_value),
    };

    result
        .map_err(|e| execution_failed("cold_call_list", e.into()))?
        .map_err(McpError::Json)
}

async fn handle_cold_call_get(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    execute_handler(
        "cold_call_get",
        arguments,
        |params: ColdCallIdParams| async move {
            let cold_call_id = params.cold_call_id;
            let record = state
                .storage
                .get_cold_call(cold_call_id)
                .await?
                .ok_or(StorageError::ColdCallNotFound { cold_call_id })?;
            Ok::<_, AppError>(record)
        },
    )
    .await
}

/// Radar chart of a single cold call's six scores
async fn handle_cold_call_chart(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    execute_handler(
        "cold_call_chart",
        arguments,
        |params: ColdCallIdParams| async move {
            let cold_call_id = params.cold_call_id;
            let record = state
                .storage
                .get_cold_call(cold_call_id)
                .await?
                .ok_or(StorageError::ColdCallNotFound { cold_call_id })?;
            let title = format!("{} - {}", record.prospect_name, record.prospect_company);
            Ok::<_, AppError>(render_radar(&record.scores, &title))
        },
    )
    .await
}

async fn handle_cold_call_delete(
    state: &SharedState,
    arguments: Option<Value>,
) -> McpResult<Value> {
    execute_handler(
        "cold_call_delete",
        arguments,
        |params: ColdCallIdParams| async move {
            let deleted = state.storage.delete_cold_call(params.cold_call_id).await?;
            Ok::<_, AppError>(Deleted { deleted })
        },
    )
    .await
}

async fn handle_cold_call_delete_all(state: &SharedState) -> McpResult<Value> {
    execute_without_arguments("cold_call_delete_all", || async move {
        let deleted = state.storage.delete_all_cold_calls().await?;
        Ok::<_, AppError>(DeletedCount { deleted })
    })
    .await
}

// ============================================================================
// Meeting handlers
// ============================================================================

async fn handle_meeting_analyze(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    #[derive(Deserialize)]
    struct AnalyzeParams {
        #[serde(flatten)]
        request: MeetingRequest,
        audio_path: Option<String>,
    }

    execute_handler(
        "meeting_analyze",
        arguments,
        |params: AnalyzeParams| async move {
            let audio = load_audio(params.audio_path.as_deref()).await?;
            state.meetings.analyze(params.request, audio).await
        },
    )
    .await
}

async fn handle_meeting_list(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    execute_handler("meeting_list", arguments, |params: BdrIdParams| async move {
        Ok::<_, AppError>(state.storage.list_meetings(params.bdr_id).await?)
    })
    .await
}

/// The "previous analysis" shown before a new meeting is recorded
async fn handle_meeting_latest(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    execute_handler("meeting_latest", arguments, |params: BdrIdParams| async move {
        Ok::<_, AppError>(state.storage.latest_meeting(params.bdr_id).await?)
    })
    .await
}

async fn handle_meeting_delete(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    execute_handler(
        "meeting_delete",
        arguments,
        |params: MeetingIdParams| async move {
            let deleted = state.storage.delete_meeting(params.meeting_id).await?;
            Ok::<_, AppError>(Deleted { deleted })
        },
    )
    .await
}

async fn handle_meeting_delete_all(state: &SharedState) -> McpResult<Value> {
    execute_without_arguments("meeting_delete_all", || async move {
        let deleted = state.storage.delete_all_meetings().await?;
        Ok::<_, AppError>(DeletedCount { deleted })
    })
    .await
}

// ============================================================================
// Reporting handlers
// ============================================================================

async fn handle_dashboard(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    let request: DashboardRequest = parse_optional_arguments("dashboard", arguments)?;

    let report = build_dashboard(&state.storage, request, Utc::now())
        .await
        .map_err(|e| execution_failed("dashboard", e))?;

    serde_json::to_value(report).map_err(McpError::Json)
}

async fn handle_stats(state: &SharedState) -> McpResult<Value> {
    execute_without_arguments("stats", || async move {
        Ok::<_, AppError>(state.storage.stats().await?)
    })
    .await
}

// ============================================================================
// Helper functions
// ============================================================================

/// Helper to parse arguments with consistent error handling
fn parse_arguments<T: serde::de::DeserializeOwned>(
    tool_name: &str,
    arguments: Option<Value>,
) -> McpResult<T> {
    match arguments {
        Some(args) => serde_json::from_value(args).map_err(|e| McpError::InvalidParameters {
            tool_name: tool_name.to_string(),
            message: e.to_string(),
        }),
        None => Err(McpError::InvalidParameters {
            tool_name: tool_name.to_string(),
            message: "Missing arguments".to_string(),
        }),
    }
}

/// Like [`parse_arguments`], for tools whose arguments are all optional.
fn parse_optional_arguments<T: serde::de::DeserializeOwned>(
    tool_name: &str,
    arguments: Option<Value>,
) -> McpResult<T> {
    let arguments = match arguments {
        None | Some(Value::Null) => Value::Object(Default::default()),
        Some(args) => args,
    };
    parse_arguments(tool_name, Some(arguments))
}

/// Log a failed operation and wrap it for the tool result.
///
/// Rejected input and name conflicts are the caller's to fix, so they are
/// logged at `warn`; everything else is a server-side failure.
fn execution_failed(tool_name: &str, err: AppError) -> McpError {
    if err.is_user_facing() {
        warn!(tool = %tool_name, error = %err, "Tool call rejected");
    } else {
        error!(tool = %tool_name, error = %err, "Tool call failed");
    }
    McpError::from(err)
}

/// Generic handler that executes an operation with consistent error handling.
///
/// This helper reduces boilerplate by handling:
/// - Argument parsing with typed deserialization
/// - Error conversion to McpError
/// - Result serialization to JSON Value
///
/// # Type Parameters
/// - `P`: Parameter type (must implement DeserializeOwned)
/// - `R`: Result type (must implement Serialize)
/// - `F`: Async operation that takes P and returns AppResult<R>
async fn execute_handler<P, R, F, Fut>(
    tool_name: &str,
    arguments: Option<Value>,
    operation: F,
) -> McpResult<Value>
where
    P: serde::de::DeserializeOwned,
    R: Serialize,
    F: FnOnce(P) -> Fut,
    Fut: std::future::Future<Output = AppResult<R>>,
{
    let params: P = parse_arguments(tool_name, arguments)?;

    let result = operation(params)
        .await
        .map_err(|e| execution_failed(tool_name, e))?;

    serde_json::to_value(result).map_err(McpError::Json)
}

/// [`execute_handler`] for tools that take no arguments.
async fn execute_without_arguments<R, F, Fut>(tool_name: &str, operation: F) -> McpResult<Value>
where
    R: Serialize,
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = AppResult<R>>,
{
    let result = operation()
        .await
        .map_err(|e| execution_failed(tool_name, e))?;

    serde_json::to_value(result).map_err(McpError::Json)
}
