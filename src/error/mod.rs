use thiserror::Error;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("External service error: {0}")]
    Service(#[from] ServiceError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("MCP protocol error: {0}")]
    Mcp(#[from] McpError),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl AppError {
    /// Whether the failure is scoped to the submission and should be shown to
    /// the user rather than treated as a server fault.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            AppError::Validation(_) | AppError::Storage(StorageError::Conflict { .. })
        )
    }
}

/// Rejected user input: free-text fields or audio uploads.
///
/// Always recoverable; nothing has been mutated when one of these is returned.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{field} cannot be empty")]
    Empty { field: String },

    #[error("{field} is too long ({length} characters, maximum {max_length})")]
    TooLong {
        field: String,
        length: usize,
        max_length: usize,
    },

    #[error("{field} contains a forbidden character or word: '{token}'")]
    ForbiddenToken { field: String, token: String },

    #[error("{field} contains a disallowed character: '{character}'")]
    DisallowedCharacter { field: String, character: char },

    #[error("No audio file selected")]
    MissingFile,

    #[error("Invalid audio file name")]
    EmptyFileName,

    #[error("Unsupported audio type '{extension}' (allowed: {allowed})")]
    UnsupportedExtension { extension: String, allowed: String },

    #[error("Audio file is empty")]
    EmptyFile,

    #[error("Audio file too large ({size_mb:.1}MB, maximum {max_mb}MB)")]
    FileTooLarge { size_mb: f64, max_mb: u64 },

    #[error("Audio file name contains unsafe characters: '{token}'")]
    UnsafeFileName { token: String },

    #[error("Cannot read audio file '{path}': {message}")]
    UnreadableFile { path: String, message: String },
}

/// Failures of the two external services the pipeline delegates to.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Transcription failed: {message}")]
    Transcription { message: String },

    #[error("Generation failed: {message}")]
    Generation { message: String },
}

/// Storage layer errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database connection failed: {message}")]
    Connection { message: String },

    #[error("Query failed: {message}")]
    Query { message: String },

    #[error("A BDR named '{name}' already exists")]
    Conflict { name: String },

    #[error("BDR not found: {bdr_id}")]
    BdrNotFound { bdr_id: i64 },

    #[error("Cold call not found: {cold_call_id}")]
    ColdCallNotFound { cold_call_id: i64 },

    #[error("Meeting not found: {meeting_id}")]
    MeetingNotFound { meeting_id: i64 },

    #[error("Migration failed: {message}")]
    Migration { message: String },

    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

/// Low-level HTTP errors raised by the service client before they are
/// attributed to a specific service.
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("Service unavailable: {message} (retries: {retries})")]
    Unavailable { message: String, retries: u32 },

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("HTTP error: {0}")]
    Reqwest(#[from] reqwest::Error),
}

/// MCP protocol errors
#[derive(Debug, Error)]
pub enum McpError {
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Unknown tool: {tool_name}")]
    UnknownTool { tool_name: String },

    #[error("Invalid parameters for {tool_name}: {message}")]
    InvalidParameters { tool_name: String, message: String },

    #[error("Tool execution failed: {message}")]
    ExecutionFailed { message: String },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<AppError> for McpError {
    fn from(err: AppError) -> Self {
        McpError::ExecutionFailed {
            message: err.to_string(),
        }
    }
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for input validation
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Result type alias for external service calls
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Result type alias for raw HTTP calls
pub type HttpResult<T> = Result<T, HttpError>;

/// Result type alias for MCP operations
pub type McpResult<T> = Result<T, McpError>;
