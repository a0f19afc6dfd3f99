//! Server module for MCP protocol handling.
//!
//! This module provides:
//! - MCP server implementation over stdio
//! - Tool call handlers and routing
//! - Shared application state management

mod handlers;
mod mcp;

pub use handlers::*;
pub use mcp::*;

use std::sync::Arc;

use crate::analysis::{ColdCallAnalyzer, MeetingAnalyzer, PipelineCore};
use crate::config::Config;
use crate::openai::{OpenAiClient, TextGenerator, Transcriber};
use crate::storage::SqliteStorage;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// SQLite storage backend.
    pub storage: SqliteStorage,
    /// Cold-call pipeline.
    pub cold_calls: ColdCallAnalyzer,
    /// 1:1 meeting pipeline.
    pub meetings: MeetingAnalyzer,
}

impl AppState {
    /// Create new application state backed by the HTTP service client
    pub fn new(config: Config, storage: SqliteStorage, client: OpenAiClient) -> Self {
        let client = Arc::new(client);
        Self::with_services(config, storage, client.clone(), client)
    }

    /// Create application state with explicit service implementations
    pub fn with_services(
        config: Config,
        storage: SqliteStorage,
        transcriber: Arc<dyn Transcriber>,
        generator: Arc<dyn TextGenerator>,
    ) -> Self {
        tracing::info!(
            transcription_model = %config.openai.transcription_model,
            chat_model = %config.openai.chat_model,
            max_file_size_mb = config.upload.max_file_size_mb,
            "AppState initializing"
        );

        let core = PipelineCore::new(
            Arc::new(storage.clone()),
            transcriber,
            generator,
            config.upload.clone(),
        );

        Self {
            cold_calls: ColdCallAnalyzer::new(core.clone()),
            meetings: MeetingAnalyzer::new(core),
            config,
            storage,
        }
    }
}

/// Shared application state handle
pub type SharedState = Arc<AppState>;
