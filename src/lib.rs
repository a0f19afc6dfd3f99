//! # BDR Coach
//!
//! A Model Context Protocol (MCP) server that helps sales managers coach their
//! BDRs (business development representatives). Recorded cold calls and 1:1
//! meetings are transcribed, analyzed by a language model against the six-stage
//! Hybrid Conversation rubric, and stored for dashboards.
//!
//! ## Features
//!
//! - **Cold-call analysis**: six bounded stage scores plus attention points and
//!   recommendations, with per-field fallbacks when the narrative is malformed
//! - **1:1 meeting analysis**: meeting summary and agreed goals, alongside the
//!   previous meeting
//! - **Dashboards**: per-stage averages globally or per BDR over a time window,
//!   a performance summary and an SVG radar chart
//! - **Record management**: BDRs with cascading delete, listing and deletion of
//!   cold calls and meetings
//!
//! ## Architecture
//!
//! ```text
//! MCP Client → MCP Server (Rust) → transcription + chat completion (HTTP)
//!                    ↓
//!              SQLite (records)
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use bdr_coach::{AppState, Config, McpServer};
//! use bdr_coach::openai::OpenAiClient;
//! use bdr_coach::storage::SqliteStorage;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let storage = SqliteStorage::new(&config.database).await?;
//!     let client = OpenAiClient::new(&config.openai, config.request.clone())?;
//!     let state = Arc::new(AppState::new(config, storage, client));
//!     McpServer::new(state).run().await?;
//!     Ok(())
//! }
//! ```

/// Score averaging, time windows and performance summaries.
pub mod aggregation;
/// The cold-call and meeting submission pipelines.
pub mod analysis;
/// SVG radar charts of stage scores.
pub mod chart;
/// Command-line interface.
pub mod cli;
/// Configuration management.
pub mod config;
/// Error types and result aliases for the application.
pub mod error;
/// Turning model narratives into structured records.
pub mod extraction;
/// Transcription and text-generation service client.
pub mod openai;
/// Prompt templates and the section-header contract.
pub mod prompts;
/// The six-stage rubric and its score sets.
pub mod rubric;
/// MCP server implementation and request handling.
pub mod server;
/// SQLite storage layer for persistence.
pub mod storage;
/// Input validation and sanitization.
pub mod validation;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use server::{AppState, McpServer, SharedState};
