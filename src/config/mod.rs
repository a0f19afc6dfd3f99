use std::env;
use std::path::PathBuf;

use crate::error::AppError;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub openai: OpenAiConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub request: RequestConfig,
    pub upload: UploadConfig,
}

/// Transcription and text-generation service configuration
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub transcription_model: String,
    pub chat_model: String,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub max_connections: u32,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// HTTP request configuration
#[derive(Debug, Clone)]
pub struct RequestConfig {
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

/// Audio upload limits
#[derive(Debug, Clone, PartialEq)]
pub struct UploadConfig {
    pub allowed_extensions: Vec<String>,
    pub max_file_size_mb: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, AppError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let openai = OpenAiConfig {
            api_key: env::var("OPENAI_API_KEY").map_err(|_| AppError::Config {
                message: "OPENAI_API_KEY is required".to_string(),
            })?,
            base_url: env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com".to_string()),
            transcription_model: env::var("TRANSCRIPTION_MODEL")
                .unwrap_or_else(|_| "whisper-1".to_string()),
            chat_model: env::var("CHAT_MODEL").unwrap_or_else(|_| "gpt-4-turbo".to_string()),
        };

        let database = DatabaseConfig {
            path: PathBuf::from(
                env::var("DATABASE_PATH").unwrap_or_else(|_| "./data/gestao_bdrs.db".to_string()),
            ),
            max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        };

        let defaults = RequestConfig::default();
        let request = RequestConfig {
            timeout_ms: env::var("REQUEST_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.timeout_ms),
            max_retries: env::var("MAX_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_retries),
            retry_delay_ms: env::var("RETRY_DELAY_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.retry_delay_ms),
        };

        let upload_defaults = UploadConfig::default();
        let upload = UploadConfig {
            allowed_extensions: env::var("ALLOWED_AUDIO_TYPES")
                .ok()
                .map(|s| parse_extension_list(&s))
                .filter(|list| !list.is_empty())
                .unwrap_or(upload_defaults.allowed_extensions),
            max_file_size_mb: env::var("MAX_FILE_SIZE_MB")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|mb| *mb > 0)
                .unwrap_or(upload_defaults.max_file_size_mb),
        };

        Ok(Config {
            openai,
            database,
            logging,
            request,
            upload,
        })
    }
}

/// Split a comma separated extension list, dropping blanks and leading dots.
fn parse_extension_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|ext| ext.trim().trim_start_matches('.').to_lowercase())
        .filter(|ext| !ext.is_empty())
        .collect()
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 120_000,
            max_retries: 0,
            retry_delay_ms: 1000,
        }
    }
}

impl UploadConfig {
    /// Upload ceiling in bytes, saturating at `u64::MAX`.
    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb.saturating_mul(1024 * 1024)
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            allowed_extensions: ["mp3", "mp4", "m4a", "wav"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            max_file_size_mb: 25,
        }
    }
}
