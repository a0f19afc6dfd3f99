use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use bdr_coach::{
    cli::{execute_command, Cli, Commands},
    config::{Config, LogFormat},
    openai::OpenAiClient,
    server::{AppState, McpServer},
    storage::SqliteStorage,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize logging
    init_logging(&config);

    // Initialize storage
    let storage = match SqliteStorage::new(&config.database).await {
        Ok(s) => {
            info!(path = %config.database.path.display(), "Database initialized");
            s
        }
        Err(e) => {
            error!(error = %e, "Failed to initialize database");
            return Err(e.into());
        }
    };

    let command = cli.command();
    if command != Commands::Serve {
        let result = execute_command(command, &storage).await;
        if result.exit_code == 0 {
            print!("{}", result.message);
        } else {
            eprintln!("{}", result.message);
        }
        std::process::exit(result.exit_code);
    }

    info!(version = env!("CARGO_PKG_VERSION"), "BDR coach server starting...");

    // Initialize the transcription / generation client
    let client = match OpenAiClient::new(&config.openai, config.request.clone()) {
        Ok(c) => {
            info!(base_url = %config.openai.base_url, "Service client initialized");
            c
        }
        Err(e) => {
            error!(error = %e, "Failed to initialize service client");
            return Err(e.into());
        }
    };

    // Create application state
    let state = Arc::new(AppState::new(config, storage, client));

    // Start MCP server
    let server = McpServer::new(state);

    info!("Server ready, waiting for requests on stdin...");

    if let Err(e) = server.run().await {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Initialize tracing/logging. Output goes to stderr; stdout carries the protocol.
fn init_logging(config: &Config) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}
