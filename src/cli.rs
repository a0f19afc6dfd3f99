//! Command-line interface.
//!
//! With no subcommand the binary runs the MCP server over stdio. The other
//! subcommands read the database directly and print a report to stdout.

use std::path::PathBuf;

use chrono::Utc;
use clap::{Parser, Subcommand};

use crate::aggregation::Period;
use crate::analysis::{build_dashboard, DashboardReport, DashboardRequest};
use crate::rubric::Language;
use crate::storage::{SqliteStorage, Storage};

/// Top-level arguments.
#[derive(Parser, Debug)]
#[command(name = "bdr-coach", version, about)]
pub struct Cli {
    /// Subcommand to run (defaults to `serve`)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// The requested command, `serve` when none was given.
    pub fn command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Serve)
    }
}

/// CLI subcommands.
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Commands {
    /// Run the MCP server on stdin/stdout
    Serve,

    /// Show how many BDRs, meetings and cold calls are stored
    Stats,

    /// Show average cold-call scores with a performance summary
    Dashboard {
        /// Restrict to one BDR
        #[arg(long)]
        bdr_id: Option<i64>,

        /// Time window: 7d, 30d, 90d or all
        #[arg(long, default_value = "all")]
        period: Period,

        /// Summary language: pt or en
        #[arg(long, default_value = "en")]
        language: Language,

        /// Write the radar chart to this SVG file
        #[arg(long)]
        chart: Option<PathBuf>,
    },
}

/// Result of CLI command execution.
#[derive(Debug)]
pub struct CliResult {
    /// Exit code (0 = success)
    pub exit_code: i32,
    /// Output message
    pub message: String,
}

impl CliResult {
    /// Create a success result with the given message.
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            message: message.into(),
        }
    }

    /// Create an error result with the given message.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            exit_code: 1,
            message: message.into(),
        }
    }
}

/// Execute a reporting command. `Serve` is handled by the binary.
pub async fn execute_command(command: Commands, storage: &SqliteStorage) -> CliResult {
    match command {
        Commands::Serve => CliResult::error("serve is not a reporting command"),
        Commands::Stats => execute_stats(storage).await,
        Commands::Dashboard {
            bdr_id,
            period,
            language,
            chart,
        } => {
            let request = DashboardRequest {
                bdr_id,
                period,
                language,
            };
            execute_dashboard(storage, request, chart).await
        }
    }
}

async fn execute_stats(storage: &SqliteStorage) -> CliResult {
    match storage.stats().await {
        Ok(stats) => CliResult::success(format!(
            "BDRs:       {}\nMeetings:   {}\nCold calls: {}\n",
            stats.bdrs, stats.meetings, stats.cold_calls
        )),
        Err(e) => CliResult::error(format!("Failed to read statistics: {}", e)),
    }
}

async fn execute_dashboard(
    storage: &SqliteStorage,
    request: DashboardRequest,
    chart: Option<PathBuf>,
) -> CliResult {
    let report = match build_dashboard(storage, request, Utc::now()).await {
        Ok(report) => report,
        Err(e) => return CliResult::error(format!("Failed to build dashboard: {}", e)),
    };

    let mut output = format_dashboard(&report, request.language);

    if let (Some(path), Some(image)) = (chart, report.chart.as_ref()) {
        if let Err(e) = tokio::fs::write(&path, &image.svg).await {
            return CliResult::error(format!(
                "Failed to write chart to {}: {}",
                path.display(),
                e
            ));
        }
        output.push_str(&format!("\nChart written to {}\n", path.display()));
    }

    CliResult::success(output)
}

/// Plain-text rendering of a dashboard report.
pub fn format_dashboard(report: &DashboardReport, language: Language) -> String {
    let mut output = format!(
        "{} ({}, {} cold calls)\n\n",
        report.scope, report.period, report.aggregate.count
    );

    for (stage, value) in report.aggregate.averages.iter() {
        output.push_str(&format!("  {:<18} {:>4.1}\n", stage.label(), value));
    }

    match &report.summary_text {
        Some(text) => {
            output.push('\n');
            output.push_str(text);
            output.push('\n');
        }
        None => output.push_str(match language {
            Language::English => "\nNo cold calls in this period.\n",
            Language::Portuguese => "\nNenhuma ligação neste período.\n",
        }),
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rubric::RubricScoreSet;
    use crate::storage::NewColdCall;

    #[test]
    fn test_no_subcommand_means_serve() {
        let cli = Cli::parse_from(["bdr-coach"]);
        assert_eq!(cli.command(), Commands::Serve);
    }

    #[test]
    fn test_dashboard_arguments() {
        let cli = Cli::parse_from([
            "bdr-coach",
            "dashboard",
            "--bdr-id",
            "3",
            "--period",
            "30d",
            "--language",
            "pt",
        ]);
        assert_eq!(
            cli.command(),
            Commands::Dashboard {
                bdr_id: Some(3),
                period: Period::Last30Days,
                language: Language::Portuguese,
                chart: None,
            }
        );
    }

    #[test]
    fn test_invalid_period_is_rejected() {
        let result = Cli::try_parse_from(["bdr-coach", "dashboard", "--period", "1y"]);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_stats_output() {
        let storage = SqliteStorage::new_in_memory().await.unwrap();
        storage.create_bdr("Ana").await.unwrap();

        let result = execute_command(Commands::Stats, &storage).await;
        assert_eq!(result.exit_code, 0);
        assert!(result.message.contains("BDRs:       1"));
        assert!(result.message.contains("Cold calls: 0"));
    }

    #[tokio::test]
    async fn test_dashboard_writes_chart() {
        let storage = SqliteStorage::new_in_memory().await.unwrap();
        let bdr = storage.create_bdr("Ana").await.unwrap();
        storage
            .create_cold_call(&NewColdCall::new(
                bdr.id,
                "Bruno",
                "Acme",
                RubricScoreSet::uniform(7),
            ))
            .await
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("radar.svg");
        let result = execute_command(
            Commands::Dashboard {
                bdr_id: None,
                period: Period::All,
                language: Language::English,
                chart: Some(path.clone()),
            },
            &storage,
        )
        .await;

        assert_eq!(result.exit_code, 0);
        assert!(result.message.contains("All BDRs (all, 1 cold calls)"));
        assert!(result.message.contains("Warmer"));
        let svg = std::fs::read_to_string(&path).unwrap();
        assert!(svg.starts_with("<svg"));
    }

    #[tokio::test]
    async fn test_empty_dashboard() {
        let storage = SqliteStorage::new_in_memory().await.unwrap();
        let result = execute_command(
            Commands::Dashboard {
                bdr_id: None,
                period: Period::Last7Days,
                language: Language::Portuguese,
                chart: None,
            },
            &storage,
        )
        .await;

        assert_eq!(result.exit_code, 0);
        assert!(result.message.contains("Nenhuma ligação"));
    }

    #[tokio::test]
    async fn test_dashboard_unknown_bdr() {
        let storage = SqliteStorage::new_in_memory().await.unwrap();
        let result = execute_command(
            Commands::Dashboard {
                bdr_id: Some(9),
                period: Period::All,
                language: Language::English,
                chart: None,
            },
            &storage,
        )
        .await;

        assert_eq!(result.exit_code, 1);
        assert!(result.message.contains("BDR not found: 9"));
    }
}
