use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::{debug, info};

use super::{
    decode_stages, encode_stages, format_timestamp, Bdr, CascadeDelete, ColdCallListing,
    ColdCallRecord, MeetingRecord, NewColdCall, NewMeeting, ScoreFilter, Stats, Storage,
};
use crate::config::DatabaseConfig;
use crate::error::{StorageError, StorageResult};
use crate::rubric::{RubricScoreSet, FALLBACK_SCORE};

/// Static migrator that embeds migrations at compile time
static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

const COLD_CALL_COLUMNS: &str = "cold_calls.id, cold_calls.bdr_id, cold_calls.timestamp, \
    subject_name, subject_company, warmer_score, reframe_score, rational_drowning_score, \
    emotional_impact_score, new_way_score, your_solution_score, full_analysis, \
    attention_points, recommendations, commercial_insight, fallback_stages";

/// SQLite-backed storage implementation
#[derive(Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Create a new SQLite storage instance
    pub async fn new(config: &DatabaseConfig) -> StorageResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = config.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::Connection {
                message: format!("Failed to create database directory: {}", e),
            })?;
        }

        let database_url = format!("sqlite://{}?mode=rwc", config.path.display());

        let options = SqliteConnectOptions::from_str(&database_url)
            .map_err(|e| StorageError::Connection {
                message: format!("Invalid database URL: {}", e),
            })?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection {
                message: format!("Failed to connect to database: {}", e),
            })?;

        let storage = Self { pool };
        storage.run_migrations().await?;

        Ok(storage)
    }

    /// Create a private in-memory database (for tests and dry runs).
    ///
    /// Uses a single connection so every query sees the same database.
    pub async fn new_in_memory() -> StorageResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:").map_err(|e| {
            StorageError::Connection {
                message: format!("Invalid database URL: {}", e),
            }
        })?;

        // The database lives only as long as its connection.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection {
                message: format!("Failed to open in-memory database: {}", e),
            })?;

        let storage = Self { pool };
        storage.run_migrations().await?;

        Ok(storage)
    }

    /// Run database migrations using embedded sqlx migrations
    async fn run_migrations(&self) -> StorageResult<()> {
        info!("Running database migrations...");

        MIGRATOR.run(&self.pool).await.map_err(|e| StorageError::Migration {
            message: format!("Failed to run migrations: {}", e),
        })?;

        info!("Database migrations completed successfully");
        Ok(())
    }

    /// Get the underlying pool for advanced queries
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Map a unique-constraint violation on `bdrs.name` to `Conflict`.
fn conflict_or(err: sqlx::Error, name: &str) -> StorageError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => StorageError::Conflict {
            name: name.to_string(),
        },
        _ => StorageError::Sqlx(err),
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn create_bdr(&self, name: &str) -> StorageResult<Bdr> {
        let result = sqlx::query("INSERT INTO bdrs (name) VALUES (?)")
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(|e| conflict_or(e, name))?;

        let bdr = Bdr {
            id: result.last_insert_rowid(),
            name: name.to_string(),
        };
        info!(bdr_id = bdr.id, name = %bdr.name, "BDR created");
        Ok(bdr)
    }

    async fn rename_bdr(&self, id: i64, name: &str) -> StorageResult<Bdr> {
        let result = sqlx::query("UPDATE bdrs SET name = ? WHERE id = ?")
            .bind(name)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| conflict_or(e, name))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::BdrNotFound { bdr_id: id });
        }

        info!(bdr_id = id, name = %name, "BDR renamed");
        Ok(Bdr {
            id,
            name: name.to_string(),
        })
    }

    async fn get_bdr(&self, id: i64) -> StorageResult<Option<Bdr>> {
        let row: Option<BdrRow> = sqlx::query_as("SELECT id, name FROM bdrs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| r.into()))
    }

    async fn list_bdrs(&self) -> StorageResult<Vec<Bdr>> {
        let rows: Vec<BdrRow> = sqlx::query_as("SELECT id, name FROM bdrs ORDER BY name")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    async fn delete_bdr(&self, id: i64) -> StorageResult<CascadeDelete> {
        let mut tx = self.pool.begin().await?;

        let meetings = sqlx::query("DELETE FROM analyses WHERE bdr_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let cold_calls = sqlx::query("DELETE FROM cold_calls WHERE bdr_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let deleted = sqlx::query("DELETE FROM bdrs WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if deleted == 0 {
            // Dropping the transaction rolls back the child deletes.
            return Err(StorageError::BdrNotFound { bdr_id: id });
        }

        tx.commit().await?;

        info!(
            bdr_id = id,
            cold_calls = cold_calls,
            meetings = meetings,
            "BDR deleted with its records"
        );
        Ok(CascadeDelete {
            cold_calls,
            meetings,
        })
    }

    async fn create_cold_call(&self, call: &NewColdCall) -> StorageResult<ColdCallRecord> {
        let scores = &call.scores;
        let result = sqlx::query(
            r#"
            INSERT INTO cold_calls (
                bdr_id, timestamp, subject_name, subject_company,
                warmer_score, reframe_score, rational_drowning_score,
                emotional_impact_score, new_way_score, your_solution_score,
                full_analysis, attention_points, recommendations,
                commercial_insight, fallback_stages
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(call.bdr_id)
        .bind(format_timestamp(&call.timestamp))
        .bind(&call.prospect_name)
        .bind(&call.prospect_company)
        .bind(i64::from(scores.warmer))
        .bind(i64::from(scores.reframe))
        .bind(i64::from(scores.rational_drowning))
        .bind(i64::from(scores.emotional_impact))
        .bind(i64::from(scores.new_way))
        .bind(i64::from(scores.your_solution))
        .bind(&call.full_analysis)
        .bind(&call.attention_points)
        .bind(&call.recommendations)
        .bind(&call.commercial_insight)
        .bind(encode_stages(&call.fallback_stages))
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        debug!(cold_call_id = id, bdr_id = call.bdr_id, "Cold call stored");

        Ok(ColdCallRecord {
            id,
            bdr_id: call.bdr_id,
            timestamp: call.timestamp,
            prospect_name: call.prospect_name.clone(),
            prospect_company: call.prospect_company.clone(),
            scores: call.scores,
            full_analysis: call.full_analysis.clone(),
            attention_points: call.attention_points.clone(),
            recommendations: call.recommendations.clone(),
            commercial_insight: call.commercial_insight.clone(),
            fallback_stages: call.fallback_stages.clone(),
        })
    }

    async fn get_cold_call(&self, id: i64) -> StorageResult<Option<ColdCallRecord>> {
        let query = format!("SELECT {} FROM cold_calls WHERE id = ?", COLD_CALL_COLUMNS);
        let row: Option<ColdCallRow> = sqlx::query_as(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| r.into()))
    }

    async fn list_cold_calls(&self, bdr_id: i64) -> StorageResult<Vec<ColdCallRecord>> {
        let query = format!(
            "SELECT {} FROM cold_calls WHERE bdr_id = ? ORDER BY timestamp DESC, id DESC",
            COLD_CALL_COLUMNS
        );
        let rows: Vec<ColdCallRow> = sqlx::query_as(&query)
            .bind(bdr_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    async fn list_all_cold_calls(&self) -> StorageResult<Vec<ColdCallListing>> {
        let query = format!(
            "SELECT bdrs.name AS bdr_name, {} FROM cold_calls \
             JOIN bdrs ON bdrs.id = cold_calls.bdr_id \
             ORDER BY cold_calls.timestamp DESC, cold_calls.id DESC",
            COLD_CALL_COLUMNS
        );
        let rows: Vec<ColdCallListingRow> = sqlx::query_as(&query).fetch_all(&self.pool).await?;

        Ok(rows
            .into_iter()
            .map(|r| ColdCallListing {
                bdr_name: r.bdr_name,
                call: r.call.into(),
            })
            .collect())
    }

    async fn delete_cold_call(&self, id: i64) -> StorageResult<bool> {
        let result = sqlx::query("DELETE FROM cold_calls WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_all_cold_calls(&self) -> StorageResult<u64> {
        let result = sqlx::query("DELETE FROM cold_calls")
            .execute(&self.pool)
            .await?;

        info!(deleted = result.rows_affected(), "All cold calls deleted");
        Ok(result.rows_affected())
    }

    async fn cold_call_scores(&self, filter: ScoreFilter) -> StorageResult<Vec<RubricScoreSet>> {
        let since = filter.since.as_ref().map(format_timestamp);
        let rows: Vec<ScoreRow> = sqlx::query_as(
            r#"
            SELECT warmer_score, reframe_score, rational_drowning_score,
                   emotional_impact_score, new_way_score, your_solution_score
            FROM cold_calls
            WHERE (? IS NULL OR bdr_id = ?)
              AND (? IS NULL OR timestamp >= ?)
            ORDER BY timestamp ASC, id ASC
            "#,
        )
        .bind(filter.bdr_id)
        .bind(filter.bdr_id)
        .bind(&since)
        .bind(&since)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    async fn create_meeting(&self, meeting: &NewMeeting) -> StorageResult<MeetingRecord> {
        let result = sqlx::query(
            r#"
            INSERT INTO analyses (bdr_id, timestamp, summary, goals)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(meeting.bdr_id)
        .bind(format_timestamp(&meeting.timestamp))
        .bind(&meeting.summary)
        .bind(&meeting.goals)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        debug!(meeting_id = id, bdr_id = meeting.bdr_id, "Meeting stored");

        Ok(MeetingRecord {
            id,
            bdr_id: meeting.bdr_id,
            timestamp: meeting.timestamp,
            summary: meeting.summary.clone(),
            goals: meeting.goals.clone(),
        })
    }

    async fn list_meetings(&self, bdr_id: i64) -> StorageResult<Vec<MeetingRecord>> {
        let rows: Vec<MeetingRow> = sqlx::query_as(
            r#"
            SELECT id, bdr_id, timestamp, summary, goals
            FROM analyses
            WHERE bdr_id = ?
            ORDER BY timestamp DESC, id DESC
            "#,
        )
        .bind(bdr_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    async fn latest_meeting(&self, bdr_id: i64) -> StorageResult<Option<MeetingRecord>> {
        let row: Option<MeetingRow> = sqlx::query_as(
            r#"
            SELECT id, bdr_id, timestamp, summary, goals
            FROM analyses
            WHERE bdr_id = ?
            ORDER BY timestamp DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(bdr_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into()))
    }

    async fn delete_meeting(&self, id: i64) -> StorageResult<bool> {
        let result = sqlx::query("DELETE FROM analyses WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_all_meetings(&self) -> StorageResult<u64> {
        let result = sqlx::query("DELETE FROM analyses")
            .execute(&self.pool)
            .await?;

        info!(deleted = result.rows_affected(), "All meetings deleted");
        Ok(result.rows_affected())
    }

    async fn stats(&self) -> StorageResult<Stats> {
        let row: StatsRow = sqlx::query_as(
            r#"
            SELECT
                (SELECT COUNT(*) FROM bdrs) AS bdrs,
                (SELECT COUNT(*) FROM analyses) AS meetings,
                (SELECT COUNT(*) FROM cold_calls) AS cold_calls
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(Stats {
            bdrs: row.bdrs,
            meetings: row.meetings,
            cold_calls: row.cold_calls,
        })
    }
}

// Internal row types for SQLx mapping

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn score_from_column(value: i64) -> u8 {
    u8::try_from(value).unwrap_or(FALLBACK_SCORE)
}

#[derive(sqlx::FromRow)]
struct BdrRow {
    id: i64,
    name: String,
}

impl From<BdrRow> for Bdr {
    fn from(row: BdrRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ScoreRow {
    warmer_score: i64,
    reframe_score: i64,
    rational_drowning_score: i64,
    emotional_impact_score: i64,
    new_way_score: i64,
    your_solution_score: i64,
}

impl From<ScoreRow> for RubricScoreSet {
    fn from(row: ScoreRow) -> Self {
        RubricScoreSet::from_array(
            [
                row.warmer_score,
                row.reframe_score,
                row.rational_drowning_score,
                row.emotional_impact_score,
                row.new_way_score,
                row.your_solution_score,
            ]
            .map(score_from_column),
        )
    }
}

#[derive(sqlx::FromRow)]
struct ColdCallRow {
    id: i64,
    bdr_id: i64,
    timestamp: String,
    subject_name: Option<String>,
    subject_company: Option<String>,
    #[sqlx(flatten)]
    scores: ScoreRow,
    full_analysis: Option<String>,
    attention_points: Option<String>,
    recommendations: Option<String>,
    commercial_insight: Option<String>,
    fallback_stages: Option<String>,
}

impl From<ColdCallRow> for ColdCallRecord {
    fn from(row: ColdCallRow) -> Self {
        Self {
            id: row.id,
            bdr_id: row.bdr_id,
            timestamp: parse_timestamp(&row.timestamp),
            prospect_name: row.subject_name.unwrap_or_default(),
            prospect_company: row.subject_company.unwrap_or_default(),
            scores: row.scores.into(),
            full_analysis: row.full_analysis.unwrap_or_default(),
            attention_points: row.attention_points.unwrap_or_default(),
            recommendations: row.recommendations.unwrap_or_default(),
            commercial_insight: row.commercial_insight,
            fallback_stages: decode_stages(row.fallback_stages.as_deref()),
        }
    }
}

#[derive(sqlx::FromRow)]
struct ColdCallListingRow {
    bdr_name: String,
    #[sqlx(flatten)]
    call: ColdCallRow,
}

#[derive(sqlx::FromRow)]
struct MeetingRow {
    id: i64,
    bdr_id: i64,
    timestamp: String,
    summary: Option<String>,
    goals: Option<String>,
}

impl From<MeetingRow> for MeetingRecord {
    fn from(row: MeetingRow) -> Self {
        Self {
            id: row.id,
            bdr_id: row.bdr_id,
            timestamp: parse_timestamp(&row.timestamp),
            summary: row.summary.unwrap_or_default(),
            goals: row.goals.unwrap_or_default(),
        }
    }
}

#[derive(sqlx::FromRow)]
struct StatsRow {
    bdrs: i64,
    meetings: i64,
    cold_calls: i64,
}
