//! Storage layer for BDRs and their analyzed conversations.
//!
//! Cold-call and meeting records are append-only: the only record-level
//! mutation is deletion. Deleting a BDR removes its records inside a single
//! transaction.

mod sqlite;

#[cfg(test)]
#[path = "types_tests.rs"]
mod types_tests;

pub use sqlite::SqliteStorage;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StorageResult;
use crate::rubric::{RubricScoreSet, Stage};

/// A sales representative whose calls and meetings are tracked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bdr {
    pub id: i64,
    /// Unique display name.
    pub name: String,
}

/// A scored cold call ready to be inserted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewColdCall {
    pub bdr_id: i64,
    pub timestamp: DateTime<Utc>,
    pub prospect_name: String,
    pub prospect_company: String,
    pub scores: RubricScoreSet,
    /// Raw narrative, stored verbatim.
    pub full_analysis: String,
    pub attention_points: String,
    pub recommendations: String,
    pub commercial_insight: Option<String>,
    /// Stages whose score was substituted during extraction.
    pub fallback_stages: Vec<Stage>,
}

impl NewColdCall {
    /// Create a cold call timestamped now.
    pub fn new(
        bdr_id: i64,
        prospect_name: impl Into<String>,
        prospect_company: impl Into<String>,
        scores: RubricScoreSet,
    ) -> Self {
        Self {
            bdr_id,
            timestamp: Utc::now(),
            prospect_name: prospect_name.into(),
            prospect_company: prospect_company.into(),
            scores,
            full_analysis: String::new(),
            attention_points: String::new(),
            recommendations: String::new(),
            commercial_insight: None,
            fallback_stages: Vec::new(),
        }
    }

    /// Set the narrative and its extracted sections.
    pub fn with_analysis(
        mut self,
        full_analysis: impl Into<String>,
        attention_points: impl Into<String>,
        recommendations: impl Into<String>,
    ) -> Self {
        self.full_analysis = full_analysis.into();
        self.attention_points = attention_points.into();
        self.recommendations = recommendations.into();
        self
    }

    /// Set the commercial insight used on the call.
    pub fn with_commercial_insight(mut self, insight: impl Into<String>) -> Self {
        self.commercial_insight = Some(insight.into());
        self
    }

    /// Record which stages fell back to the default score.
    pub fn with_fallback_stages(mut self, stages: Vec<Stage>) -> Self {
        self.fallback_stages = stages;
        self
    }

    /// Override the timestamp.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// A stored cold call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColdCallRecord {
    pub id: i64,
    pub bdr_id: i64,
    pub timestamp: DateTime<Utc>,
    pub prospect_name: String,
    pub prospect_company: String,
    pub scores: RubricScoreSet,
    pub full_analysis: String,
    pub attention_points: String,
    pub recommendations: String,
    pub commercial_insight: Option<String>,
    #[serde(default)]
    pub fallback_stages: Vec<Stage>,
}

/// A cold call listed together with its BDR's name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColdCallListing {
    pub bdr_name: String,
    #[serde(flatten)]
    pub call: ColdCallRecord,
}

/// A 1:1 meeting analysis ready to be inserted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMeeting {
    pub bdr_id: i64,
    pub timestamp: DateTime<Utc>,
    pub summary: String,
    pub goals: String,
}

impl NewMeeting {
    /// Create a meeting timestamped now.
    pub fn new(bdr_id: i64, summary: impl Into<String>, goals: impl Into<String>) -> Self {
        Self {
            bdr_id,
            timestamp: Utc::now(),
            summary: summary.into(),
            goals: goals.into(),
        }
    }

    /// Override the timestamp.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// A stored 1:1 meeting analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingRecord {
    pub id: i64,
    pub bdr_id: i64,
    pub timestamp: DateTime<Utc>,
    pub summary: String,
    pub goals: String,
}

/// Rows removed by a BDR cascade delete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CascadeDelete {
    pub cold_calls: u64,
    pub meetings: u64,
}

/// Row counts across the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub bdrs: i64,
    pub meetings: i64,
    pub cold_calls: i64,
}

/// Which cold calls contribute to an aggregate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScoreFilter {
    /// Restrict to one BDR; `None` means every BDR.
    pub bdr_id: Option<i64>,
    /// Only calls at or after this instant.
    pub since: Option<DateTime<Utc>>,
}

impl ScoreFilter {
    /// Every cold call.
    pub fn all() -> Self {
        Self::default()
    }

    /// Cold calls of one BDR.
    pub fn for_bdr(bdr_id: i64) -> Self {
        Self {
            bdr_id: Some(bdr_id),
            since: None,
        }
    }

    /// Restrict to calls at or after `since`.
    pub fn since(mut self, since: Option<DateTime<Utc>>) -> Self {
        self.since = since;
        self
    }
}

/// Stored timestamp format. Fixed width so text comparison orders correctly.
pub(crate) fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Serialize fallback stages for the `fallback_stages` column.
pub(crate) fn encode_stages(stages: &[Stage]) -> Option<String> {
    if stages.is_empty() {
        None
    } else {
        Some(
            stages
                .iter()
                .map(|s| s.key())
                .collect::<Vec<_>>()
                .join(","),
        )
    }
}

/// Parse the `fallback_stages` column, skipping unknown keys.
pub(crate) fn decode_stages(raw: Option<&str>) -> Vec<Stage> {
    raw.map(|s| s.split(',').filter_map(|key| key.trim().parse().ok()).collect())
        .unwrap_or_default()
}

/// Storage trait for database operations.
#[async_trait]
pub trait Storage: Send + Sync {
    // BDR operations

    /// Create a BDR. Fails with `Conflict` when the name is taken.
    async fn create_bdr(&self, name: &str) -> StorageResult<Bdr>;
    /// Rename a BDR. Fails with `Conflict` or `BdrNotFound`.
    async fn rename_bdr(&self, id: i64, name: &str) -> StorageResult<Bdr>;
    /// Get a BDR by ID.
    async fn get_bdr(&self, id: i64) -> StorageResult<Option<Bdr>>;
    /// All BDRs ordered by name.
    async fn list_bdrs(&self) -> StorageResult<Vec<Bdr>>;
    /// Delete a BDR and all of its records atomically.
    async fn delete_bdr(&self, id: i64) -> StorageResult<CascadeDelete>;

    // Cold call operations

    /// Insert a cold call and return the stored record.
    async fn create_cold_call(&self, call: &NewColdCall) -> StorageResult<ColdCallRecord>;
    /// Get a cold call by ID.
    async fn get_cold_call(&self, id: i64) -> StorageResult<Option<ColdCallRecord>>;
    /// Cold calls of one BDR, newest first.
    async fn list_cold_calls(&self, bdr_id: i64) -> StorageResult<Vec<ColdCallRecord>>;
    /// Cold calls of every BDR with the BDR name, newest first.
    async fn list_all_cold_calls(&self) -> StorageResult<Vec<ColdCallListing>>;
    /// Delete one cold call. Returns whether a row was removed.
    async fn delete_cold_call(&self, id: i64) -> StorageResult<bool>;
    /// Delete every cold call. Returns the number removed.
    async fn delete_all_cold_calls(&self) -> StorageResult<u64>;
    /// Score sets of the cold calls matching `filter`.
    async fn cold_call_scores(&self, filter: ScoreFilter) -> StorageResult<Vec<RubricScoreSet>>;

    // Meeting operations

    /// Insert a meeting analysis and return the stored record.
    async fn create_meeting(&self, meeting: &NewMeeting) -> StorageResult<MeetingRecord>;
    /// Meetings of one BDR, newest first.
    async fn list_meetings(&self, bdr_id: i64) -> StorageResult<Vec<MeetingRecord>>;
    /// Most recent meeting of one BDR.
    async fn latest_meeting(&self, bdr_id: i64) -> StorageResult<Option<MeetingRecord>>;
    /// Delete one meeting. Returns whether a row was removed.
    async fn delete_meeting(&self, id: i64) -> StorageResult<bool>;
    /// Delete every meeting. Returns the number removed.
    async fn delete_all_meetings(&self) -> StorageResult<u64>;

    /// Row counts.
    async fn stats(&self) -> StorageResult<Stats>;
}
