use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::aggregation::{average_scores, render_summary, summarize, AggregateResult, Period, PerformanceSummary};
use crate::chart::{render_radar, ChartImage};
use crate::error::{AppResult, StorageError};
use crate::rubric::Language;
use crate::storage::{ScoreFilter, Storage};

/// Which cold calls a dashboard covers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardRequest {
    /// One BDR, or every BDR when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bdr_id: Option<i64>,
    #[serde(default)]
    pub period: Period,
    #[serde(default)]
    pub language: Language,
}

/// Aggregated scores with their summary and chart
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardReport {
    /// BDR name, or the "all BDRs" label
    pub scope: String,
    pub bdr_id: Option<i64>,
    pub period: Period,
    pub aggregate: AggregateResult,
    /// Absent when no cold call falls in the window
    pub summary: Option<PerformanceSummary>,
    pub summary_text: Option<String>,
    pub chart: Option<ChartImage>,
}

fn all_bdrs_label(language: Language) -> &'static str {
    match language {
        Language::English => "All BDRs",
        Language::Portuguese => "Todos os BDRs",
    }
}

/// Build a dashboard relative to `now`.
pub async fn build_dashboard(
    storage: &dyn Storage,
    request: DashboardRequest,
    now: DateTime<Utc>,
) -> AppResult<DashboardReport> {
    let scope = match request.bdr_id {
        Some(bdr_id) => {
            storage
                .get_bdr(bdr_id)
                .await?
                .ok_or(StorageError::BdrNotFound { bdr_id })?
                .name
        }
        None => all_bdrs_label(request.language).to_string(),
    };

    let filter = ScoreFilter {
        bdr_id: request.bdr_id,
        since: request.period.since(now),
    };
    let scores = storage.cold_call_scores(filter).await?;
    let aggregate = average_scores(&scores);
    let summary = summarize(&aggregate);

    let summary_text = summary
        .as_ref()
        .map(|s| render_summary(s, &aggregate.averages, request.period, request.language));
    let chart = summary
        .as_ref()
        .map(|_| render_radar(aggregate.averages, &scope));

    info!(
        scope = %scope,
        period = %request.period,
        count = aggregate.count,
        "Dashboard built"
    );

    Ok(DashboardReport {
        scope,
        bdr_id: request.bdr_id,
        period: request.period,
        aggregate,
        summary,
        summary_text,
        chart,
    })
}
