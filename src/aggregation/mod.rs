//! Rubric averages and dashboard summaries.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::rubric::{Language, RubricScoreSet, Stage};

/// Mean score per stage, rounded to one decimal place.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AverageScores {
    pub warmer: f64,
    pub reframe: f64,
    pub rational_drowning: f64,
    pub emotional_impact: f64,
    pub new_way: f64,
    pub your_solution: f64,
}

impl AverageScores {
    /// Build from six values in [`Stage::ALL`] order.
    pub fn from_array(values: [f64; 6]) -> Self {
        Self {
            warmer: values[0],
            reframe: values[1],
            rational_drowning: values[2],
            emotional_impact: values[3],
            new_way: values[4],
            your_solution: values[5],
        }
    }

    /// Average for a stage.
    pub fn get(&self, stage: Stage) -> f64 {
        match stage {
            Stage::Warmer => self.warmer,
            Stage::Reframe => self.reframe,
            Stage::RationalDrowning => self.rational_drowning,
            Stage::EmotionalImpact => self.emotional_impact,
            Stage::NewWay => self.new_way,
            Stage::YourSolution => self.your_solution,
        }
    }

    /// Averages in methodology order.
    pub fn to_array(&self) -> [f64; 6] {
        Stage::ALL.map(|stage| self.get(stage))
    }

    /// `(stage, average)` pairs in methodology order.
    pub fn iter(&self) -> impl Iterator<Item = (Stage, f64)> + '_ {
        Stage::ALL.into_iter().map(move |stage| (stage, self.get(stage)))
    }
}

impl From<&RubricScoreSet> for AverageScores {
    fn from(scores: &RubricScoreSet) -> Self {
        Self::from_array(scores.to_array().map(f64::from))
    }
}

/// Averages over a set of records plus how many records contributed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateResult {
    pub averages: AverageScores,
    pub count: usize,
}

/// Round to one decimal place.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Arithmetic mean of each stage across `records`.
///
/// An empty input is not an error: it yields all-zero averages and a count
/// of 0.
pub fn average_scores(records: &[RubricScoreSet]) -> AggregateResult {
    if records.is_empty() {
        return AggregateResult::default();
    }

    let mut sums = [0u64; 6];
    for record in records {
        for (sum, value) in sums.iter_mut().zip(record.to_array()) {
            *sum += u64::from(value);
        }
    }

    let count = records.len();
    let averages = sums.map(|sum| round1(sum as f64 / count as f64));

    AggregateResult {
        averages: AverageScores::from_array(averages),
        count,
    }
}

/// Time window a dashboard is computed over.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Period {
    #[serde(rename = "7d")]
    Last7Days,
    #[serde(rename = "30d")]
    Last30Days,
    #[serde(rename = "90d")]
    Last90Days,
    #[default]
    #[serde(rename = "all")]
    All,
}

impl Period {
    /// Earliest timestamp inside the window, or `None` for all time.
    pub fn since(self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let days = match self {
            Period::Last7Days => 7,
            Period::Last30Days => 30,
            Period::Last90Days => 90,
            Period::All => return None,
        };
        Some(now - Duration::days(days))
    }

    fn describe(self, language: Language) -> &'static str {
        match (self, language) {
            (Period::Last7Days, Language::English) => "the last 7 days",
            (Period::Last30Days, Language::English) => "the last 30 days",
            (Period::Last90Days, Language::English) => "the last 90 days",
            (Period::All, Language::English) => "all time",
            (Period::Last7Days, Language::Portuguese) => "dos últimos 7 dias",
            (Period::Last30Days, Language::Portuguese) => "dos últimos 30 dias",
            (Period::Last90Days, Language::Portuguese) => "dos últimos 90 dias",
            (Period::All, Language::Portuguese) => "de todo o período",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Period::Last7Days => "7d",
            Period::Last30Days => "30d",
            Period::Last90Days => "90d",
            Period::All => "all",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for Period {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "7d" => Ok(Period::Last7Days),
            "30d" => Ok(Period::Last30Days),
            "90d" => Ok(Period::Last90Days),
            "all" => Ok(Period::All),
            _ => Err(format!("Unknown period: {} (expected 7d, 30d, 90d or all)", s)),
        }
    }
}

/// Overall performance level for a dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreBand {
    Excellent,
    Good,
    Fair,
    NeedsImprovement,
}

impl ScoreBand {
    /// Band for an average score.
    pub fn for_score(score: f64) -> Self {
        if score >= 8.0 {
            ScoreBand::Excellent
        } else if score >= 6.0 {
            ScoreBand::Good
        } else if score >= 4.0 {
            ScoreBand::Fair
        } else {
            ScoreBand::NeedsImprovement
        }
    }

    fn describe(self, language: Language) -> &'static str {
        match (self, language) {
            (ScoreBand::Excellent, Language::English) => "excellent",
            (ScoreBand::Good, Language::English) => "good",
            (ScoreBand::Fair, Language::English) => "fair",
            (ScoreBand::NeedsImprovement, Language::English) => "needs improvement",
            (ScoreBand::Excellent, Language::Portuguese) => "excelente",
            (ScoreBand::Good, Language::Portuguese) => "boa",
            (ScoreBand::Fair, Language::Portuguese) => "regular",
            (ScoreBand::NeedsImprovement, Language::Portuguese) => "que precisa melhorar",
        }
    }
}

/// Strongest and weakest stages plus the overall level of an aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSummary {
    /// Mean of the six stage averages, one decimal.
    pub overall: f64,
    pub band: ScoreBand,
    pub strongest: Stage,
    pub weakest: Stage,
    pub count: usize,
}

/// Summarize an aggregate. Returns `None` when no records contributed.
///
/// Ties resolve to the earliest stage in methodology order.
pub fn summarize(aggregate: &AggregateResult) -> Option<PerformanceSummary> {
    if aggregate.count == 0 {
        return None;
    }

    let averages = &aggregate.averages;
    let overall = round1(averages.to_array().iter().sum::<f64>() / Stage::ALL.len() as f64);

    let mut strongest = Stage::Warmer;
    let mut weakest = Stage::Warmer;
    for (stage, value) in averages.iter() {
        if value > averages.get(strongest) {
            strongest = stage;
        }
        if value < averages.get(weakest) {
            weakest = stage;
        }
    }

    Some(PerformanceSummary {
        overall,
        band: ScoreBand::for_score(overall),
        strongest,
        weakest,
        count: aggregate.count,
    })
}

/// Markdown text for the dashboard, in the dashboard language.
pub fn render_summary(
    summary: &PerformanceSummary,
    averages: &AverageScores,
    period: Period,
    language: Language,
) -> String {
    let best = summary.strongest.label();
    let worst = summary.weakest.label();
    let best_value = averages.get(summary.strongest);
    let worst_value = averages.get(summary.weakest);
    let band = summary.band.describe(language);
    let window = period.describe(language);

    match language {
        Language::English => format!(
            "### OVERALL ANALYSIS\n\
             Performance is {band} with an average score of {overall:.1}/10 across {count} analyses from {window}.\n\n\
             ### STRENGTHS\n\
             - {best}: {best_value:.1}/10 - strongest stage\n\
             - Overall average: {overall:.1}/10\n\n\
             ### ATTENTION POINTS\n\
             - {worst}: {worst_value:.1}/10 - stage that needs the most attention\n\
             - Focus on improving {worst_lower} techniques\n\n\
             ### RECOMMENDATIONS\n\
             - Train {worst} specifically\n\
             - Keep up the good work on {best}\n\
             - Analyze more calls for more consistent data",
            band = band,
            overall = summary.overall,
            count = summary.count,
            window = window,
            best = best,
            best_value = best_value,
            worst = worst,
            worst_value = worst_value,
            worst_lower = worst.to_lowercase(),
        ),
        Language::Portuguese => format!(
            "### ANÁLISE GERAL\n\
             Performance {band} com score médio de {overall:.1}/10 baseado em {count} análises {window}.\n\n\
             ### PONTOS FORTES\n\
             - {best}: {best_value:.1}/10 - Esta é a área de maior destaque\n\
             - Score médio geral: {overall:.1}/10\n\n\
             ### PONTOS DE ATENÇÃO\n\
             - {worst}: {worst_value:.1}/10 - Área que precisa de mais atenção\n\
             - Foco em melhorar as técnicas de {worst_lower}\n\n\
             ### RECOMENDAÇÕES\n\
             - Treinar especificamente a área de {worst}\n\
             - Manter o bom desempenho em {best}\n\
             - Realizar mais análises para ter dados mais consistentes",
            band = band,
            overall = summary.overall,
            count = summary.count,
            window = window,
            best = best,
            best_value = best_value,
            worst = worst,
            worst_value = worst_value,
            worst_lower = worst.to_lowercase(),
        ),
    }
}
