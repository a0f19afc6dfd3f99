//! Structured extraction from generated narratives.
//!
//! Extraction never fails. Anything that cannot be read from the narrative is
//! replaced with a default and reported in [`ExtractedAnalysis::fallbacks`],
//! so a caller can always persist the result and still audit what was
//! substituted.
//!
//! Scores are found as `<label>`, then anything on the same line, then
//! `<integer>/10`; the first match wins and decimals count as unreadable.
//! Sections are found by splitting on [`SECTION_MARKER`] and searching each
//! segment for a header from [`SectionHeaders`]; the body is the text after
//! the header in that segment, passed through [`sanitize_text`]. A body that
//! is empty after sanitizing counts as missing.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use tracing::warn;

use crate::prompts::{SectionHeaders, SECTION_MARKER};
use crate::rubric::{is_valid_score, Language, RubricScoreSet, Stage, FALLBACK_SCORE};
use crate::validation::sanitize_text;


/// A field whose value was substituted because it could not be extracted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "field", content = "stage", rename_all = "snake_case")]
pub enum FallbackField {
    Score(Stage),
    AttentionPoints,
    Recommendations,
    Summary,
    Goals,
}

/// Result of extracting a cold-call narrative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedAnalysis {
    pub scores: RubricScoreSet,
    pub attention_points: String,
    pub recommendations: String,
    /// The raw narrative, unmodified.
    pub full_analysis: String,
    pub fallbacks: Vec<FallbackField>,
}

impl ExtractedAnalysis {
    /// Whether any default was substituted.
    pub fn fallback_applied(&self) -> bool {
        !self.fallbacks.is_empty()
    }

    /// Stages whose score is the fallback rather than a parsed value.
    pub fn fallback_stages(&self) -> Vec<Stage> {
        self.fallbacks
            .iter()
            .filter_map(|f| match f {
                FallbackField::Score(stage) => Some(*stage),
                _ => None,
            })
            .collect()
    }
}

/// Result of extracting a 1:1 meeting narrative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedMeeting {
    pub summary: String,
    pub goals: String,
    pub fallbacks: Vec<FallbackField>,
}

/// Placeholder stored when a cold-call section is missing.
pub fn section_placeholder(language: Language) -> &'static str {
    match language {
        Language::English => "See full analysis",
        Language::Portuguese => "Ver análise completa",
    }
}

/// Placeholder stored when a meeting summary is missing.
pub fn summary_placeholder(language: Language) -> &'static str {
    match language {
        Language::English => "Could not extract the summary.",
        Language::Portuguese => "Não foi possível extrair o resumo.",
    }
}

fn score_patterns() -> &'static [(Stage, Regex); 6] {
    static PATTERNS: OnceLock<[(Stage, Regex); 6]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        Stage::ALL.map(|stage| {
            let pattern = format!(
                r"(?i){}.*?([0-9]+(?:[.,][0-9]+)?)/10",
                regex::escape(stage.label())
            );
            let regex = Regex::new(&pattern).expect("stage score pattern should compile");
            (stage, regex)
        })
    })
}

/// Read one stage score from a narrative.
///
/// Returns `None` when the label is absent, not followed by `<integer>/10` on
/// the same line, or the integer is off the 0-10 scale.
pub fn extract_score(narrative: &str, stage: Stage) -> Option<u8> {
    let (_, regex) = score_patterns().iter().find(|(s, _)| *s == stage)?;
    let captured = regex.captures(narrative)?.get(1)?.as_str();
    let value: i64 = captured.parse().ok()?;
    if is_valid_score(value) {
        u8::try_from(value).ok()
    } else {
        None
    }
}

/// Read all six stage scores, substituting [`FALLBACK_SCORE`] where needed.
pub fn extract_scores(narrative: &str) -> (RubricScoreSet, Vec<Stage>) {
    let mut scores = RubricScoreSet::fallback();
    let mut missing = Vec::new();

    for stage in Stage::ALL {
        match extract_score(narrative, stage) {
            Some(value) => scores.set(stage, value),
            None => {
                scores.set(stage, FALLBACK_SCORE);
                missing.push(stage);
            }
        }
    }

    (scores, missing)
}

/// Case-insensitive matchers for every section header of both languages.
fn header_patterns() -> &'static [(&'static str, Regex)] {
    static PATTERNS: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [Language::English, Language::Portuguese]
            .into_iter()
            .flat_map(|language| {
                let h = SectionHeaders::for_language(language);
                [
                    h.scores,
                    h.detailed_analysis,
                    h.insight_evaluation,
                    h.attention_points,
                    h.recommendations,
                    h.meeting_summary,
                    h.meeting_goals,
                ]
            })
            .map(|header| {
                let pattern = format!("(?i){}", regex::escape(header));
                let regex = Regex::new(&pattern).expect("section header pattern should compile");
                (header, regex)
            })
            .collect()
    })
}

fn header_pattern(header: &str) -> Option<&'static Regex> {
    header_patterns()
        .iter()
        .find(|(known, _)| *known == header)
        .map(|(_, regex)| regex)
}

/// Bodies of the named sections, in the order of `headers`.
///
/// A segment is attributed to the first header it contains. When several
/// segments carry the same header the last one wins. Bodies are sanitized
/// before the emptiness check, so one made only of stripped characters
/// counts as missing.
fn extract_sections<const N: usize>(narrative: &str, headers: [&str; N]) -> [Option<String>; N] {
    let patterns = headers.map(header_pattern);
    let mut found: [Option<String>; N] = std::array::from_fn(|_| None);

    for segment in narrative.split(SECTION_MARKER) {
        for (slot, pattern) in found.iter_mut().zip(patterns) {
            if let Some(m) = pattern.and_then(|p| p.find(segment)) {
                *slot = Some(sanitize_text(&segment[m.end()..]));
                break;
            }
        }
    }

    found.map(|body| body.filter(|b| !b.is_empty()))
}

/// Extract scores and sections from a cold-call narrative.
pub fn extract(raw_narrative: &str, language: Language) -> ExtractedAnalysis {
    let headers = SectionHeaders::for_language(language);
    let (scores, missing_stages) = extract_scores(raw_narrative);
    let [attention, recommendations] = extract_sections(
        raw_narrative,
        [headers.attention_points, headers.recommendations],
    );

    let mut fallbacks: Vec<FallbackField> = missing_stages
        .into_iter()
        .map(FallbackField::Score)
        .collect();
    if attention.is_none() {
        fallbacks.push(FallbackField::AttentionPoints);
    }
    if recommendations.is_none() {
        fallbacks.push(FallbackField::Recommendations);
    }

    if !fallbacks.is_empty() {
        warn!(
            language = %language,
            fallbacks = ?fallbacks,
            "Narrative extraction applied fallback values"
        );
    }

    let placeholder = section_placeholder(language);
    ExtractedAnalysis {
        scores,
        attention_points: attention.unwrap_or_else(|| placeholder.to_string()),
        recommendations: recommendations.unwrap_or_else(|| placeholder.to_string()),
        full_analysis: raw_narrative.to_string(),
        fallbacks,
    }
}

/// Extract summary and goals from a 1:1 meeting narrative.
///
/// A missing summary becomes a fixed sentence; missing goals become the whole
/// narrative, sanitized, so nothing the model wrote is lost.
pub fn extract_meeting(raw_narrative: &str, language: Language) -> ExtractedMeeting {
    let headers = SectionHeaders::for_language(language);
    let [summary, goals] = extract_sections(
        raw_narrative,
        [headers.meeting_summary, headers.meeting_goals],
    );

    let mut fallbacks = Vec::new();
    if summary.is_none() {
        fallbacks.push(FallbackField::Summary);
    }
    if goals.is_none() {
        fallbacks.push(FallbackField::Goals);
    }
    if !fallbacks.is_empty() {
        warn!(
            language = %language,
            fallbacks = ?fallbacks,
            "Meeting extraction applied fallback values"
        );
    }

    ExtractedMeeting {
        summary: summary.unwrap_or_else(|| summary_placeholder(language).to_string()),
        goals: goals.unwrap_or_else(|| {
            Some(sanitize_text(raw_narrative))
                .filter(|text| !text.is_empty())
                .unwrap_or_else(|| section_placeholder(language).to_string())
        }),
        fallbacks,
    }
}
