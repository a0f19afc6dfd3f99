//! Unit tests for storage record types and column encodings.

use super::*;
use chrono::TimeZone;

#[test]
fn test_new_cold_call_builder() {
    let call = NewColdCall::new(3, "Ana", "Acme", RubricScoreSet::uniform(7))
        .with_analysis("full", "attention", "recs")
        .with_commercial_insight("Churn is up 12%")
        .with_fallback_stages(vec![Stage::NewWay]);

    assert_eq!(call.bdr_id, 3);
    assert_eq!(call.prospect_company, "Acme");
    assert_eq!(call.full_analysis, "full");
    assert_eq!(call.attention_points, "attention");
    assert_eq!(call.recommendations, "recs");
    assert_eq!(call.commercial_insight.as_deref(), Some("Churn is up 12%"));
    assert_eq!(call.fallback_stages, vec![Stage::NewWay]);
}

#[test]
fn test_new_meeting_with_timestamp() {
    let ts = Utc.with_ymd_and_hms(2025, 5, 2, 9, 30, 0).unwrap();
    let meeting = NewMeeting::new(1, "summary", "goals").with_timestamp(ts);
    assert_eq!(meeting.timestamp, ts);
    assert_eq!(meeting.goals, "goals");
}

#[test]
fn test_format_timestamp_is_fixed_width() {
    let a = format_timestamp(&Utc.with_ymd_and_hms(2025, 1, 9, 0, 0, 0).unwrap());
    let b = format_timestamp(&Utc.with_ymd_and_hms(2025, 1, 10, 0, 0, 0).unwrap());
    assert_eq!(a, "2025-01-09T00:00:00.000Z");
    assert_eq!(a.len(), b.len());
    assert!(a < b);
}

#[test]
fn test_encode_stages() {
    assert_eq!(encode_stages(&[]), None);
    assert_eq!(
        encode_stages(&[Stage::Warmer, Stage::YourSolution]).as_deref(),
        Some("warmer,your_solution")
    );
}

#[test]
fn test_decode_stages() {
    assert!(decode_stages(None).is_empty());
    assert_eq!(
        decode_stages(Some("rational_drowning, new_way,bogus")),
        vec![Stage::RationalDrowning, Stage::NewWay]
    );
}

#[test]
fn test_score_filter_builders() {
    let since = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
    assert_eq!(ScoreFilter::all(), ScoreFilter::default());
    let filter = ScoreFilter::for_bdr(9).since(Some(since));
    assert_eq!(filter.bdr_id, Some(9));
    assert_eq!(filter.since, Some(since));
}

#[test]
fn test_listing_serializes_flat() {
    let record = ColdCallRecord {
        id: 1,
        bdr_id: 2,
        timestamp: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        prospect_name: "Ana".to_string(),
        prospect_company: "Acme".to_string(),
        scores: RubricScoreSet::uniform(6),
        full_analysis: String::new(),
        attention_points: String::new(),
        recommendations: String::new(),
        commercial_insight: None,
        fallback_stages: vec![],
    };
    let listing = ColdCallListing {
        bdr_name: "Bruno".to_string(),
        call: record,
    };
    let value = serde_json::to_value(&listing).unwrap();
    assert_eq!(value["bdr_name"], "Bruno");
    assert_eq!(value["prospect_company"], "Acme");
    assert_eq!(value["scores"]["warmer"], 6);
}
