//! Integrity scoring
//!
//! A pure function over the event log. Each qualifying event subtracts a fixed
//! penalty from 100 and the result is floored at zero. The same events always
//! produce the same summary, so a stored report can be re-scored and checked.

use crate::types::{Event, EventKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Starting (and maximum) integrity score
pub const MAX_SCORE: i64 = 100;

pub const LOOKING_AWAY_DEDUCTION: i64 = 2;
pub const NO_FACE_DEDUCTION: i64 = 5;
pub const MULTIPLE_FACES_DEDUCTION: i64 = 10;
pub const PHONE_DEDUCTION: i64 = 20;
pub const BOOK_DEDUCTION: i64 = 10;

/// Aggregate of a session's events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreSummary {
    /// Number of events per kind name
    #[serde(default)]
    pub counts: BTreeMap<String, u32>,
    /// Sum of all penalties
    #[serde(default)]
    pub deductions: i64,
    /// `max(0, 100 - deductions)`
    #[serde(default = "default_final_score")]
    pub final_score: i64,
}

fn default_final_score() -> i64 {
    MAX_SCORE
}

impl Default for ScoreSummary {
    fn default() -> Self {
        Self {
            counts: BTreeMap::new(),
            deductions: 0,
            final_score: MAX_SCORE,
        }
    }
}

impl ScoreSummary {
    pub fn count(&self, kind: EventKind) -> u32 {
        self.counts.get(kind.as_str()).copied().unwrap_or(0)
    }
}

/// Penalty contributed by a single event
///
/// Object classes are matched case-insensitively by substring; a class that
/// mentions both "phone" and "book" pays both penalties.
pub fn deduction_for(event: &Event) -> i64 {
    match event.kind {
        EventKind::LookingAwayFlag => LOOKING_AWAY_DEDUCTION,
        EventKind::NoFaceDetected => NO_FACE_DEDUCTION,
        EventKind::MultipleFacesDetected => MULTIPLE_FACES_DEDUCTION,
        EventKind::ObjectDetected => {
            let class = event.object_class().unwrap_or_default().to_lowercase();
            let mut total = 0;
            if class.contains("phone") {
                total += PHONE_DEDUCTION;
            }
            if class.contains("book") {
                total += BOOK_DEDUCTION;
            }
            total
        }
        _ => 0,
    }
}

/// Score a sequence of events
pub fn score(events: &[Event]) -> ScoreSummary {
    let mut counts: BTreeMap<String, u32> = BTreeMap::new();
    let mut deductions = 0;

    for event in events {
        *counts.entry(event.kind.as_str().to_string()).or_insert(0) += 1;
        deductions += deduction_for(event);
    }

    ScoreSummary {
        counts,
        deductions,
        final_score: (MAX_SCORE - deductions).max(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn event(kind: EventKind) -> Event {
        Event::new(kind, Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap())
    }

    fn object(class: &str) -> Event {
        event(EventKind::ObjectDetected)
            .with("class", class)
            .with("score", 0.9)
            .with("bbox", vec![0.0, 0.0, 10.0, 10.0])
    }

    #[test]
    fn test_empty_log_scores_full_marks() {
        let summary = score(&[]);
        assert_eq!(summary, ScoreSummary::default());
        assert_eq!(summary.final_score, 100);
        assert_eq!(summary.deductions, 0);
    }

    #[test]
    fn test_flag_no_face_and_phone() {
        let events = vec![
            event(EventKind::LookingAwayFlag),
            event(EventKind::NoFaceDetected),
            object("cell phone"),
        ];
        let summary = score(&events);

        assert_eq!(summary.deductions, 27);
        assert_eq!(summary.final_score, 73);
        assert_eq!(summary.count(EventKind::ObjectDetected), 1);
        assert_eq!(summary.count(EventKind::LookingAwayFlag), 1);
    }

    #[test]
    fn test_score_is_floored_at_zero() {
        let events: Vec<Event> = (0..12).map(|_| event(EventKind::MultipleFacesDetected)).collect();
        let summary = score(&events);

        assert_eq!(summary.deductions, 120);
        assert_eq!(summary.final_score, 0);
        assert_eq!(summary.count(EventKind::MultipleFacesDetected), 12);
    }

    #[test]
    fn test_score_is_deterministic() {
        let events = vec![
            object("Book"),
            event(EventKind::BackgroundVoiceDetected),
            event(EventKind::LookingAwayEnd),
            object("laptop"),
        ];
        assert_eq!(score(&events), score(&events));
        assert_eq!(score(&events).deductions, 10);
    }

    #[test]
    fn test_non_penalized_kinds_are_counted() {
        let events = vec![
            event(EventKind::FaceDetected),
            event(EventKind::FaceMissingEnd),
            event(EventKind::DrowsinessDetected),
        ];
        let summary = score(&events);
        assert_eq!(summary.final_score, 100);
        assert_eq!(summary.counts.len(), 3);
    }

    #[test]
    fn test_object_class_matching_is_case_insensitive() {
        assert_eq!(deduction_for(&object("Cell Phone")), 20);
        assert_eq!(deduction_for(&object("NOTEBOOK")), 10);
        assert_eq!(deduction_for(&object("phonebook")), 30);
        assert_eq!(deduction_for(&event(EventKind::ObjectDetected)), 0);
    }

    #[test]
    fn test_summary_json_keys() {
        let json = serde_json::to_value(score(&[event(EventKind::NoFaceDetected)])).unwrap();
        assert_eq!(json["finalScore"], 95);
        assert_eq!(json["deductions"], 5);
        assert_eq!(json["counts"]["no_face_detected"], 1);

        let defaulted: ScoreSummary = serde_json::from_str("{}").unwrap();
        assert_eq!(defaulted.final_score, 100);
    }
}
