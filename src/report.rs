//! Session report
//!
//! A report is derived, never edited: it carries the full event log of a
//! finished session together with the summary the scoring engine computed
//! from that log. [`Report::is_consistent`] re-scores the events so a stored
//! report can be audited.

use crate::error::ProctorError;
use crate::scoring::{score, ScoreSummary};
use crate::types::Event;
use crate::{ENGINE_VERSION, PRODUCER_NAME};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Engine that produced the report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportProducer {
    pub name: String,
    pub version: String,
}

impl Default for ReportProducer {
    fn default() -> Self {
        Self {
            name: PRODUCER_NAME.to_string(),
            version: ENGINE_VERSION.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    /// Unique report identifier
    pub report_id: Uuid,
    /// Candidate the session monitored
    #[serde(alias = "candidateName")]
    pub candidate_id: String,
    /// Session start (UTC)
    pub started_at: Option<DateTime<Utc>>,
    /// Session end (UTC)
    pub ended_at: Option<DateTime<Utc>>,
    /// `ended_at - started_at` in milliseconds
    pub duration_ms: Option<i64>,
    /// Full event log, chronological
    #[serde(default)]
    pub events: Vec<Event>,
    #[serde(default)]
    pub summary: ScoreSummary,
    #[serde(default)]
    pub producer: ReportProducer,
}

impl Report {
    /// Build a report from a finished session's log
    pub fn assemble(
        candidate_id: impl Into<String>,
        started_at: Option<DateTime<Utc>>,
        ended_at: Option<DateTime<Utc>>,
        events: Vec<Event>,
    ) -> Self {
        let duration_ms = match (started_at, ended_at) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds()),
            _ => None,
        };
        let summary = score(&events);

        Self {
            report_id: Uuid::new_v4(),
            candidate_id: candidate_id.into(),
            started_at,
            ended_at,
            duration_ms,
            events,
            summary,
            producer: ReportProducer::default(),
        }
    }

    pub fn final_score(&self) -> i64 {
        self.summary.final_score
    }

    /// Whether the stored summary matches a fresh score of the stored events
    pub fn is_consistent(&self) -> bool {
        score(&self.events) == self.summary
    }

    /// Fields the persistence layer requires
    pub fn validate(&self) -> Result<(), ProctorError> {
        if self.candidate_id.trim().is_empty() {
            return Err(ProctorError::ReportSaveFailed(
                "candidateId is required".to_string(),
            ));
        }
        Ok(())
    }

    pub fn from_json(json: &str) -> Result<Self, ProctorError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, ProctorError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> Result<String, ProctorError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
