//! Session lifecycle
//!
//! A [`Session`] is a cheaply cloneable handle to one monitoring session. All
//! writes go through a single mutex, which is the serialization point for the
//! event log: a detector's state update and the append of its events happen
//! under the same lock, so concurrent detector streams see a linearizable log.
//!
//! Lifecycle: `Idle -> Monitoring -> Ended`. `Ended` is terminal: once set,
//! `ended_at` and the report never change. Starting over means creating a new
//! session, which is what [`Monitor::reset`] does.

pub mod monitor;

pub use monitor::Monitor;

use crate::alerts::{dispatch, AlertSink};
use crate::detectors::{Detector, ObserveContext};
use crate::error::ProctorError;
use crate::event_log::EventLog;
use crate::report::Report;
use crate::scoring::{score, ScoreSummary};
use crate::types::Event;
use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Monitoring,
    Ended,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Monitoring => "monitoring",
            SessionState::Ended => "ended",
        }
    }
}

#[derive(Debug)]
struct SessionRecord {
    candidate_id: String,
    state: SessionState,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
    log: EventLog,
    report: Option<Report>,
}

#[derive(Clone)]
pub struct Session {
    inner: Arc<Mutex<SessionRecord>>,
    alerts: Option<Arc<dyn AlertSink>>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let record = self.lock();
        f.debug_struct("Session")
            .field("candidate_id", &record.candidate_id)
            .field("state", &record.state)
            .field("events", &record.log.len())
            .finish()
    }
}

impl Session {
    pub fn new(candidate_id: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SessionRecord {
                candidate_id: candidate_id.into(),
                state: SessionState::Idle,
                started_at: None,
                ended_at: None,
                log: EventLog::new(),
                report: None,
            })),
            alerts: None,
        }
    }

    /// Forward alert-worthy events to `sink` as they are appended
    pub fn with_alert_sink(mut self, sink: Arc<dyn AlertSink>) -> Self {
        self.alerts = Some(sink);
        self
    }

    pub fn alert_sink(&self) -> Option<Arc<dyn AlertSink>> {
        self.alerts.clone()
    }

    fn lock(&self) -> MutexGuard<'_, SessionRecord> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn candidate_id(&self) -> String {
        self.lock().candidate_id.clone()
    }

    pub fn state(&self) -> SessionState {
        self.lock().state
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.lock().started_at
    }

    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.lock().ended_at
    }

    /// `Idle -> Monitoring`
    pub fn start(&self, now: DateTime<Utc>) -> Result<(), ProctorError> {
        let mut record = self.lock();
        match record.state {
            SessionState::Monitoring => return Err(ProctorError::SessionAlreadyStarted),
            SessionState::Ended => return Err(ProctorError::SessionClosed),
            SessionState::Idle => {}
        }

        record.state = SessionState::Monitoring;
        record.started_at = Some(now);
        info!("session for {} started at {}", record.candidate_id, now.to_rfc3339());
        Ok(())
    }

    /// Run one sample through `detector` and append whatever it emits
    ///
    /// The state check, the detector update and the append happen under one
    /// lock. A closed or unstarted session rejects the sample before the
    /// detector sees it.
    pub fn observe<D: Detector>(
        &self,
        detector: &mut D,
        sample: &D::Sample,
        now: DateTime<Utc>,
    ) -> Result<Vec<Event>, ProctorError> {
        let events = {
            let mut record = self.lock();
            match record.state {
                SessionState::Idle => return Err(ProctorError::SessionNotStarted),
                SessionState::Ended => return Err(ProctorError::SessionClosed),
                SessionState::Monitoring => {}
            }

            let events = {
                let ctx = ObserveContext::new(now, record.log.tail(detector.lookback()));
                detector.observe(sample, &ctx)
            };
            for event in &events {
                debug!("{} detector: {}", detector.name(), event.message());
            }
            record.log.extend(events.iter().cloned());
            events
        };

        if let Some(sink) = &self.alerts {
            dispatch(sink.as_ref(), &events);
        }
        Ok(events)
    }

    /// `Monitoring -> Ended`; returns the report
    ///
    /// Idempotent: once ended, every call returns the same report and the
    /// end time is never moved.
    pub fn end(&self, now: DateTime<Utc>) -> Result<Report, ProctorError> {
        let mut record = self.lock();
        match record.state {
            SessionState::Idle => Err(ProctorError::SessionNotStarted),
            SessionState::Ended => record
                .report
                .clone()
                .ok_or_else(|| ProctorError::RuntimeError("ended session has no report".to_string())),
            SessionState::Monitoring => {
                let report = Report::assemble(
                    record.candidate_id.clone(),
                    record.started_at,
                    Some(now),
                    record.log.snapshot(),
                );
                record.state = SessionState::Ended;
                record.ended_at = Some(now);
                record.report = Some(report.clone());
                info!(
                    "session for {} ended with {} events, score {}",
                    record.candidate_id,
                    report.events.len(),
                    report.final_score()
                );
                Ok(report)
            }
        }
    }

    /// Snapshot of the log so far
    pub fn events(&self) -> Vec<Event> {
        self.lock().log.snapshot()
    }

    pub fn event_count(&self) -> usize {
        self.lock().log.len()
    }

    /// Live score of the log so far
    pub fn summary(&self) -> ScoreSummary {
        score(self.lock().log.as_slice())
    }

    /// Report of an ended session
    pub fn report(&self) -> Option<Report> {
        self.lock().report.clone()
    }
}
