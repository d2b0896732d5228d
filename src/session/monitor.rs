//! Synchronous session controller
//!
//! [`Monitor`] wires a validated configuration, one detector per modality and
//! a [`Session`] together. It is the single-threaded entry point; the async
//! [`crate::runtime::MonitorRuntime`] drives the same session from per-stream
//! tasks.

use super::{Session, SessionState};
use crate::alerts::AlertSink;
use crate::config::MonitorConfig;
use crate::detectors::{AudioDetector, Detector, FaceAnalyzer, ObjectDetector};
use crate::error::ProctorError;
use crate::report::Report;
use crate::schema::Observation;
use crate::store::ReportStore;
use crate::types::{AudioObservation, Event, FaceObservation, ObjectObservation};
use chrono::{DateTime, Utc};
use log::{info, warn};
use std::sync::Arc;

pub struct Monitor {
    config: MonitorConfig,
    session: Session,
    face: FaceAnalyzer,
    objects: ObjectDetector,
    audio: AudioDetector,
}

impl Monitor {
    /// Create a monitor; fails fast on invalid configuration
    pub fn new(candidate_id: impl Into<String>, config: MonitorConfig) -> Result<Self, ProctorError> {
        config.validate()?;
        Ok(Self {
            face: FaceAnalyzer::new(&config),
            objects: ObjectDetector::new(&config),
            audio: AudioDetector::new(&config),
            session: Session::new(candidate_id),
            config,
        })
    }

    pub fn with_alert_sink(mut self, sink: Arc<dyn AlertSink>) -> Self {
        self.session = self.session.with_alert_sink(sink);
        self
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn start(&mut self, now: DateTime<Utc>) -> Result<(), ProctorError> {
        self.session.start(now)?;
        self.reset_detectors();
        Ok(())
    }

    pub fn observe_face(
        &mut self,
        frame: &FaceObservation,
        now: DateTime<Utc>,
    ) -> Result<Vec<Event>, ProctorError> {
        self.session.observe(&mut self.face, frame, now)
    }

    pub fn observe_objects(
        &mut self,
        poll: &ObjectObservation,
        now: DateTime<Utc>,
    ) -> Result<Vec<Event>, ProctorError> {
        self.session.observe(&mut self.objects, poll, now)
    }

    pub fn observe_audio(
        &mut self,
        tick: &AudioObservation,
        now: DateTime<Utc>,
    ) -> Result<Vec<Event>, ProctorError> {
        self.session.observe(&mut self.audio, tick, now)
    }

    /// Route an observation to the detector for its modality
    pub fn observe(
        &mut self,
        observation: &Observation,
        now: DateTime<Utc>,
    ) -> Result<Vec<Event>, ProctorError> {
        match observation {
            Observation::Face(frame) => self.observe_face(frame, now),
            Observation::Objects(poll) => self.observe_objects(poll, now),
            Observation::Audio(tick) => self.observe_audio(tick, now),
        }
    }

    pub fn end(&mut self, now: DateTime<Utc>) -> Result<Report, ProctorError> {
        self.session.end(now)
    }

    /// Replace the session with a fresh idle one and reset every detector
    ///
    /// Only allowed when the session is idle or ended. The previous session is
    /// left untouched, so handles cloned from it still see it ended with its
    /// report.
    pub fn reset(&mut self) -> Result<(), ProctorError> {
        if self.session.state() == SessionState::Monitoring {
            return Err(ProctorError::SessionAlreadyStarted);
        }

        let mut session = Session::new(self.session.candidate_id());
        if let Some(sink) = self.session.alert_sink() {
            session = session.with_alert_sink(sink);
        }
        self.session = session;
        self.reset_detectors();
        info!("monitor for {} reset", self.session.candidate_id());
        Ok(())
    }

    /// Persist the ended session's report
    ///
    /// On failure the report stays available through [`Session::report`].
    pub fn save_report(&self, store: &dyn ReportStore) -> Result<Report, ProctorError> {
        let report = match self.session.report() {
            Some(report) => report,
            None => {
                return Err(ProctorError::ReportSaveFailed(format!(
                    "session is {}, not ended",
                    self.session.state().as_str()
                )))
            }
        };

        store.save_report(&report).map_err(|e| {
            warn!("report {} not saved: {}", report.report_id, e);
            match e {
                ProctorError::ReportSaveFailed(msg) => ProctorError::ReportSaveFailed(msg),
                other => ProctorError::ReportSaveFailed(other.to_string()),
            }
        })?;
        Ok(report)
    }

    fn reset_detectors(&mut self) {
        self.face.reset();
        self.objects.reset();
        self.audio.reset();
    }
}
