//! Face presence detection
//!
//! Absence is only confirmed once it has lasted `noFaceSeconds` without a
//! single face frame in between. The confirmed `no_face_detected` event is
//! stamped with the first missing frame, not the frame that crossed the
//! threshold. The candidate is assumed present when monitoring starts, so
//! `face_detected` only follows a confirmed absence, together with
//! `face_missing_end` closing the episode.

use super::{elapsed_seconds, seconds, Detector, ObserveContext};
use crate::config::MonitorConfig;
use crate::types::{Event, EventKind, FaceObservation};
use chrono::{DateTime, Duration, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaceState {
    Present,
    /// Absence confirmed (threshold crossed)
    Absent,
}

#[derive(Debug, Clone)]
pub struct PresenceDetector {
    no_face_threshold: Duration,
    state: FaceState,
    missing_since: Option<DateTime<Utc>>,
}

impl Default for PresenceDetector {
    fn default() -> Self {
        Self::new(&MonitorConfig::default())
    }
}

impl PresenceDetector {
    pub fn new(config: &MonitorConfig) -> Self {
        Self {
            no_face_threshold: seconds(config.no_face_seconds),
            state: FaceState::Present,
            missing_since: None,
        }
    }

    pub fn state(&self) -> FaceState {
        self.state
    }

    /// Onset of the current (possibly unconfirmed) absence
    pub fn missing_since(&self) -> Option<DateTime<Utc>> {
        self.missing_since
    }

    fn on_face(&mut self, now: DateTime<Utc>) -> Vec<Event> {
        let mut events = Vec::new();

        if self.state == FaceState::Absent {
            events.push(Event::new(EventKind::FaceDetected, now));
            if let Some(start) = self.missing_since {
                events.push(
                    Event::new(EventKind::FaceMissingEnd, now)
                        .with("start", start)
                        .with("end", now)
                        .with("durationSeconds", elapsed_seconds(start, now)),
                );
            }
        }

        self.state = FaceState::Present;
        self.missing_since = None;
        events
    }

    fn on_missing(&mut self, now: DateTime<Utc>) -> Vec<Event> {
        let start = *self.missing_since.get_or_insert(now);

        if self.state == FaceState::Absent || now - start < self.no_face_threshold {
            return Vec::new();
        }

        self.state = FaceState::Absent;
        vec![Event::new(EventKind::NoFaceDetected, start)
            .with("start", start)
            .with("detectedAt", now)
            .with("durationSeconds", elapsed_seconds(start, now))]
    }
}

impl Detector for PresenceDetector {
    type Sample = FaceObservation;

    fn name(&self) -> &'static str {
        "presence"
    }

    fn observe(&mut self, sample: &FaceObservation, ctx: &ObserveContext<'_>) -> Vec<Event> {
        if sample.face_count() > 0 {
            self.on_face(ctx.now)
        } else {
            self.on_missing(ctx.now)
        }
    }

    fn reset(&mut self) {
        self.state = FaceState::Present;
        self.missing_since = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Landmark;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn t(ms: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap() + Duration::milliseconds(ms)
    }

    fn face() -> FaceObservation {
        FaceObservation::single(vec![Landmark::new(0.5, 0.5)])
    }

    fn feed(detector: &mut PresenceDetector, sample: &FaceObservation, ms: i64) -> Vec<Event> {
        detector.observe(sample, &ObserveContext::at(t(ms)))
    }

    #[test]
    fn test_absence_exactly_at_threshold_fires_once_at_onset() {
        let mut detector = PresenceDetector::default();
        let mut events = feed(&mut detector, &face(), 0);
        assert!(events.is_empty());

        for ms in (1_000..=11_000).step_by(500) {
            events.extend(feed(&mut detector, &FaceObservation::empty(), ms));
        }

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::NoFaceDetected);
        assert_eq!(events[0].timestamp, t(1_000));
        assert_eq!(events[0].duration_seconds(), Some(10.0));
        assert_eq!(detector.state(), FaceState::Absent);
    }

    #[test]
    fn test_short_absence_emits_nothing_and_discards_onset() {
        let mut detector = PresenceDetector::default();
        feed(&mut detector, &face(), 0);

        let mut events = Vec::new();
        for ms in (1_000..=9_000).step_by(1_000) {
            events.extend(feed(&mut detector, &FaceObservation::empty(), ms));
        }
        events.extend(feed(&mut detector, &face(), 9_500));
        assert!(events.is_empty());
        assert_eq!(detector.missing_since(), None);

        // A new absence starts a fresh episode
        events.extend(feed(&mut detector, &FaceObservation::empty(), 10_000));
        events.extend(feed(&mut detector, &FaceObservation::empty(), 19_000));
        assert!(events.is_empty());
    }

    #[test]
    fn test_recovery_emits_face_detected_and_missing_end() {
        let mut detector = PresenceDetector::default();
        feed(&mut detector, &face(), 0);
        feed(&mut detector, &FaceObservation::empty(), 2_000);
        feed(&mut detector, &FaceObservation::empty(), 12_000);

        let events = feed(&mut detector, &face(), 15_000);
        let kinds: Vec<EventKind> = events.iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![EventKind::FaceDetected, EventKind::FaceMissingEnd]);
        assert_eq!(events[1].duration_seconds(), Some(13.0));
        assert_eq!(detector.state(), FaceState::Present);
    }

    #[test]
    fn test_absence_from_session_start_counts() {
        let mut detector = PresenceDetector::default();
        let mut events = feed(&mut detector, &FaceObservation::empty(), 0);
        events.extend(feed(&mut detector, &FaceObservation::empty(), 10_000));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].timestamp, t(0));
    }

    #[test]
    fn test_reset_clears_episode() {
        let mut detector = PresenceDetector::default();
        feed(&mut detector, &FaceObservation::empty(), 0);
        detector.reset();
        assert_eq!(detector.state(), FaceState::Present);
        assert!(feed(&mut detector, &FaceObservation::empty(), 9_000).is_empty());
    }

    #[test]
    fn test_face_detected_only_after_confirmed_absence() {
        let mut detector = PresenceDetector::default();
        assert!(feed(&mut detector, &face(), 0).is_empty());
        assert!(feed(&mut detector, &face(), 100).is_empty());

        feed(&mut detector, &FaceObservation::empty(), 1_000);
        assert!(feed(&mut detector, &face(), 3_000).is_empty());

        feed(&mut detector, &FaceObservation::empty(), 4_000);
        feed(&mut detector, &FaceObservation::empty(), 14_000);
        let kinds: Vec<EventKind> = feed(&mut detector, &face(), 14_500).iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![EventKind::FaceDetected, EventKind::FaceMissingEnd]);
    }
}
