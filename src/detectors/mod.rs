//! Event detectors
//!
//! Each detector is a small state machine that turns a stream of raw
//! perceptual samples into discrete, timestamped events. A detector owns its
//! in-progress state exclusively and never touches the event log directly:
//! it returns events, and the session appends them.
//!
//! Detectors fail closed. A sample they cannot interpret (missing landmark
//! indices, a malformed bounding box) produces no events and leaves the
//! in-progress episode untouched.

pub mod audio;
pub mod drowsiness;
pub mod face;
#[cfg(test)]
pub(crate) mod fixtures;
pub mod gaze;
pub mod multi_face;
pub mod object;
pub mod presence;

pub use audio::AudioDetector;
pub use drowsiness::{eye_aspect_ratio, DrowsinessDetector};
pub use face::FaceAnalyzer;
pub use gaze::{gaze_deviation, GazeDetector, GazeDeviation};
pub use multi_face::MultiFaceDetector;
pub use object::ObjectDetector;
pub use presence::PresenceDetector;

use crate::types::Event;
use chrono::{DateTime, Duration, Utc};

/// What a detector can see when it observes a sample
#[derive(Debug, Clone, Copy)]
pub struct ObserveContext<'a> {
    /// Logical time of the sample
    pub now: DateTime<Utc>,
    /// Trailing slice of the session log, as long as [`Detector::lookback`] asked for
    pub recent: &'a [Event],
}

impl<'a> ObserveContext<'a> {
    pub fn new(now: DateTime<Utc>, recent: &'a [Event]) -> Self {
        Self { now, recent }
    }

    /// Context with no log history
    pub fn at(now: DateTime<Utc>) -> ObserveContext<'static> {
        ObserveContext { now, recent: &[] }
    }
}

/// Common contract for every per-modality detector
pub trait Detector {
    /// Raw observation type this detector consumes
    type Sample;

    /// Short identifier used in logs
    fn name(&self) -> &'static str;

    /// Feed one sample; returns zero or more events in emission order
    fn observe(&mut self, sample: &Self::Sample, ctx: &ObserveContext<'_>) -> Vec<Event>;

    /// Drop all in-progress state
    fn reset(&mut self);

    /// Number of trailing log entries the detector needs in [`ObserveContext::recent`]
    fn lookback(&self) -> usize {
        0
    }
}

/// Convert a seconds threshold from configuration into a chrono duration
///
/// Detectors can be built from unvalidated configs: NaN and negative values
/// become zero, and values past the range saturate at `i64::MAX` ms.
pub(crate) fn seconds(value: f64) -> Duration {
    let millis = (value * 1000.0).round();
    if millis.is_nan() || millis <= 0.0 {
        return Duration::zero();
    }
    Duration::milliseconds(millis as i64)
}

/// Elapsed time between two instants in seconds
pub(crate) fn elapsed_seconds(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds() as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MonitorConfig;
    use crate::types::EventKind;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_seconds_conversion() {
        assert_eq!(seconds(2.5), Duration::milliseconds(2_500));
        assert_eq!(seconds(-1.0), Duration::zero());
        assert_eq!(seconds(f64::NEG_INFINITY), Duration::zero());
        assert_eq!(seconds(f64::NAN), Duration::zero());
        assert_eq!(seconds(f64::INFINITY), Duration::milliseconds(i64::MAX));
    }

    #[test]
    fn test_unvalidated_config_does_not_panic() {
        let config = MonitorConfig {
            look_away_seconds: f64::NEG_INFINITY,
            no_face_seconds: f64::INFINITY,
            eye_closed_seconds: f64::NAN,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let mut analyzer = FaceAnalyzer::new(&config);
        let missing = analyzer.observe(&crate::types::FaceObservation::empty(), &ObserveContext::at(fixtures::t(0)));
        assert!(missing.is_empty());

        let away = analyzer.observe(&fixtures::looking_away(), &ObserveContext::at(fixtures::t(100)));
        let kinds: Vec<EventKind> = away.iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![EventKind::LookingAwayFlag]);
    }
}
