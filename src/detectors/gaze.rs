//! Gaze deviation detection
//!
//! Gaze is approximated from three face-mesh landmarks: the outer corners of
//! both eyes and the nose tip. When the nose drifts away from the eye
//! midpoint by more than the turn (horizontal) or vertical threshold, the
//! candidate is looking away. An episode that lasts `lookAwaySeconds` is
//! flagged once; when it ends, the flagged episode is closed with
//! `looking_away_end`.

use super::{elapsed_seconds, seconds, Detector, ObserveContext};
use crate::config::MonitorConfig;
use crate::types::{Event, EventKind, FaceObservation, Landmark};
use chrono::{DateTime, Duration, Utc};

pub const LEFT_EYE_OUTER: usize = 33;
pub const RIGHT_EYE_OUTER: usize = 263;
pub const NOSE_TIP: usize = 1;

/// Nose offset from the eye midpoint, in normalized image units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GazeDeviation {
    pub horizontal: f64,
    pub vertical: f64,
}

impl GazeDeviation {
    pub fn exceeds(&self, turn_threshold: f64, vertical_threshold: f64) -> bool {
        self.horizontal.abs() > turn_threshold || self.vertical.abs() > vertical_threshold
    }
}

/// Compute the deviation, or `None` when a required landmark is missing
pub fn gaze_deviation(landmarks: &[Landmark]) -> Option<GazeDeviation> {
    let left = landmarks.get(LEFT_EYE_OUTER)?;
    let right = landmarks.get(RIGHT_EYE_OUTER)?;
    let nose = landmarks.get(NOSE_TIP)?;

    if !(left.is_finite() && right.is_finite() && nose.is_finite()) {
        return None;
    }

    Some(GazeDeviation {
        horizontal: nose.x - (left.x + right.x) / 2.0,
        vertical: nose.y - (left.y + right.y) / 2.0,
    })
}

#[derive(Debug, Clone)]
pub struct GazeDetector {
    look_away_threshold: Duration,
    look_away_seconds: f64,
    turn_threshold: f64,
    vertical_threshold: f64,
    away_since: Option<DateTime<Utc>>,
    flagged: bool,
}

impl Default for GazeDetector {
    fn default() -> Self {
        Self::new(&MonitorConfig::default())
    }
}

impl GazeDetector {
    pub fn new(config: &MonitorConfig) -> Self {
        Self {
            look_away_threshold: seconds(config.look_away_seconds),
            look_away_seconds: config.look_away_seconds,
            turn_threshold: config.gaze_turn_threshold,
            vertical_threshold: config.gaze_vertical_threshold,
            away_since: None,
            flagged: false,
        }
    }

    pub fn is_looking_away(&self) -> bool {
        self.away_since.is_some()
    }

    fn on_away(&mut self, now: DateTime<Utc>) -> Vec<Event> {
        let start = *self.away_since.get_or_insert(now);

        if self.flagged || now - start < self.look_away_threshold {
            return Vec::new();
        }

        self.flagged = true;
        vec![Event::new(EventKind::LookingAwayFlag, now)
            .with("start", start)
            .with("durationSeconds", elapsed_seconds(start, now))
            .with("thresholdSeconds", self.look_away_seconds)]
    }

    fn on_forward(&mut self, now: DateTime<Utc>) -> Vec<Event> {
        let mut events = Vec::new();
        if let Some(start) = self.away_since.take() {
            if self.flagged {
                events.push(
                    Event::new(EventKind::LookingAwayEnd, now)
                        .with("start", start)
                        .with("end", now)
                        .with("durationSeconds", elapsed_seconds(start, now)),
                );
            }
        }
        self.flagged = false;
        events
    }
}

impl Detector for GazeDetector {
    type Sample = FaceObservation;

    fn name(&self) -> &'static str {
        "gaze"
    }

    fn observe(&mut self, sample: &FaceObservation, ctx: &ObserveContext<'_>) -> Vec<Event> {
        // No face: gaze is undefined, the episode is left as it is
        let Some(landmarks) = sample.primary() else {
            return Vec::new();
        };
        let Some(deviation) = gaze_deviation(landmarks) else {
            return Vec::new();
        };

        if deviation.exceeds(self.turn_threshold, self.vertical_threshold) {
            self.on_away(ctx.now)
        } else {
            self.on_forward(ctx.now)
        }
    }

    fn reset(&mut self) {
        self.away_since = None;
        self.flagged = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn t(ms: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap() + Duration::milliseconds(ms)
    }

    /// A 468-point face whose nose sits `dx`/`dy` away from the eye midpoint
    fn face_with_offset(dx: f64, dy: f64) -> FaceObservation {
        let mut landmarks = vec![Landmark::new(0.5, 0.5); 468];
        landmarks[LEFT_EYE_OUTER] = Landmark::new(0.4, 0.4);
        landmarks[RIGHT_EYE_OUTER] = Landmark::new(0.6, 0.4);
        landmarks[NOSE_TIP] = Landmark::new(0.5 + dx, 0.4 + dy);
        FaceObservation::single(landmarks)
    }

    fn run(detector: &mut GazeDetector, frames: &[(i64, FaceObservation)]) -> Vec<Event> {
        frames
            .iter()
            .flat_map(|(ms, frame)| detector.observe(frame, &ObserveContext::at(t(*ms))))
            .collect()
    }

    #[test]
    fn test_deviation_from_landmarks() {
        let face = face_with_offset(0.1, -0.02);
        let deviation = gaze_deviation(face.primary().unwrap()).unwrap();
        assert!((deviation.horizontal - 0.1).abs() < 1e-9);
        assert!((deviation.vertical + 0.02).abs() < 1e-9);
        assert!(deviation.exceeds(0.06, 0.08));
    }

    #[test]
    fn test_below_threshold_never_flags() {
        let mut detector = GazeDetector::default();
        let frames: Vec<(i64, FaceObservation)> = (0..200)
            .map(|i| (i * 100, face_with_offset(0.059, -0.079)))
            .collect();
        assert!(run(&mut detector, &frames).is_empty());
        assert!(!detector.is_looking_away());
    }

    #[test]
    fn test_long_episode_flags_once_then_ends() {
        let mut detector = GazeDetector::default();
        let mut frames: Vec<(i64, FaceObservation)> = (0..=80)
            .map(|i| (i * 100, face_with_offset(0.2, 0.0)))
            .collect();
        frames.push((8_100, face_with_offset(0.0, 0.0)));

        let events = run(&mut detector, &frames);
        let kinds: Vec<EventKind> = events.iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![EventKind::LookingAwayFlag, EventKind::LookingAwayEnd]);
        assert_eq!(events[0].timestamp, t(5_000));
        assert_eq!(events[0].message(), "Looked away > 5s");
        assert_eq!(events[1].duration_seconds(), Some(8.1));
    }

    #[test]
    fn test_short_episode_emits_no_end() {
        let mut detector = GazeDetector::default();
        let frames = vec![
            (0, face_with_offset(0.0, 0.1)),
            (3_000, face_with_offset(0.0, 0.1)),
            (3_500, face_with_offset(0.0, 0.0)),
        ];
        assert!(run(&mut detector, &frames).is_empty());
    }

    #[test]
    fn test_missing_landmarks_preserve_episode() {
        let mut detector = GazeDetector::default();
        let truncated = FaceObservation::single(vec![Landmark::new(0.5, 0.5); 10]);
        let frames = vec![
            (0, face_with_offset(0.2, 0.0)),
            (2_000, truncated.clone()),
            (4_000, FaceObservation::empty()),
            (5_000, face_with_offset(0.2, 0.0)),
        ];
        let events = run(&mut detector, &frames);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::LookingAwayFlag);
        assert_eq!(events[0].attribute("start").and_then(|v| v.as_str()), Some(t(0).to_rfc3339().as_str()));
    }
}
