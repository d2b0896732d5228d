//! Drowsiness detection
//!
//! Eye openness is measured with the eye aspect ratio (EAR): the mean of the
//! two vertical lid distances over the horizontal eye width. Both eyes are
//! averaged. Eyes below `earThreshold` for `eyeClosedSeconds` straight raise
//! one `drowsiness_detected` per closed-eye episode.

use super::{elapsed_seconds, seconds, Detector, ObserveContext};
use crate::config::MonitorConfig;
use crate::types::{Event, EventKind, FaceObservation, Landmark};
use chrono::{DateTime, Duration, Utc};

/// Face-mesh contour indices: outer corner, two upper lid points, inner
/// corner, two lower lid points (lower points mirror the upper ones)
pub const LEFT_EYE: [usize; 6] = [33, 160, 158, 133, 153, 144];
pub const RIGHT_EYE: [usize; 6] = [362, 385, 387, 263, 373, 380];

fn single_eye_ratio(landmarks: &[Landmark], idx: [usize; 6]) -> Option<f64> {
    let p = |i: usize| landmarks.get(idx[i]).filter(|l| l.is_finite());
    let (p1, p2, p3, p4, p5, p6) = (p(0)?, p(1)?, p(2)?, p(3)?, p(4)?, p(5)?);

    let width = p1.distance(p4);
    if width <= f64::EPSILON {
        return None;
    }
    Some((p2.distance(p6) + p3.distance(p5)) / (2.0 * width))
}

/// Mean EAR of both eyes, or `None` when the contour is incomplete
pub fn eye_aspect_ratio(landmarks: &[Landmark]) -> Option<f64> {
    let left = single_eye_ratio(landmarks, LEFT_EYE)?;
    let right = single_eye_ratio(landmarks, RIGHT_EYE)?;
    Some((left + right) / 2.0)
}

#[derive(Debug, Clone)]
pub struct DrowsinessDetector {
    ear_threshold: f64,
    eye_closed_threshold: Duration,
    closed_since: Option<DateTime<Utc>>,
    logged: bool,
}

impl Default for DrowsinessDetector {
    fn default() -> Self {
        Self::new(&MonitorConfig::default())
    }
}

impl DrowsinessDetector {
    pub fn new(config: &MonitorConfig) -> Self {
        Self {
            ear_threshold: config.ear_threshold,
            eye_closed_threshold: seconds(config.eye_closed_seconds),
            closed_since: None,
            logged: false,
        }
    }

    pub fn eyes_closed_since(&self) -> Option<DateTime<Utc>> {
        self.closed_since
    }
}

impl Detector for DrowsinessDetector {
    type Sample = FaceObservation;

    fn name(&self) -> &'static str {
        "drowsiness"
    }

    fn observe(&mut self, sample: &FaceObservation, ctx: &ObserveContext<'_>) -> Vec<Event> {
        let Some(ear) = sample.primary().and_then(eye_aspect_ratio) else {
            return Vec::new();
        };

        if ear >= self.ear_threshold {
            self.closed_since = None;
            self.logged = false;
            return Vec::new();
        }

        let start = *self.closed_since.get_or_insert(ctx.now);
        if self.logged || ctx.now - start < self.eye_closed_threshold {
            return Vec::new();
        }

        self.logged = true;
        vec![Event::new(EventKind::DrowsinessDetected, ctx.now)
            .with("start", start)
            .with("durationSeconds", elapsed_seconds(start, ctx.now))
            .with("ear", ear)]
    }

    fn reset(&mut self) {
        self.closed_since = None;
        self.logged = false;
    }
}
