//! Multiple-face detection
//!
//! Unlike the episode-based detectors, this one is not debounced: every frame
//! with more than one face emits `multiple_faces_detected`. A visitor who
//! stays in frame is therefore penalized per frame, which quickly drives the
//! score to its floor.

use super::{Detector, ObserveContext};
use crate::types::{Event, EventKind, FaceObservation};

#[derive(Debug, Clone, Default)]
pub struct MultiFaceDetector;

impl MultiFaceDetector {
    pub fn new() -> Self {
        Self
    }
}

impl Detector for MultiFaceDetector {
    type Sample = FaceObservation;

    fn name(&self) -> &'static str {
        "multi_face"
    }

    fn observe(&mut self, sample: &FaceObservation, ctx: &ObserveContext<'_>) -> Vec<Event> {
        let count = sample.face_count();
        if count > 1 {
            vec![Event::new(EventKind::MultipleFacesDetected, ctx.now).with("count", count)]
        } else {
            Vec::new()
        }
    }

    fn reset(&mut self) {}
}
