//! Composite detector for face-landmark frames
//!
//! One face frame feeds four detectors. They run in a fixed order (presence,
//! multiplicity, gaze, drowsiness) so events derived from the same frame
//! land in the log in a stable sequence.

use super::{
    Detector, DrowsinessDetector, GazeDetector, MultiFaceDetector, ObserveContext,
    PresenceDetector,
};
use crate::config::MonitorConfig;
use crate::types::{Event, FaceObservation};

#[derive(Debug, Clone)]
pub struct FaceAnalyzer {
    presence: PresenceDetector,
    multi_face: MultiFaceDetector,
    gaze: GazeDetector,
    drowsiness: DrowsinessDetector,
}

impl Default for FaceAnalyzer {
    fn default() -> Self {
        Self::new(&MonitorConfig::default())
    }
}

impl FaceAnalyzer {
    pub fn new(config: &MonitorConfig) -> Self {
        Self {
            presence: PresenceDetector::new(config),
            multi_face: MultiFaceDetector::new(),
            gaze: GazeDetector::new(config),
            drowsiness: DrowsinessDetector::new(config),
        }
    }

    pub fn presence(&self) -> &PresenceDetector {
        &self.presence
    }

    pub fn gaze(&self) -> &GazeDetector {
        &self.gaze
    }

    pub fn drowsiness(&self) -> &DrowsinessDetector {
        &self.drowsiness
    }
}

impl Detector for FaceAnalyzer {
    type Sample = FaceObservation;

    fn name(&self) -> &'static str {
        "face"
    }

    fn observe(&mut self, sample: &FaceObservation, ctx: &ObserveContext<'_>) -> Vec<Event> {
        let mut events = self.presence.observe(sample, ctx);
        events.extend(self.multi_face.observe(sample, ctx));
        events.extend(self.gaze.observe(sample, ctx));
        events.extend(self.drowsiness.observe(sample, ctx));
        events
    }

    fn reset(&mut self) {
        self.presence.reset();
        self.multi_face.reset();
        self.gaze.reset();
        self.drowsiness.reset();
    }
}
