//! Suspicious object detection
//!
//! Consumes one object-detector poll at a time. A prediction is reported
//! when its class mentions an allow-listed class (case-insensitive), its
//! score reaches the threshold, and its bounding box is well formed. A class
//! already reported within the last `dedupeWindowEvents` log entries is
//! suppressed, so an object sitting on the desk is not re-reported every
//! poll.

use super::{Detector, ObserveContext};
use crate::config::MonitorConfig;
use crate::types::{Event, EventKind, ObjectObservation, ObjectPrediction};
use log::debug;

#[derive(Debug, Clone)]
pub struct ObjectDetector {
    allow_list: Vec<String>,
    score_threshold: f64,
    dedupe_window: usize,
}

impl Default for ObjectDetector {
    fn default() -> Self {
        Self::new(&MonitorConfig::default())
    }
}

impl ObjectDetector {
    pub fn new(config: &MonitorConfig) -> Self {
        Self {
            allow_list: config
                .suspicious_classes
                .iter()
                .map(|c| c.trim().to_lowercase())
                .collect(),
            score_threshold: config.object_score_threshold,
            dedupe_window: config.dedupe_window_events,
        }
    }

    pub fn is_suspicious(&self, class: &str) -> bool {
        let class = class.to_lowercase();
        self.allow_list.iter().any(|allowed| class.contains(allowed.as_str()))
    }

    fn qualifies(&self, prediction: &ObjectPrediction) -> bool {
        if !prediction.bbox_is_valid() {
            debug!("skipping {} with malformed bbox {:?}", prediction.class, prediction.bbox);
            return false;
        }
        prediction.score.is_finite()
            && prediction.score >= self.score_threshold
            && self.is_suspicious(&prediction.class)
    }

    /// Whether `class` was reported within the trailing dedupe window of
    /// `recent` followed by `pending`
    fn recently_reported(&self, class: &str, recent: &[Event], pending: &[Event]) -> bool {
        recent
            .iter()
            .chain(pending.iter())
            .rev()
            .take(self.dedupe_window)
            .any(|e| e.kind == EventKind::ObjectDetected && e.object_class() == Some(class))
    }
}

impl Detector for ObjectDetector {
    type Sample = ObjectObservation;

    fn name(&self) -> &'static str {
        "object"
    }

    fn lookback(&self) -> usize {
        self.dedupe_window
    }

    fn observe(&mut self, sample: &ObjectObservation, ctx: &ObserveContext<'_>) -> Vec<Event> {
        let mut events: Vec<Event> = Vec::new();

        for prediction in sample.predictions.iter().filter(|p| self.qualifies(p)) {
            if self.recently_reported(&prediction.class, ctx.recent, &events) {
                continue;
            }
            events.push(
                Event::new(EventKind::ObjectDetected, ctx.now)
                    .with("class", prediction.class.as_str())
                    .with("score", prediction.score)
                    .with("bbox", prediction.bbox.clone()),
            );
        }

        events
    }

    fn reset(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::fixtures::t;
    use pretty_assertions::assert_eq;

    fn prediction(class: &str, score: f64) -> ObjectPrediction {
        ObjectPrediction {
            class: class.to_string(),
            score,
            bbox: vec![10.0, 20.0, 50.0, 80.0],
        }
    }

    fn poll(predictions: Vec<ObjectPrediction>) -> ObjectObservation {
        ObjectObservation { predictions }
    }

    #[test]
    fn test_allow_list_and_threshold() {
        let mut detector = ObjectDetector::default();
        let sample = poll(vec![
            prediction("cell phone", 0.91),
            prediction("person", 0.99),
            prediction("book", 0.49),
            prediction("Laptop", 0.5),
        ]);
        let events = detector.observe(&sample, &ObserveContext::at(t(0)));
        let classes: Vec<&str> = events.iter().filter_map(|e| e.object_class()).collect();
        assert_eq!(classes, vec!["cell phone", "Laptop"]);
    }

    #[test]
    fn test_repeat_within_window_is_suppressed() {
        let mut detector = ObjectDetector::default();
        let first = detector.observe(&poll(vec![prediction("book", 0.8)]), &ObserveContext::at(t(0)));
        assert_eq!(first.len(), 1);

        let again = detector.observe(
            &poll(vec![prediction("book", 0.8)]),
            &ObserveContext::new(t(700), &first),
        );
        assert!(again.is_empty());
    }

    #[test]
    fn test_repeat_outside_window_is_reported() {
        let mut detector = ObjectDetector::default();
        let mut log = detector.observe(&poll(vec![prediction("book", 0.8)]), &ObserveContext::at(t(0)));
        for i in 0..8 {
            log.push(Event::new(EventKind::BackgroundVoiceDetected, t(i * 10)));
        }
        let recent = &log[log.len() - detector.lookback()..];
        let again = detector.observe(&poll(vec![prediction("book", 0.8)]), &ObserveContext::new(t(700), recent));
        assert_eq!(again.len(), 1);
    }

    #[test]
    fn test_duplicates_in_one_poll_collapse() {
        let mut detector = ObjectDetector::default();
        let events = detector.observe(
            &poll(vec![prediction("book", 0.8), prediction("book", 0.7)]),
            &ObserveContext::at(t(0)),
        );
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_malformed_bbox_is_skipped() {
        let mut detector = ObjectDetector::default();
        let mut broken = prediction("cell phone", 0.9);
        broken.bbox = vec![1.0, f64::NAN, 3.0, 4.0];
        assert!(detector.observe(&poll(vec![broken]), &ObserveContext::at(t(0))).is_empty());
    }
}
