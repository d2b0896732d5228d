//! Background speech detection
//!
//! Audio levels above the threshold raise `background_voice_detected`, at
//! most once per debounce window measured from the previous emission. A
//! sample exactly one window after the last emission is still suppressed.

use super::{Detector, ObserveContext};
use crate::config::MonitorConfig;
use crate::types::{AudioObservation, Event, EventKind};
use chrono::{DateTime, Duration, Utc};

#[derive(Debug, Clone)]
pub struct AudioDetector {
    level_threshold: f64,
    debounce: Duration,
    last_emitted_at: Option<DateTime<Utc>>,
}

impl Default for AudioDetector {
    fn default() -> Self {
        Self::new(&MonitorConfig::default())
    }
}

impl AudioDetector {
    pub fn new(config: &MonitorConfig) -> Self {
        Self {
            level_threshold: config.audio_level_threshold,
            debounce: Duration::milliseconds(i64::try_from(config.audio_debounce_ms).unwrap_or(i64::MAX)),
            last_emitted_at: None,
        }
    }

    pub fn last_emitted_at(&self) -> Option<DateTime<Utc>> {
        self.last_emitted_at
    }
}

impl Detector for AudioDetector {
    type Sample = AudioObservation;

    fn name(&self) -> &'static str {
        "audio"
    }

    fn observe(&mut self, sample: &AudioObservation, ctx: &ObserveContext<'_>) -> Vec<Event> {
        if !sample.level.is_finite() || sample.level <= self.level_threshold {
            return Vec::new();
        }

        if let Some(last) = self.last_emitted_at {
            if ctx.now - last <= self.debounce {
                return Vec::new();
            }
        }

        self.last_emitted_at = Some(ctx.now);
        vec![Event::new(EventKind::BackgroundVoiceDetected, ctx.now).with("level", sample.level)]
    }

    fn reset(&mut self) {
        self.last_emitted_at = None;
    }
}
