//! Monitor configuration
//!
//! Every threshold used by the detectors lives here. Configuration is loaded
//! from camelCase JSON, missing keys fall back to the defaults, and
//! [`MonitorConfig::validate`] rejects values that would make a detector
//! meaningless (negative windows, an empty allow-list, and so on).

use crate::error::ProctorError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default allow-list of suspicious object classes
pub const DEFAULT_SUSPICIOUS_CLASSES: [&str; 8] = [
    "cell phone",
    "book",
    "laptop",
    "tv",
    "remote",
    "keyboard",
    "mouse",
    "tablet",
];

/// Thresholds and cadences for every detector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MonitorConfig {
    /// Continuous look-away required before a flag (seconds)
    pub look_away_seconds: f64,
    /// Continuous face absence required before `no_face_detected` (seconds)
    pub no_face_seconds: f64,
    /// Object detector polling interval (milliseconds)
    pub object_poll_ms: u64,
    /// Minimum prediction score for an object to count (inclusive)
    pub object_score_threshold: f64,
    /// Eye aspect ratio below which eyes count as closed
    pub ear_threshold: f64,
    /// Continuous eye closure required before `drowsiness_detected` (seconds)
    pub eye_closed_seconds: f64,
    /// Audio level above which background speech is assumed
    pub audio_level_threshold: f64,
    /// Minimum spacing between audio events (milliseconds)
    pub audio_debounce_ms: u64,
    /// Object classes that raise `object_detected`
    pub suspicious_classes: Vec<String>,
    /// How many trailing log entries to check when suppressing repeat objects
    pub dedupe_window_events: usize,
    /// Horizontal nose offset from the eye midpoint that counts as looking away
    pub gaze_turn_threshold: f64,
    /// Vertical nose offset from the eye midpoint that counts as looking away
    pub gaze_vertical_threshold: f64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            look_away_seconds: 5.0,
            no_face_seconds: 10.0,
            object_poll_ms: 700,
            object_score_threshold: 0.5,
            ear_threshold: 0.22,
            eye_closed_seconds: 2.0,
            audio_level_threshold: 50.0,
            audio_debounce_ms: 5000,
            suspicious_classes: DEFAULT_SUSPICIOUS_CLASSES
                .iter()
                .map(|c| c.to_string())
                .collect(),
            dedupe_window_events: 8,
            gaze_turn_threshold: 0.06,
            gaze_vertical_threshold: 0.08,
        }
    }
}

impl MonitorConfig {
    /// Shorter windows, for high-stakes sessions
    pub fn strict() -> Self {
        Self {
            look_away_seconds: 3.0,
            no_face_seconds: 5.0,
            eye_closed_seconds: 1.5,
            audio_debounce_ms: 3000,
            ..Default::default()
        }
    }

    /// Longer windows, for practice sessions
    pub fn lenient() -> Self {
        Self {
            look_away_seconds: 8.0,
            no_face_seconds: 15.0,
            eye_closed_seconds: 3.0,
            audio_debounce_ms: 10_000,
            ..Default::default()
        }
    }

    /// Parse a configuration from JSON, then validate it
    pub fn from_json(json: &str) -> Result<Self, ProctorError> {
        let config: MonitorConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a configuration file
    pub fn load(path: &Path) -> Result<Self, ProctorError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ProctorError::InvalidConfig(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
    }

    /// Serialize to pretty JSON
    pub fn to_json_pretty(&self) -> Result<String, ProctorError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check that every option is usable
    pub fn validate(&self) -> Result<(), ProctorError> {
        let non_negative = [
            ("lookAwaySeconds", self.look_away_seconds),
            ("noFaceSeconds", self.no_face_seconds),
            ("earThreshold", self.ear_threshold),
            ("eyeClosedSeconds", self.eye_closed_seconds),
            ("audioLevelThreshold", self.audio_level_threshold),
            ("gazeTurnThreshold", self.gaze_turn_threshold),
            ("gazeVerticalThreshold", self.gaze_vertical_threshold),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(ProctorError::InvalidConfig(format!(
                    "{name} must be a finite non-negative number, got {value}"
                )));
            }
        }

        if !self.object_score_threshold.is_finite()
            || !(0.0..=1.0).contains(&self.object_score_threshold)
        {
            return Err(ProctorError::InvalidConfig(format!(
                "objectScoreThreshold must be within [0, 1], got {}",
                self.object_score_threshold
            )));
        }

        if self.object_poll_ms == 0 {
            return Err(ProctorError::InvalidConfig(
                "objectPollMs must be greater than zero".to_string(),
            ));
        }

        if self.suspicious_classes.is_empty() {
            return Err(ProctorError::InvalidConfig(
                "suspiciousClasses must not be empty".to_string(),
            ));
        }

        if let Some(blank) = self.suspicious_classes.iter().find(|c| c.trim().is_empty()) {
            return Err(ProctorError::InvalidConfig(format!(
                "suspiciousClasses contains a blank entry: {blank:?}"
            )));
        }

        Ok(())
    }
}
