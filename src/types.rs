//! Core types for the proctor engine
//!
//! This module defines the data that flows from the perceptual adapters
//! through the detectors into the event log: raw observations (landmark
//! frames, object predictions, audio levels) and the immutable [`Event`]
//! records the detectors emit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Closed set of event kinds a detector can emit
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    LookingAwayFlag,
    LookingAwayEnd,
    NoFaceDetected,
    FaceMissingEnd,
    FaceDetected,
    MultipleFacesDetected,
    ObjectDetected,
    DrowsinessDetected,
    BackgroundVoiceDetected,
}

impl EventKind {
    pub const ALL: [EventKind; 9] = [
        EventKind::LookingAwayFlag,
        EventKind::LookingAwayEnd,
        EventKind::NoFaceDetected,
        EventKind::FaceMissingEnd,
        EventKind::FaceDetected,
        EventKind::MultipleFacesDetected,
        EventKind::ObjectDetected,
        EventKind::DrowsinessDetected,
        EventKind::BackgroundVoiceDetected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::LookingAwayFlag => "looking_away_flag",
            EventKind::LookingAwayEnd => "looking_away_end",
            EventKind::NoFaceDetected => "no_face_detected",
            EventKind::FaceMissingEnd => "face_missing_end",
            EventKind::FaceDetected => "face_detected",
            EventKind::MultipleFacesDetected => "multiple_faces_detected",
            EventKind::ObjectDetected => "object_detected",
            EventKind::DrowsinessDetected => "drowsiness_detected",
            EventKind::BackgroundVoiceDetected => "background_voice_detected",
        }
    }

    /// Kinds that should interrupt the proctor in real time
    pub fn is_alertable(&self) -> bool {
        matches!(
            self,
            EventKind::LookingAwayFlag
                | EventKind::NoFaceDetected
                | EventKind::MultipleFacesDetected
                | EventKind::ObjectDetected
                | EventKind::DrowsinessDetected
                | EventKind::BackgroundVoiceDetected
        )
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Attribute value attached to an event
///
/// Integers are tried before floats so `count` survives a JSON round trip
/// as an integer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Integer(i64),
    Number(f64),
    String(String),
    Boolean(bool),
    Array(Vec<AttributeValue>),
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        AttributeValue::Number(v)
    }
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        AttributeValue::Integer(v)
    }
}

impl From<usize> for AttributeValue {
    fn from(v: usize) -> Self {
        AttributeValue::Integer(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<String> for AttributeValue {
    fn from(v: String) -> Self {
        AttributeValue::String(v)
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        AttributeValue::String(v.to_string())
    }
}

impl From<bool> for AttributeValue {
    fn from(v: bool) -> Self {
        AttributeValue::Boolean(v)
    }
}

impl From<DateTime<Utc>> for AttributeValue {
    fn from(v: DateTime<Utc>) -> Self {
        AttributeValue::String(v.to_rfc3339())
    }
}

impl From<Vec<f64>> for AttributeValue {
    fn from(v: Vec<f64>) -> Self {
        AttributeValue::Array(v.into_iter().map(AttributeValue::Number).collect())
    }
}

impl AttributeValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Number(n) => Some(*n),
            AttributeValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttributeValue::Integer(i) => Some(*i),
            AttributeValue::Number(n) => Some(*n as i64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttributeValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }
}

/// A discrete, timestamped observation derived by a detector
///
/// Attributes are flattened next to `type` and `timestamp` when serialized,
/// e.g. `{"type":"object_detected","timestamp":"…","class":"book","score":0.8}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub attributes: BTreeMap<String, AttributeValue>,
}

impl Event {
    pub fn new(kind: EventKind, timestamp: DateTime<Utc>) -> Self {
        Self {
            kind,
            timestamp,
            attributes: BTreeMap::new(),
        }
    }

    /// Builder-style attribute setter
    pub fn with(mut self, key: &str, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(key.to_string(), value.into());
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.get(key)
    }

    /// `class` attribute of object events
    pub fn object_class(&self) -> Option<&str> {
        self.attribute("class").and_then(AttributeValue::as_str)
    }

    pub fn duration_seconds(&self) -> Option<f64> {
        self.attribute("durationSeconds").and_then(AttributeValue::as_f64)
    }

    /// One-line human-readable description for logs and dashboards
    pub fn message(&self) -> String {
        let num = |key: &str| self.attribute(key).and_then(AttributeValue::as_f64);
        match self.kind {
            EventKind::LookingAwayFlag => match num("thresholdSeconds") {
                Some(t) => format!("Looked away > {}s", t.round()),
                None => "Looked away".to_string(),
            },
            EventKind::LookingAwayEnd => format!(
                "Looking away ended ({}s)",
                num("durationSeconds").unwrap_or(0.0).round()
            ),
            EventKind::NoFaceDetected => "No face detected".to_string(),
            EventKind::FaceMissingEnd => format!(
                "Face returned after {}s",
                num("durationSeconds").unwrap_or(0.0).round()
            ),
            EventKind::FaceDetected => "Face detected".to_string(),
            EventKind::MultipleFacesDetected => format!(
                "Multiple faces detected ({})",
                self.attribute("count").and_then(AttributeValue::as_i64).unwrap_or(0)
            ),
            EventKind::ObjectDetected => format!(
                "Object detected: {} ({}%)",
                self.object_class().unwrap_or("unknown"),
                (num("score").unwrap_or(0.0) * 100.0).round()
            ),
            EventKind::DrowsinessDetected => format!(
                "Drowsiness: eyes closed {}s",
                num("durationSeconds").unwrap_or(0.0).round()
            ),
            EventKind::BackgroundVoiceDetected => format!(
                "Background audio detected (level {})",
                num("level").unwrap_or(0.0).round()
            ),
        }
    }
}

/// Normalized landmark point; `x` and `y` are in [0, 1] image space
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

impl Landmark {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y, z: 0.0 }
    }

    pub fn distance(&self, other: &Landmark) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// One face-landmark frame: zero, one, or several detected faces
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FaceObservation {
    pub faces: Vec<Vec<Landmark>>,
}

impl FaceObservation {
    pub fn empty() -> Self {
        Self { faces: Vec::new() }
    }

    pub fn single(landmarks: Vec<Landmark>) -> Self {
        Self {
            faces: vec![landmarks],
        }
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Landmarks of the primary (first) face
    pub fn primary(&self) -> Option<&[Landmark]> {
        self.faces.first().map(Vec::as_slice)
    }
}

/// One object-detector prediction; `bbox` is `[x, y, width, height]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectPrediction {
    pub class: String,
    pub score: f64,
    #[serde(default)]
    pub bbox: Vec<f64>,
}

impl ObjectPrediction {
    pub fn bbox_is_valid(&self) -> bool {
        self.bbox.len() == 4
            && self.bbox.iter().all(|v| v.is_finite())
            && self.bbox[2] >= 0.0
            && self.bbox[3] >= 0.0
    }
}

/// Predictions from one object-detector poll
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ObjectObservation {
    pub predictions: Vec<ObjectPrediction>,
}

/// Audio energy for one tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AudioObservation {
    pub level: f64,
}
