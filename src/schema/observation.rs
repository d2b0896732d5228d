//! proctor.observation.v1 record definition

use crate::types::{AudioObservation, FaceObservation, Landmark, ObjectObservation, ObjectPrediction};
use crate::adapters::level_from_bins;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current schema version
pub const SCHEMA_VERSION: &str = "proctor.observation.v1";

/// Which detector stream a record belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    Face,
    Objects,
    Audio,
}

impl Modality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::Face => "face",
            Modality::Objects => "objects",
            Modality::Audio => "audio",
        }
    }
}

/// Record payload, tagged by `modality`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "modality", rename_all = "snake_case")]
pub enum ObservationPayload {
    /// Landmarks for every face in frame (empty when no face was found)
    Face {
        #[serde(default)]
        faces: Vec<Vec<Landmark>>,
    },
    /// Predictions from one object-detector poll
    Objects {
        #[serde(default)]
        predictions: Vec<ObjectPrediction>,
    },
    /// Either a precomputed level or raw analyser bins
    Audio {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        level: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        frequency_bins: Option<Vec<u8>>,
    },
}

/// Observation ready for a detector
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    Face(FaceObservation),
    Objects(ObjectObservation),
    Audio(AudioObservation),
}

/// The proctor.observation.v1 record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationRecord {
    /// Schema version identifier
    pub schema_version: String,
    /// Capture time (UTC)
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub payload: ObservationPayload,
}

impl ObservationRecord {
    pub fn face(timestamp: DateTime<Utc>, observation: FaceObservation) -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            timestamp,
            payload: ObservationPayload::Face {
                faces: observation.faces,
            },
        }
    }

    pub fn objects(timestamp: DateTime<Utc>, observation: ObjectObservation) -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            timestamp,
            payload: ObservationPayload::Objects {
                predictions: observation.predictions,
            },
        }
    }

    pub fn audio(timestamp: DateTime<Utc>, level: f64) -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            timestamp,
            payload: ObservationPayload::Audio {
                level: Some(level),
                frequency_bins: None,
            },
        }
    }

    pub fn modality(&self) -> Modality {
        match self.payload {
            ObservationPayload::Face { .. } => Modality::Face,
            ObservationPayload::Objects { .. } => Modality::Objects,
            ObservationPayload::Audio { .. } => Modality::Audio,
        }
    }

    /// Validate the record schema
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(ValidationError::InvalidSchemaVersion {
                expected: SCHEMA_VERSION.to_string(),
                actual: self.schema_version.clone(),
            });
        }

        match &self.payload {
            ObservationPayload::Face { faces } => {
                if faces.iter().flatten().any(|l| !l.is_finite()) {
                    return Err(ValidationError::NonFiniteLandmark);
                }
                Ok(())
            }
            ObservationPayload::Objects { predictions } => {
                for p in predictions {
                    if !(0.0..=1.0).contains(&p.score) {
                        return Err(ValidationError::ScoreOutOfRange {
                            class: p.class.clone(),
                            score: p.score,
                        });
                    }
                }
                Ok(())
            }
            ObservationPayload::Audio {
                level,
                frequency_bins,
            } => match (level, frequency_bins) {
                (Some(level), _) if !level.is_finite() || *level < 0.0 => {
                    Err(ValidationError::InvalidAudioLevel(*level))
                }
                (Some(_), _) => Ok(()),
                (None, Some(bins)) if !bins.is_empty() => Ok(()),
                _ => Err(ValidationError::MissingAudioLevel),
            },
        }
    }

    /// Convert into the observation a detector consumes
    pub fn to_observation(&self) -> Result<Observation, ValidationError> {
        self.validate()?;
        let observation = match &self.payload {
            ObservationPayload::Face { faces } => Observation::Face(FaceObservation {
                faces: faces.clone(),
            }),
            ObservationPayload::Objects { predictions } => Observation::Objects(ObjectObservation {
                predictions: predictions.clone(),
            }),
            ObservationPayload::Audio {
                level,
                frequency_bins,
            } => {
                let level = level
                    .or_else(|| frequency_bins.as_deref().and_then(level_from_bins))
                    .ok_or(ValidationError::MissingAudioLevel)?;
                Observation::Audio(AudioObservation { level })
            }
        };
        Ok(observation)
    }
}

/// Validation errors for observation records
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid schema version: expected {expected}, got {actual}")]
    InvalidSchemaVersion { expected: String, actual: String },

    #[error("Landmark coordinates must be finite")]
    NonFiniteLandmark,

    #[error("Prediction score for {class} out of range: {score}")]
    ScoreOutOfRange { class: String, score: f64 },

    #[error("Audio record needs a level or non-empty frequency_bins")]
    MissingAudioLevel,

    #[error("Invalid audio level: {0}")]
    InvalidAudioLevel(f64),

    #[error("Record is out of order: {current} is before {previous}")]
    OutOfOrder {
        previous: DateTime<Utc>,
        current: DateTime<Utc>,
    },
}
