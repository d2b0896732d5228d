//! Object classifier adapter
//!
//! Accepts either a bare prediction array
//! `[{"class":"cell phone","score":0.91,"bbox":[x,y,w,h]}]` or the same array
//! wrapped as `{"predictions": [...]}`.

use super::SignalAdapter;
use crate::error::ProctorError;
use crate::types::{ObjectObservation, ObjectPrediction};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PredictionPayload {
    Bare(Vec<ObjectPrediction>),
    Wrapped { predictions: Vec<ObjectPrediction> },
}

/// Object classifier payload adapter
pub struct CocoSsdAdapter;

impl SignalAdapter for CocoSsdAdapter {
    type Output = ObjectObservation;

    fn parse(&self, raw_json: &str) -> Result<ObjectObservation, ProctorError> {
        let payload: PredictionPayload = serde_json::from_str(raw_json)
            .map_err(|e| ProctorError::ParseError(format!("object predictions: {e}")))?;

        let predictions = match payload {
            PredictionPayload::Bare(predictions) => predictions,
            PredictionPayload::Wrapped { predictions } => predictions,
        };
        Ok(ObjectObservation { predictions })
    }
}
