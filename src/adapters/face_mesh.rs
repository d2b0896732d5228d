//! Face-mesh landmark adapter
//!
//! Parses face-landmarker results of the form
//! `{"multiFaceLandmarks": [[{"x":..,"y":..,"z":..}, ...], ...]}`.
//! A missing or null `multiFaceLandmarks` means no face in frame.

use super::SignalAdapter;
use crate::error::ProctorError;
use crate::types::{FaceObservation, Landmark};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FaceMeshResults {
    #[serde(default)]
    multi_face_landmarks: Option<Vec<Vec<Landmark>>>,
}

/// Face-mesh payload adapter
pub struct FaceMeshAdapter;

impl SignalAdapter for FaceMeshAdapter {
    type Output = FaceObservation;

    fn parse(&self, raw_json: &str) -> Result<FaceObservation, ProctorError> {
        let results: FaceMeshResults = serde_json::from_str(raw_json)
            .map_err(|e| ProctorError::ParseError(format!("face mesh results: {e}")))?;

        let faces = results
            .multi_face_landmarks
            .unwrap_or_default()
            .into_iter()
            .filter(|face| !face.is_empty())
            .collect();

        Ok(FaceObservation { faces })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_two_faces() {
        let json = r#"{"multiFaceLandmarks": [
            [{"x": 0.1, "y": 0.2, "z": -0.01}, {"x": 0.3, "y": 0.4}],
            [{"x": 0.5, "y": 0.6, "z": 0.0}]
        ]}"#;
        let observation = FaceMeshAdapter.parse(json).unwrap();
        assert_eq!(observation.face_count(), 2);
        assert_eq!(observation.primary().unwrap()[1], Landmark::new(0.3, 0.4));
    }

    #[test]
    fn test_missing_landmarks_mean_no_face() {
        assert_eq!(FaceMeshAdapter.parse("{}").unwrap().face_count(), 0);
        assert_eq!(
            FaceMeshAdapter.parse(r#"{"multiFaceLandmarks": null}"#).unwrap().face_count(),
            0
        );
        assert_eq!(
            FaceMeshAdapter.parse(r#"{"multiFaceLandmarks": [[]]}"#).unwrap().face_count(),
            0
        );
    }

    #[test]
    fn test_garbage_is_a_parse_error() {
        let err = FaceMeshAdapter.parse("not json").unwrap_err();
        assert!(matches!(err, ProctorError::ParseError(_)));
    }
}
