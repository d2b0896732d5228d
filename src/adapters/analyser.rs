//! Audio analyser adapter
//!
//! The audio level is the mean of the analyser's byte frequency bins
//! (0..=255 each). Payloads are either a bare bin array or
//! `{"frequencyData": [...]}`; a precomputed `{"level": n}` is passed through.

use super::SignalAdapter;
use crate::error::ProctorError;
use crate::types::AudioObservation;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AnalyserPayload {
    Bins(Vec<u8>),
    #[serde(rename_all = "camelCase")]
    Frequency { frequency_data: Vec<u8> },
    Level { level: f64 },
}

/// Mean of the frequency bins, `None` for an empty frame
pub fn level_from_bins(bins: &[u8]) -> Option<f64> {
    if bins.is_empty() {
        return None;
    }
    let sum: u64 = bins.iter().map(|&b| u64::from(b)).sum();
    Some(sum as f64 / bins.len() as f64)
}

/// Audio analyser payload adapter
pub struct AnalyserAdapter;

impl SignalAdapter for AnalyserAdapter {
    type Output = AudioObservation;

    fn parse(&self, raw_json: &str) -> Result<AudioObservation, ProctorError> {
        let payload: AnalyserPayload = serde_json::from_str(raw_json)
            .map_err(|e| ProctorError::ParseError(format!("analyser frame: {e}")))?;

        let level = match payload {
            AnalyserPayload::Bins(bins) | AnalyserPayload::Frequency { frequency_data: bins } => {
                level_from_bins(&bins)
                    .ok_or_else(|| ProctorError::ParseError("empty analyser frame".to_string()))?
            }
            AnalyserPayload::Level { level } => level,
        };

        Ok(AudioObservation { level })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_is_mean_of_bins() {
        assert_eq!(level_from_bins(&[0, 100, 200, 100]), Some(100.0));
        assert_eq!(level_from_bins(&[]), None);
    }

    #[test]
    fn test_parse_shapes() {
        assert_eq!(AnalyserAdapter.parse("[10, 20, 30]").unwrap().level, 20.0);
        assert_eq!(
            AnalyserAdapter.parse(r#"{"frequencyData": [60, 60]}"#).unwrap().level,
            60.0
        );
        assert_eq!(AnalyserAdapter.parse(r#"{"level": 42.5}"#).unwrap().level, 42.5);
    }

    #[test]
    fn test_empty_frame_is_an_error() {
        assert!(AnalyserAdapter.parse("[]").is_err());
        assert!(AnalyserAdapter.parse("[300]").is_err());
    }
}
