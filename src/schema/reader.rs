//! Parsing and validation of observation recordings

use crate::error::ProctorError;
use crate::schema::observation::{ObservationRecord, ValidationError};

/// Reader for NDJSON or JSON-array recordings
pub struct ObservationReader;

impl ObservationReader {
    /// Parse a JSON string containing an array of records
    pub fn parse_array(json: &str) -> Result<Vec<ObservationRecord>, ProctorError> {
        let records: Vec<ObservationRecord> = serde_json::from_str(json)?;
        Ok(records)
    }

    /// Parse NDJSON (newline-delimited JSON) records
    pub fn parse_ndjson(ndjson: &str) -> Result<Vec<ObservationRecord>, ProctorError> {
        let mut records = Vec::new();
        for (line_num, line) in ndjson.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<ObservationRecord>(trimmed) {
                Ok(record) => records.push(record),
                Err(e) => {
                    return Err(ProctorError::ParseError(format!(
                        "Failed to parse line {}: {}",
                        line_num + 1,
                        e
                    )));
                }
            }
        }
        Ok(records)
    }

    /// Validate a batch of records; only failures are returned
    ///
    /// Besides per-record checks, timestamps must be non-decreasing since a
    /// session has a single logical timeline.
    pub fn validate_records(records: &[ObservationRecord]) -> Vec<ValidationResult> {
        let mut results = Vec::new();
        let mut previous = None;

        for (index, record) in records.iter().enumerate() {
            let error = match (record.validate(), previous) {
                (Err(e), _) => Some(e),
                (Ok(()), Some(prev)) if record.timestamp < prev => Some(ValidationError::OutOfOrder {
                    previous: prev,
                    current: record.timestamp,
                }),
                _ => None,
            };
            previous = Some(previous.map_or(record.timestamp, |p| record.timestamp.max(p)));

            if let Some(error) = error {
                results.push(ValidationResult {
                    index,
                    modality: record.modality().as_str(),
                    error,
                });
            }
        }
        results
    }
}

/// Result of record validation
#[derive(Debug)]
pub struct ValidationResult {
    pub index: usize,
    pub modality: &'static str,
    pub error: ValidationError,
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECORDING: &str = r#"{"schema_version":"proctor.observation.v1","timestamp":"2025-03-01T10:00:00Z","modality":"face","faces":[]}
{"schema_version":"proctor.observation.v1","timestamp":"2025-03-01T10:00:00.700Z","modality":"objects","predictions":[]}

{"schema_version":"proctor.observation.v1","timestamp":"2025-03-01T10:00:01Z","modality":"audio","level":12.0}"#;

    #[test]
    fn test_parse_ndjson() {
        let records = ObservationReader::parse_ndjson(RECORDING).unwrap();
        assert_eq!(records.len(), 3);
        assert!(ObservationReader::validate_records(&records).is_empty());
    }

    #[test]
    fn test_parse_ndjson_reports_line() {
        let err = ObservationReader::parse_ndjson("{\"schema_version\":1}").unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn test_parse_array() {
        let json = format!("[{}]", RECORDING.lines().filter(|l| !l.is_empty()).collect::<Vec<_>>().join(","));
        assert_eq!(ObservationReader::parse_array(&json).unwrap().len(), 3);
    }

    #[test]
    fn test_out_of_order_is_flagged() {
        let mut records = ObservationReader::parse_ndjson(RECORDING).unwrap();
        records.swap(0, 2);
        let results = ObservationReader::validate_records(&records);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].index, 1);
        assert!(matches!(results[0].error, ValidationError::OutOfOrder { .. }));
    }
}
