//! Error types for the proctor engine

use thiserror::Error;

/// Errors surfaced by sessions, configuration, adapters and report stores
#[derive(Debug, Error)]
pub enum ProctorError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Session has not been started")]
    SessionNotStarted,

    #[error("Session has already been started")]
    SessionAlreadyStarted,

    #[error("Session is closed")]
    SessionClosed,

    #[error("Failed to save report: {0}")]
    ReportSaveFailed(String),

    #[error("Failed to query reports: {0}")]
    ReportQueryFailed(String),

    #[error("Report store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Failed to parse perceptual payload: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Runtime error: {0}")]
    RuntimeError(String),
}

impl ProctorError {
    /// Stable machine-readable code for the error kind
    pub fn code(&self) -> &'static str {
        match self {
            ProctorError::InvalidConfig(_) => "INVALID_CONFIG",
            ProctorError::SessionNotStarted => "SESSION_NOT_STARTED",
            ProctorError::SessionAlreadyStarted => "SESSION_ALREADY_STARTED",
            ProctorError::SessionClosed => "SESSION_CLOSED",
            ProctorError::ReportSaveFailed(_) => "REPORT_SAVE_FAILED",
            ProctorError::ReportQueryFailed(_) => "REPORT_QUERY_FAILED",
            ProctorError::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            ProctorError::ParseError(_) => "PARSE_ERROR",
            ProctorError::JsonError(_) => "JSON_ERROR",
            ProctorError::RuntimeError(_) => "RUNTIME_ERROR",
        }
    }
}
