//! Proctor Engine - monitoring core for remotely proctored exams
//!
//! The engine turns perceptual signals into a scored integrity report through
//! a deterministic pipeline: signal adaptation → detectors → event log →
//! scoring → report.
//!
//! ## Modules
//!
//! - **Detectors**: presence, gaze, drowsiness, multiple faces, objects and background audio
//! - **Session**: lifecycle, the shared event log and the [`Monitor`] controller
//! - **Runtime**: per-stream tokio tasks driving one session
//! - **Store**: in-memory and SQLite report persistence

pub mod adapters;
pub mod alerts;
pub mod config;
pub mod detectors;
pub mod error;
pub mod event_log;
pub mod report;
pub mod runtime;
pub mod schema;
pub mod scoring;
pub mod session;
pub mod store;
pub mod types;

pub use config::MonitorConfig;
pub use error::ProctorError;
pub use event_log::EventLog;
pub use report::Report;
pub use runtime::MonitorRuntime;
pub use scoring::{score, ScoreSummary};
pub use session::{Monitor, Session, SessionState};
pub use store::{MemoryReportStore, ReportStore, SqliteReportStore};
pub use types::{Event, EventKind};

// Schema exports
pub use schema::{Observation, ObservationReader, ObservationRecord, SCHEMA_VERSION};

/// Engine version embedded in every report
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for reports
pub const PRODUCER_NAME: &str = "proctor-engine";
