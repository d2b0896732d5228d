//! Report persistence
//!
//! A store saves finished reports and lists them newest first. Two
//! implementations ship with the crate: an in-memory store for tests and
//! embedding, and a SQLite store for durable local history.

mod memory;
mod sqlite;

pub use memory::MemoryReportStore;
pub use sqlite::SqliteReportStore;

use crate::error::ProctorError;
use crate::report::Report;
use uuid::Uuid;

/// Save/query contract for reports
///
/// Save failures surface as [`ProctorError::ReportSaveFailed`], query
/// failures as [`ProctorError::ReportQueryFailed`].
pub trait ReportStore: Send + Sync {
    fn save_report(&self, report: &Report) -> Result<(), ProctorError>;

    /// All reports, most recently saved first
    fn list_reports(&self) -> Result<Vec<Report>, ProctorError>;

    fn get_report(&self, report_id: Uuid) -> Result<Option<Report>, ProctorError>;
}
