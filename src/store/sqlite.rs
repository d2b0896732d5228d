//! SQLite report store
//!
//! Reports live in a single `reports` table. Scalar fields get their own
//! columns for querying; events, summary and producer are kept as JSON text.
//! The schema is versioned with the `user_version` pragma.

use super::ReportStore;
use crate::error::ProctorError;
use crate::report::{Report, ReportProducer};
use crate::scoring::ScoreSummary;
use crate::types::Event;
use chrono::{DateTime, SecondsFormat, Utc};
use log::{debug, info};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

const CURRENT_SCHEMA_VERSION: i32 = 1;

const SELECT_COLUMNS: &str = "SELECT id, candidate_id, started_at, ended_at, duration_ms,
        events_json, summary_json, producer_json
     FROM reports";

pub struct SqliteReportStore {
    conn: Mutex<Connection>,
}

impl SqliteReportStore {
    /// Open (or create) a database file and bring its schema up to date
    pub fn open(path: &Path) -> Result<Self, ProctorError> {
        let conn = Connection::open(path).map_err(|e| {
            ProctorError::StoreUnavailable(format!("cannot open {}: {}", path.display(), e))
        })?;
        info!("opened report store at {}", path.display());
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, ProctorError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| ProctorError::StoreUnavailable(e.to_string()))?;
        Self::from_connection(conn)
    }

    fn from_connection(mut conn: Connection) -> Result<Self, ProctorError> {
        run_migrations(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        match self.conn.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn count(&self) -> Result<usize, ProctorError> {
        let count: i64 = self
            .lock()
            .query_row("SELECT COUNT(*) FROM reports", [], |row| row.get(0))
            .map_err(query_failed)?;
        usize::try_from(count).map_err(|_| ProctorError::ReportQueryFailed(format!("bad count {count}")))
    }
}

fn run_migrations(conn: &mut Connection) -> Result<(), ProctorError> {
    let mut version: i32 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .map_err(|e| unavailable("failed to read user_version pragma", e))?;

    if version > CURRENT_SCHEMA_VERSION {
        return Err(ProctorError::StoreUnavailable(format!(
            "database version ({}) is newer than supported schema ({})",
            version, CURRENT_SCHEMA_VERSION
        )));
    }

    if version == CURRENT_SCHEMA_VERSION {
        return Ok(());
    }

    let tx = conn
        .transaction()
        .map_err(|e| unavailable("failed to open migration transaction", e))?;

    while version < CURRENT_SCHEMA_VERSION {
        let next_version = version + 1;
        apply_migration(&tx, next_version)?;
        version = next_version;
    }

    tx.pragma_update(None, "user_version", CURRENT_SCHEMA_VERSION)
        .map_err(|e| unavailable("failed to update user_version pragma", e))?;
    tx.commit()
        .map_err(|e| unavailable("failed to commit migrations", e))?;
    debug!("report store migrated to schema v{}", CURRENT_SCHEMA_VERSION);

    Ok(())
}

fn apply_migration(tx: &Transaction<'_>, version: i32) -> Result<(), ProctorError> {
    match version {
        1 => tx
            .execute_batch(include_str!("schemas/schema_v1.sql"))
            .map_err(|e| unavailable("failed to execute schema_v1.sql", e)),
        _ => Err(ProctorError::StoreUnavailable(format!(
            "unknown migration target version: {version}"
        ))),
    }
}

fn unavailable(context: &str, err: rusqlite::Error) -> ProctorError {
    ProctorError::StoreUnavailable(format!("{context}: {err}"))
}

fn query_failed(err: rusqlite::Error) -> ProctorError {
    ProctorError::ReportQueryFailed(err.to_string())
}

fn format_datetime(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>, ProctorError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| ProctorError::ReportQueryFailed(format!("failed to parse {field}: {e}")))
}

fn parse_optional_datetime(
    value: Option<String>,
    field: &str,
) -> Result<Option<DateTime<Utc>>, ProctorError> {
    match value {
        Some(raw) => parse_datetime(&raw, field).map(Some),
        None => Ok(None),
    }
}

/// Raw column values, decoded outside the rusqlite row callback
struct ReportRow {
    id: String,
    candidate_id: String,
    started_at: Option<String>,
    ended_at: Option<String>,
    duration_ms: Option<i64>,
    events_json: String,
    summary_json: String,
    producer_json: String,
}

fn read_row(row: &Row) -> rusqlite::Result<ReportRow> {
    Ok(ReportRow {
        id: row.get("id")?,
        candidate_id: row.get("candidate_id")?,
        started_at: row.get("started_at")?,
        ended_at: row.get("ended_at")?,
        duration_ms: row.get("duration_ms")?,
        events_json: row.get("events_json")?,
        summary_json: row.get("summary_json")?,
        producer_json: row.get("producer_json")?,
    })
}

fn row_to_report(row: ReportRow) -> Result<Report, ProctorError> {
    let decode = |field: &str, e: serde_json::Error| {
        ProctorError::ReportQueryFailed(format!("failed to decode {field}: {e}"))
    };

    Ok(Report {
        report_id: Uuid::parse_str(&row.id)
            .map_err(|e| ProctorError::ReportQueryFailed(format!("bad report id {}: {}", row.id, e)))?,
        candidate_id: row.candidate_id,
        started_at: parse_optional_datetime(row.started_at, "started_at")?,
        ended_at: parse_optional_datetime(row.ended_at, "ended_at")?,
        duration_ms: row.duration_ms,
        events: serde_json::from_str::<Vec<Event>>(&row.events_json)
            .map_err(|e| decode("events_json", e))?,
        summary: serde_json::from_str::<ScoreSummary>(&row.summary_json)
            .map_err(|e| decode("summary_json", e))?,
        producer: serde_json::from_str::<ReportProducer>(&row.producer_json)
            .map_err(|e| decode("producer_json", e))?,
    })
}

impl ReportStore for SqliteReportStore {
    fn save_report(&self, report: &Report) -> Result<(), ProctorError> {
        report.validate()?;
        let encode = |e: serde_json::Error| ProctorError::ReportSaveFailed(e.to_string());

        let events_json = serde_json::to_string(&report.events).map_err(encode)?;
        let summary_json = serde_json::to_string(&report.summary).map_err(encode)?;
        let producer_json = serde_json::to_string(&report.producer).map_err(encode)?;

        self.lock()
            .execute(
                "INSERT INTO reports (id, candidate_id, started_at, ended_at, duration_ms,
                    final_score, deductions, events_json, summary_json, producer_json, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    report.report_id.to_string(),
                    report.candidate_id,
                    report.started_at.as_ref().map(format_datetime),
                    report.ended_at.as_ref().map(format_datetime),
                    report.duration_ms,
                    report.summary.final_score,
                    report.summary.deductions,
                    events_json,
                    summary_json,
                    producer_json,
                    format_datetime(&Utc::now()),
                ],
            )
            .map_err(|e| ProctorError::ReportSaveFailed(e.to_string()))?;

        debug!("saved report {} for {}", report.report_id, report.candidate_id);
        Ok(())
    }

    fn list_reports(&self) -> Result<Vec<Report>, ProctorError> {
        let rows = {
            let conn = self.lock();
            let mut stmt = conn
                .prepare(&format!("{SELECT_COLUMNS} ORDER BY created_at DESC, rowid DESC"))
                .map_err(query_failed)?;
            let rows = stmt
                .query_map([], read_row)
                .map_err(query_failed)?
                .collect::<rusqlite::Result<Vec<ReportRow>>>()
                .map_err(query_failed)?;
            rows
        };

        rows.into_iter().map(row_to_report).collect()
    }

    fn get_report(&self, report_id: Uuid) -> Result<Option<Report>, ProctorError> {
        let row = self
            .lock()
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE id = ?1"),
                params![report_id.to_string()],
                read_row,
            )
            .optional()
            .map_err(query_failed)?;

        row.map(row_to_report).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EventKind;
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;

    fn report(candidate: &str) -> Report {
        let start = Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap();
        let events = vec![
            Event::new(EventKind::NoFaceDetected, start + Duration::seconds(5))
                .with("start", start + Duration::seconds(5)),
            Event::new(EventKind::MultipleFacesDetected, start + Duration::seconds(20)).with("count", 2usize),
        ];
        Report::assemble(candidate, Some(start), Some(start + Duration::minutes(30)), events)
    }

    #[test]
    fn test_save_and_list_newest_first() {
        let store = SqliteReportStore::open_in_memory().unwrap();
        let older = report("ada");
        let newer = report("grace");
        store.save_report(&older).unwrap();
        store.save_report(&newer).unwrap();

        let listed = store.list_reports().unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0], newer);
        assert_eq!(listed[1], older);
        assert!(listed.iter().all(Report::is_consistent));
        assert_eq!(store.count().unwrap(), 2);
    }

    #[test]
    fn test_get_report() {
        let store = SqliteReportStore::open_in_memory().unwrap();
        let saved = report("ada");
        store.save_report(&saved).unwrap();

        assert_eq!(store.get_report(saved.report_id).unwrap(), Some(saved));
        assert_eq!(store.get_report(Uuid::new_v4()).unwrap(), None);
    }

    #[test]
    fn test_duplicate_id_is_a_save_failure() {
        let store = SqliteReportStore::open_in_memory().unwrap();
        let saved = report("ada");
        store.save_report(&saved).unwrap();
        assert!(matches!(
            store.save_report(&saved),
            Err(ProctorError::ReportSaveFailed(_))
        ));
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        run_migrations(&mut conn).unwrap();
        run_migrations(&mut conn).unwrap();
        let version: i32 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap();
        assert_eq!(version, CURRENT_SCHEMA_VERSION);
    }

    #[test]
    fn test_newer_database_is_rejected() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "user_version", 99).unwrap();
        assert!(matches!(
            run_migrations(&mut conn),
            Err(ProctorError::StoreUnavailable(_))
        ));
    }
}
