//! In-memory report store

use super::ReportStore;
use crate::error::ProctorError;
use crate::report::Report;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct MemoryReportStore {
    reports: Mutex<Vec<Report>>,
}

impl MemoryReportStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Report>> {
        match self.reports.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl ReportStore for MemoryReportStore {
    fn save_report(&self, report: &Report) -> Result<(), ProctorError> {
        report.validate()?;
        let mut reports = self.lock();
        if reports.iter().any(|r| r.report_id == report.report_id) {
            return Err(ProctorError::ReportSaveFailed(format!(
                "report {} already saved",
                report.report_id
            )));
        }
        reports.push(report.clone());
        Ok(())
    }

    fn list_reports(&self) -> Result<Vec<Report>, ProctorError> {
        Ok(self.lock().iter().rev().cloned().collect())
    }

    fn get_report(&self, report_id: Uuid) -> Result<Option<Report>, ProctorError> {
        Ok(self.lock().iter().find(|r| r.report_id == report_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_newest_first() {
        let store = MemoryReportStore::new();
        let first = Report::assemble("a", None, None, Vec::new());
        let second = Report::assemble("b", None, None, Vec::new());
        store.save_report(&first).unwrap();
        store.save_report(&second).unwrap();

        let ids: Vec<String> = store
            .list_reports()
            .unwrap()
            .into_iter()
            .map(|r| r.candidate_id)
            .collect();
        assert_eq!(ids, vec!["b".to_string(), "a".to_string()]);
        assert_eq!(store.get_report(first.report_id).unwrap(), Some(first));
    }

    #[test]
    fn test_duplicate_and_invalid_rejected() {
        let store = MemoryReportStore::new();
        let report = Report::assemble("a", None, None, Vec::new());
        store.save_report(&report).unwrap();
        assert!(matches!(
            store.save_report(&report),
            Err(ProctorError::ReportSaveFailed(_))
        ));
        assert!(store.save_report(&Report::assemble("", None, None, Vec::new())).is_err());
        assert_eq!(store.len(), 1);
    }
}
