//! Real-time alerts
//!
//! Alert-worthy events are forwarded to an [`AlertSink`] as they are
//! appended, so a proctor can react during the session rather than after it.

use crate::types::{Event, EventKind};
use chrono::{DateTime, Utc};
use log::warn;
use serde::Serialize;
use std::sync::{Arc, Mutex};

/// Alert raised for one event
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub kind: EventKind,
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

impl Alert {
    /// Alert for `event`, or `None` when its kind is not alert-worthy
    pub fn for_event(event: &Event) -> Option<Self> {
        if !event.kind.is_alertable() {
            return None;
        }
        let message = match event.kind {
            EventKind::LookingAwayFlag => "Candidate looked away > threshold".to_string(),
            EventKind::NoFaceDetected => "Face missing".to_string(),
            EventKind::MultipleFacesDetected => "Multiple faces detected".to_string(),
            EventKind::ObjectDetected => format!(
                "Object detected: {}",
                event.object_class().unwrap_or("unknown")
            ),
            EventKind::DrowsinessDetected => "Possible drowsiness detected".to_string(),
            EventKind::BackgroundVoiceDetected => "Background voices detected".to_string(),
            other => other.as_str().to_string(),
        };
        Some(Self {
            kind: event.kind,
            timestamp: event.timestamp,
            message,
        })
    }
}

/// Receiver of real-time alerts; must not block
pub trait AlertSink: Send + Sync {
    fn raise(&self, alert: Alert);
}

/// Sink that writes alerts to the log at warn level
#[derive(Debug, Default)]
pub struct LogAlertSink;

impl AlertSink for LogAlertSink {
    fn raise(&self, alert: Alert) {
        warn!("[{}] {} ({})", alert.kind, alert.message, alert.timestamp.to_rfc3339());
    }
}

/// Sink that keeps alerts in memory
#[derive(Debug, Default, Clone)]
pub struct CollectingAlertSink {
    alerts: Arc<Mutex<Vec<Alert>>>,
}

impl CollectingAlertSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alerts(&self) -> Vec<Alert> {
        match self.alerts.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl AlertSink for CollectingAlertSink {
    fn raise(&self, alert: Alert) {
        let mut guard = match self.alerts.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.push(alert);
    }
}

/// Forward every alert-worthy event in `events` to `sink`
pub fn dispatch(sink: &dyn AlertSink, events: &[Event]) {
    for alert in events.iter().filter_map(Alert::for_event) {
        sink.raise(alert);
    }
}
