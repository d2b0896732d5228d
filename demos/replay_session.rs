//! Drive a short synthetic session through the monitor and print its report

use chrono::{Duration, TimeZone, Utc};
use proctor_engine::adapters::{AnalyserAdapter, CocoSsdAdapter, SignalAdapter};
use proctor_engine::alerts::CollectingAlertSink;
use proctor_engine::types::FaceObservation;
use proctor_engine::{Monitor, MonitorConfig, ProctorError};
use std::sync::Arc;

fn main() -> Result<(), ProctorError> {
    let start = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();
    let at = |ms: i64| start + Duration::milliseconds(ms);

    let sink = CollectingAlertSink::new();
    let mut monitor = Monitor::new("demo-candidate", MonitorConfig::default())?
        .with_alert_sink(Arc::new(sink.clone()));
    monitor.start(start)?;

    // The camera sees nobody for twelve seconds
    for i in 0..=120 {
        monitor.observe_face(&FaceObservation::empty(), at(i * 100))?;
    }

    let phone = CocoSsdAdapter.parse(
        r#"[{"class": "cell phone", "score": 0.91, "bbox": [120, 80, 60, 110]},
            {"class": "person", "score": 0.99, "bbox": [0, 0, 640, 480]}]"#,
    )?;
    monitor.observe_objects(&phone, at(12_500))?;
    monitor.observe_objects(&phone, at(13_200))?;

    let noisy = AnalyserAdapter.parse(r#"{"frequencyData": [90, 80, 70, 60, 50]}"#)?;
    monitor.observe_audio(&noisy, at(14_000))?;

    let report = monitor.end(at(15_000))?;

    println!("Alerts raised:");
    for alert in sink.alerts() {
        println!("  [{}] {}", alert.timestamp.format("%H:%M:%S"), alert.message);
    }
    println!("\nEvents:");
    for event in &report.events {
        println!("  {}", event.message());
    }
    println!("\n{}", report.to_json_pretty()?);

    Ok(())
}
