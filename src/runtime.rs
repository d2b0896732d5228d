//! Async monitoring runtime
//!
//! Live sessions receive samples from several independent sources at their
//! own cadence. [`MonitorRuntime`] gives each source its own tokio task and
//! its own bounded queue, so a slow detector never blocks another:
//!
//! - face frames and audio ticks are pushed by the caller
//! - object predictions are either pushed or polled from an [`ObjectSource`]
//!   every `objectPollMs`
//!
//! Polled object predictions are stamped on the session's own timeline: the
//! `now` passed to [`MonitorRuntime::start`] plus the monotonic time elapsed
//! since. [`MonitorRuntime::now`] reads the same clock for pushed samples.
//!
//! Queues keep the newest samples: when a queue is full the oldest sample is
//! dropped. All tasks append through the shared [`Session`], whose lock is the
//! single serialization point for the log. [`MonitorRuntime::end`] snapshots
//! the report first, then cancels and joins every task.

use crate::adapters::ObjectSource;
use crate::alerts::AlertSink;
use crate::config::MonitorConfig;
use crate::detectors::{AudioDetector, Detector, FaceAnalyzer, ObjectDetector};
use crate::error::ProctorError;
use crate::report::Report;
use crate::session::{Session, SessionState};
use crate::types::{AudioObservation, FaceObservation, ObjectObservation};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Default per-stream queue capacity
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Upper bound on one object-detector call before the poll is abandoned
const OBJECT_DETECT_TIMEOUT_MS: u64 = 5_000;

/// Session timeline anchored at the logical start instant
#[derive(Debug, Clone, Copy)]
struct SessionClock {
    started_at: DateTime<Utc>,
    origin: Instant,
}

impl SessionClock {
    fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            origin: Instant::now(),
        }
    }

    fn now(&self) -> DateTime<Utc> {
        let elapsed = chrono::Duration::from_std(self.origin.elapsed()).unwrap_or(chrono::Duration::zero());
        self.started_at + elapsed
    }
}

/// Bounded queue that evicts its oldest sample when full
struct SampleQueue<T> {
    name: &'static str,
    capacity: usize,
    items: Mutex<VecDeque<(DateTime<Utc>, T)>>,
    notify: Notify,
    in_flight: AtomicUsize,
    dropped: AtomicU64,
}

impl<T> SampleQueue<T> {
    fn new(name: &'static str, capacity: usize) -> Self {
        Self {
            name,
            capacity: capacity.max(1),
            items: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            in_flight: AtomicUsize::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    fn items(&self) -> std::sync::MutexGuard<'_, VecDeque<(DateTime<Utc>, T)>> {
        match self.items.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn push(&self, at: DateTime<Utc>, sample: T) {
        {
            let mut items = self.items();
            if items.len() >= self.capacity {
                items.pop_front();
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                debug!("{} queue full, dropped oldest sample ({} total)", self.name, dropped);
            }
            items.push_back((at, sample));
        }
        self.notify.notify_one();
    }

    /// Take everything queued; marks the batch as in flight
    fn take_all(&self) -> Vec<(DateTime<Utc>, T)> {
        let mut items = self.items();
        let batch: Vec<_> = items.drain(..).collect();
        self.in_flight.store(batch.len(), Ordering::SeqCst);
        batch
    }

    fn finish_batch(&self) {
        self.in_flight.store(0, Ordering::SeqCst);
    }

    fn is_settled(&self) -> bool {
        self.items().is_empty() && self.in_flight.load(Ordering::SeqCst) == 0
    }
}

/// Counters for one running session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuntimeStats {
    pub dropped_face_frames: u64,
    pub dropped_object_polls: u64,
    pub dropped_audio_ticks: u64,
    pub failed_object_polls: u64,
}

pub struct MonitorRuntime {
    session: Session,
    clock: SessionClock,
    face_queue: Arc<SampleQueue<FaceObservation>>,
    object_queue: Arc<SampleQueue<ObjectObservation>>,
    audio_queue: Arc<SampleQueue<AudioObservation>>,
    failed_polls: Arc<AtomicU64>,
    cancel_token: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl MonitorRuntime {
    /// Start a session and spawn one task per stream
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(
        candidate_id: impl Into<String>,
        config: MonitorConfig,
        now: DateTime<Utc>,
        object_source: Option<Box<dyn ObjectSource>>,
        alert_sink: Option<Arc<dyn AlertSink>>,
    ) -> Result<Self, ProctorError> {
        config.validate()?;
        tokio::runtime::Handle::try_current()
            .map_err(|e| ProctorError::RuntimeError(format!("no tokio runtime: {e}")))?;

        let mut session = Session::new(candidate_id);
        if let Some(sink) = alert_sink {
            session = session.with_alert_sink(sink);
        }
        session.start(now)?;
        let clock = SessionClock::new(now);

        let cancel_token = CancellationToken::new();
        let face_queue = Arc::new(SampleQueue::new("face", DEFAULT_QUEUE_CAPACITY));
        let object_queue = Arc::new(SampleQueue::new("objects", DEFAULT_QUEUE_CAPACITY));
        let audio_queue = Arc::new(SampleQueue::new("audio", DEFAULT_QUEUE_CAPACITY));
        let failed_polls = Arc::new(AtomicU64::new(0));

        let mut handles = vec![
            tokio::spawn(stream_loop(
                session.clone(),
                FaceAnalyzer::new(&config),
                face_queue.clone(),
                cancel_token.clone(),
            )),
            tokio::spawn(stream_loop(
                session.clone(),
                ObjectDetector::new(&config),
                object_queue.clone(),
                cancel_token.clone(),
            )),
            tokio::spawn(stream_loop(
                session.clone(),
                AudioDetector::new(&config),
                audio_queue.clone(),
                cancel_token.clone(),
            )),
        ];

        if let Some(source) = object_source {
            handles.push(tokio::spawn(object_poll_loop(
                session.clone(),
                ObjectDetector::new(&config),
                source,
                clock,
                Duration::from_millis(config.object_poll_ms),
                failed_polls.clone(),
                cancel_token.clone(),
            )));
        }

        info!("monitor runtime started with {} tasks", handles.len());

        Ok(Self {
            session,
            clock,
            face_queue,
            object_queue,
            audio_queue,
            failed_polls,
            cancel_token,
            handles,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Current instant on the session timeline
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn submit_face(&self, frame: FaceObservation, at: DateTime<Utc>) {
        self.face_queue.push(at, frame);
    }

    pub fn submit_objects(&self, poll: ObjectObservation, at: DateTime<Utc>) {
        self.object_queue.push(at, poll);
    }

    pub fn submit_audio(&self, tick: AudioObservation, at: DateTime<Utc>) {
        self.audio_queue.push(at, tick);
    }

    pub fn stats(&self) -> RuntimeStats {
        RuntimeStats {
            dropped_face_frames: self.face_queue.dropped.load(Ordering::Relaxed),
            dropped_object_polls: self.object_queue.dropped.load(Ordering::Relaxed),
            dropped_audio_ticks: self.audio_queue.dropped.load(Ordering::Relaxed),
            failed_object_polls: self.failed_polls.load(Ordering::Relaxed),
        }
    }

    /// Wait until every pushed sample has been processed
    pub async fn settle(&self) {
        while !(self.face_queue.is_settled()
            && self.object_queue.is_settled()
            && self.audio_queue.is_settled())
        {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }

    /// End the session and tear down every task
    ///
    /// The report reflects the log at the moment `end` runs; samples still
    /// queued are discarded. When this returns no detector task is alive.
    pub async fn end(mut self, now: DateTime<Utc>) -> Result<Report, ProctorError> {
        let report = self.session.end(now);
        self.shutdown().await;
        report
    }

    async fn shutdown(&mut self) {
        self.cancel_token.cancel();
        for handle in self.handles.drain(..) {
            if let Err(err) = handle.await {
                warn!("detector task failed to join: {err}");
            }
        }
        info!("monitor runtime stopped");
    }
}

impl Drop for MonitorRuntime {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

async fn stream_loop<D>(
    session: Session,
    mut detector: D,
    queue: Arc<SampleQueue<D::Sample>>,
    cancel_token: CancellationToken,
) where
    D: Detector + Send + 'static,
    D::Sample: Send + 'static,
{
    loop {
        tokio::select! {
            _ = queue.notify.notified() => {
                for (at, sample) in queue.take_all() {
                    match session.observe(&mut detector, &sample, at) {
                        Ok(_) => {}
                        Err(ProctorError::SessionClosed) => break,
                        Err(err) => warn!("{} detector rejected sample: {err}", detector.name()),
                    }
                }
                queue.finish_batch();
            }
            _ = cancel_token.cancelled() => {
                debug!("{} stream shutting down", detector.name());
                break;
            }
        }
    }
}

async fn object_poll_loop(
    session: Session,
    mut detector: ObjectDetector,
    source: Box<dyn ObjectSource>,
    clock: SessionClock,
    interval: Duration,
    failed_polls: Arc<AtomicU64>,
    cancel_token: CancellationToken,
) {
    let source = Arc::new(Mutex::new(source));
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let at = clock.now();
                let source = source.clone();
                let detect = tokio::task::spawn_blocking(move || {
                    let result = match source.try_lock() {
                        Ok(mut guard) => guard.detect(),
                        Err(_) => Err(ProctorError::RuntimeError("object detector still busy".to_string())),
                    };
                    result
                });

                let poll = match tokio::time::timeout(Duration::from_millis(OBJECT_DETECT_TIMEOUT_MS), detect).await {
                    Ok(Ok(Ok(poll))) => poll,
                    Ok(Ok(Err(err))) => {
                        failed_polls.fetch_add(1, Ordering::Relaxed);
                        warn!("object detection failed: {err}");
                        continue;
                    }
                    Ok(Err(join_err)) => {
                        failed_polls.fetch_add(1, Ordering::Relaxed);
                        warn!("object detection worker failed: {join_err}");
                        continue;
                    }
                    Err(_) => {
                        failed_polls.fetch_add(1, Ordering::Relaxed);
                        warn!("object detection timeout (> {}ms)", OBJECT_DETECT_TIMEOUT_MS);
                        continue;
                    }
                };

                if session.state() != SessionState::Monitoring {
                    continue;
                }
                if let Err(err) = session.observe(&mut detector, &poll, at) {
                    debug!("object poll discarded: {err}");
                }
            }
            _ = cancel_token.cancelled() => {
                debug!("object poll loop shutting down");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::CollectingAlertSink;
    use crate::detectors::fixtures::{attentive, crowd, t};
    use crate::types::{EventKind, ObjectPrediction};
    use pretty_assertions::assert_eq;

    fn phone_source() -> Box<dyn ObjectSource> {
        Box::new(|| {
            Ok(ObjectObservation {
                predictions: vec![ObjectPrediction {
                    class: "cell phone".to_string(),
                    score: 0.93,
                    bbox: vec![5.0, 5.0, 40.0, 80.0],
                }],
            })
        })
    }

    #[tokio::test]
    async fn test_streams_feed_one_log() {
        let runtime = MonitorRuntime::start("cand-1", MonitorConfig::default(), t(0), None, None).unwrap();

        runtime.submit_face(attentive(), t(100));
        runtime.submit_face(crowd(2), t(200));
        runtime.submit_audio(AudioObservation { level: 75.0 }, t(250));
        runtime.settle().await;

        let report = runtime.end(t(1_000)).await.unwrap();
        assert_eq!(report.summary.count(EventKind::FaceDetected), 0);
        assert_eq!(report.summary.count(EventKind::MultipleFacesDetected), 1);
        assert_eq!(report.summary.count(EventKind::BackgroundVoiceDetected), 1);
        assert_eq!(report.final_score(), 90);
    }

    #[tokio::test]
    async fn test_object_polling_dedupes() {
        let config = MonitorConfig {
            object_poll_ms: 10,
            ..Default::default()
        };
        let sink = CollectingAlertSink::new();
        let runtime = MonitorRuntime::start(
            "cand-1",
            config,
            Utc::now(),
            Some(phone_source()),
            Some(Arc::new(sink.clone())),
        )
        .unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(120)).await;
        let report = runtime.end(Utc::now()).await.unwrap();

        assert_eq!(report.summary.count(EventKind::ObjectDetected), 1);
        assert_eq!(report.final_score(), 80);
        assert_eq!(sink.alerts().len(), 1);
    }

    #[tokio::test]
    async fn test_failing_source_does_not_stop_session() {
        let config = MonitorConfig {
            object_poll_ms: 10,
            ..Default::default()
        };
        let failing: Box<dyn ObjectSource> =
            Box::new(|| Err(ProctorError::ParseError("model not loaded".to_string())));
        let runtime = MonitorRuntime::start("cand-1", config, t(0), Some(failing), None).unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        runtime.submit_audio(AudioObservation { level: 90.0 }, t(100));
        runtime.settle().await;

        assert!(runtime.stats().failed_object_polls >= 1);
        let report = runtime.end(t(500)).await.unwrap();
        assert_eq!(report.events.len(), 1);
    }

    #[tokio::test]
    async fn test_end_snapshots_and_is_final() {
        let runtime = MonitorRuntime::start("cand-1", MonitorConfig::default(), t(0), None, None).unwrap();
        let session = runtime.session().clone();
        runtime.submit_face(crowd(2), t(100));
        runtime.settle().await;

        let report = runtime.end(t(1_000)).await.unwrap();
        assert_eq!(session.state(), SessionState::Ended);
        assert_eq!(session.report(), Some(report.clone()));
        assert_eq!(report.events.len(), 1);
    }

    #[tokio::test]
    async fn test_polled_objects_share_session_timeline() {
        let config = MonitorConfig {
            object_poll_ms: 10,
            ..Default::default()
        };
        let runtime = MonitorRuntime::start("cand-1", config, t(0), Some(phone_source()), None).unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(60)).await;
        let before_end = runtime.now();
        assert!(before_end >= t(0) && before_end < t(60_000));
        runtime.submit_face(crowd(2), before_end);
        runtime.settle().await;

        let report = runtime.end(before_end + chrono::Duration::seconds(1)).await.unwrap();
        let object = report
            .events
            .iter()
            .find(|e| e.kind == EventKind::ObjectDetected)
            .unwrap();
        assert!(object.timestamp >= t(0));
        assert!(object.timestamp <= before_end);
        assert!(report.events.iter().all(|e| e.timestamp < t(60_000)));
    }

    #[test]
    fn test_start_outside_runtime_fails() {
        let err = MonitorRuntime::start("cand-1", MonitorConfig::default(), t(0), None, None);
        assert!(matches!(err, Err(ProctorError::RuntimeError(_))));
    }

    #[test]
    fn test_queue_evicts_oldest() {
        let queue: SampleQueue<u32> = SampleQueue::new("test", 2);
        queue.push(t(0), 1);
        queue.push(t(1), 2);
        queue.push(t(2), 3);
        let batch: Vec<u32> = queue.take_all().into_iter().map(|(_, v)| v).collect();
        assert_eq!(batch, vec![2, 3]);
        assert_eq!(queue.dropped.load(Ordering::Relaxed), 1);
        assert!(!queue.is_settled());
        queue.finish_batch();
        assert!(queue.is_settled());
    }
}
