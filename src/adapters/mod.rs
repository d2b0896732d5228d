//! Perceptual signal adapters
//!
//! Adapters parse the raw JSON produced by the perception models (face
//! landmarker, object classifier, audio analyser) into the observation types
//! the detectors consume. They do no thresholding of their own.

mod analyser;
mod coco_ssd;
mod face_mesh;

pub use analyser::{level_from_bins, AnalyserAdapter};
pub use coco_ssd::CocoSsdAdapter;
pub use face_mesh::FaceMeshAdapter;

use crate::error::ProctorError;
use crate::types::ObjectObservation;

/// Trait for perceptual payload adapters
pub trait SignalAdapter {
    /// Observation produced from one payload
    type Output;

    /// Parse one raw JSON payload
    fn parse(&self, raw_json: &str) -> Result<Self::Output, ProctorError>;
}

/// Object detector that is polled on a fixed cadence rather than pushed
///
/// `detect` may block (model inference); callers run it off the async executor.
pub trait ObjectSource: Send + 'static {
    fn detect(&mut self) -> Result<ObjectObservation, ProctorError>;
}

impl<F> ObjectSource for F
where
    F: FnMut() -> Result<ObjectObservation, ProctorError> + Send + 'static,
{
    fn detect(&mut self) -> Result<ObjectObservation, ProctorError> {
        self()
    }
}
