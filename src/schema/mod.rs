//! proctor.observation.v1 schema
//!
//! Recorded perceptual input, one record per face frame, object poll or
//! audio tick. Recordings let a session be replayed offline through the same
//! detectors that run live.

mod observation;
mod reader;

pub use observation::*;
pub use reader::*;
