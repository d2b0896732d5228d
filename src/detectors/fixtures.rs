//! Synthetic face-mesh frames shared by detector and session tests

use super::drowsiness::{LEFT_EYE, RIGHT_EYE};
use super::gaze::NOSE_TIP;
use crate::types::{FaceObservation, Landmark};
use chrono::{DateTime, Duration, TimeZone, Utc};

pub(crate) const MESH_POINTS: usize = 468;

pub(crate) fn t(ms: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap() + Duration::milliseconds(ms)
}

/// Full mesh with the nose offset by `dx`/`dy` from the eye midpoint and
/// eyelids `lid` apart (half height) above and below each eye line
pub(crate) fn mesh(dx: f64, dy: f64, lid: f64) -> Vec<Landmark> {
    let mut points = vec![Landmark::new(0.5, 0.55); MESH_POINTS];

    let place = |points: &mut Vec<Landmark>, idx: [usize; 6], left_x: f64| {
        let [corner_a, upper_1, upper_2, corner_b, lower_2, lower_1] = idx;
        points[corner_a] = Landmark::new(left_x, 0.40);
        points[corner_b] = Landmark::new(left_x + 0.06, 0.40);
        points[upper_1] = Landmark::new(left_x + 0.02, 0.40 - lid);
        points[upper_2] = Landmark::new(left_x + 0.04, 0.40 - lid);
        points[lower_2] = Landmark::new(left_x + 0.04, 0.40 + lid);
        points[lower_1] = Landmark::new(left_x + 0.02, 0.40 + lid);
    };

    // Left eye spans 0.40..0.46, right eye 0.54..0.60, eye line at y = 0.40
    place(&mut points, LEFT_EYE, 0.40);
    place(&mut points, RIGHT_EYE, 0.54);
    points[NOSE_TIP] = Landmark::new(0.5 + dx, 0.40 + dy);
    points
}

pub(crate) fn attentive() -> FaceObservation {
    FaceObservation::single(mesh(0.0, 0.03, 0.02))
}

pub(crate) fn looking_away() -> FaceObservation {
    FaceObservation::single(mesh(0.15, 0.03, 0.02))
}

pub(crate) fn eyes_closed() -> FaceObservation {
    FaceObservation::single(mesh(0.0, 0.03, 0.002))
}

pub(crate) fn crowd(count: usize) -> FaceObservation {
    FaceObservation {
        faces: (0..count).map(|_| mesh(0.0, 0.03, 0.02)).collect(),
    }
}
