//! Joint-angle computation.

use std::collections::HashMap;

use vigil_models::{Landmark, PoseSample};

use crate::config::JointTriple;

/// Interior angle at `mid` formed by `first` and `last`, in degrees
/// within [0, 180].
pub fn interior_angle(first: Landmark, mid: Landmark, last: Landmark) -> f32 {
    let v1 = (first.x - mid.x, first.y - mid.y);
    let v2 = (last.x - mid.x, last.y - mid.y);
    let n1 = (v1.0 * v1.0 + v1.1 * v1.1).sqrt();
    let n2 = (v2.0 * v2.0 + v2.1 * v2.1).sqrt();
    if n1 <= f32::EPSILON || n2 <= f32::EPSILON {
        return 0.0;
    }
    let cos = ((v1.0 * v2.0 + v1.1 * v2.1) / (n1 * n2)).clamp(-1.0, 1.0);
    cos.acos().to_degrees()
}

/// Compute every configured joint angle for a sample.
///
/// Triples with any missing landmark are skipped entirely; low-visibility
/// landmarks still contribute (missing and low-confidence are distinct).
pub fn compute_joint_angles(sample: &PoseSample, triples: &[JointTriple]) -> HashMap<String, f32> {
    let mut angles = HashMap::with_capacity(triples.len());
    for triple in triples {
        let (first, mid, last) = (
            sample.landmark(triple.first),
            sample.landmark(triple.mid),
            sample.landmark(triple.last),
        );
        if let (Some(a), Some(b), Some(c)) = (first, mid, last) {
            angles.insert(triple.name.clone(), interior_angle(a, b, c));
        }
    }
    angles
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_models::{BoundingBox, DetectorFamily, SubjectId};

    fn lm(x: f32, y: f32) -> Landmark {
        Landmark::new(x, y, 0.9)
    }

    #[test]
    fn test_right_angle() {
        let angle = interior_angle(lm(0.0, 0.0), lm(0.0, 1.0), lm(1.0, 1.0));
        assert!((angle - 90.0).abs() < 1e-3);
    }

    #[test]
    fn test_straight_line() {
        let angle = interior_angle(lm(0.0, 0.0), lm(0.0, 1.0), lm(0.0, 2.0));
        assert!((angle - 180.0).abs() < 1e-3);
    }

    #[test]
    fn test_degenerate_points() {
        assert_eq!(interior_angle(lm(1.0, 1.0), lm(1.0, 1.0), lm(2.0, 2.0)), 0.0);
    }

    #[test]
    fn test_missing_landmark_skips_triple() {
        let mut landmarks = vec![Some(lm(0.0, 0.0)); 33];
        landmarks[2] = None;
        let sample = PoseSample::new(
            0,
            SubjectId::from("s"),
            DetectorFamily::Pose,
            landmarks,
            BoundingBox::new(0.0, 0.0, 1.0, 1.0),
        )
        .unwrap();
        let triples = vec![
            JointTriple {
                name: "with_missing".to_string(),
                first: 1,
                mid: 2,
                last: 3,
            },
            JointTriple {
                name: "complete".to_string(),
                first: 4,
                mid: 5,
                last: 6,
            },
        ];
        let angles = compute_joint_angles(&sample, &triples);
        assert!(!angles.contains_key("with_missing"));
        assert!(angles.contains_key("complete"));
    }
}
