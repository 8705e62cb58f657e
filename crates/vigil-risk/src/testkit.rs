//! Shared fixtures for the crate's tests.

use vigil_models::landmark::pose_index as pi;
use vigil_models::{BoundingBox, DetectorFamily, Landmark, PoseSample, SubjectId};

/// Build a pose sample with the torso tilted `theta_deg` from vertical.
///
/// Hips, knees and ankles stay on a fixed vertical stance; only the
/// shoulder line swings, so posture deviation varies while balance stays
/// constant.
pub(crate) fn tilted_sample(ts_ns: u64, theta_deg: f32) -> PoseSample {
    tilted_sample_for(ts_ns, theta_deg, "s1")
}

/// Build a fall-in-progress sample: at `progress` 0 the subject stands
/// upright; at 1 the torso is near-horizontal and the hips have slid far
/// off the stance line, so posture and balance both degrade.
pub(crate) fn falling_sample(ts_ns: u64, progress: f32) -> PoseSample {
    let progress = progress.clamp(0.0, 1.0);
    let mut landmarks: Vec<Option<Landmark>> = vec![None; 33];
    let ankle_y = 450.0f32;
    let hip_y = 300.0 + 100.0 * progress;
    let hip_mid_x = 200.0 + 120.0 * progress;
    let torso = 120.0f32;
    let theta = (85.0 * progress).to_radians();
    let shoulder = (hip_mid_x + torso * theta.sin(), hip_y - torso * theta.cos());

    landmarks[pi::LEFT_SHOULDER] = Some(Landmark::new(shoulder.0 - 30.0, shoulder.1, 0.9));
    landmarks[pi::RIGHT_SHOULDER] = Some(Landmark::new(shoulder.0 + 30.0, shoulder.1, 0.9));
    landmarks[pi::LEFT_HIP] = Some(Landmark::new(hip_mid_x - 30.0, hip_y, 0.9));
    landmarks[pi::RIGHT_HIP] = Some(Landmark::new(hip_mid_x + 30.0, hip_y, 0.9));
    landmarks[pi::LEFT_ANKLE] = Some(Landmark::new(170.0, ankle_y, 0.9));
    landmarks[pi::RIGHT_ANKLE] = Some(Landmark::new(230.0, ankle_y, 0.9));
    landmarks[pi::LEFT_KNEE] = Some(Landmark::new(170.0, (hip_y + ankle_y) / 2.0, 0.9));
    landmarks[pi::RIGHT_KNEE] = Some(Landmark::new(230.0, (hip_y + ankle_y) / 2.0, 0.9));

    PoseSample::new(
        ts_ns,
        SubjectId::from("s1"),
        DetectorFamily::Pose,
        landmarks,
        BoundingBox::new(100.0, 100.0, 300.0, 400.0),
    )
    .unwrap()
}

pub(crate) fn tilted_sample_for(ts_ns: u64, theta_deg: f32, subject: &str) -> PoseSample {
    let mut landmarks: Vec<Option<Landmark>> = vec![None; 33];
    let hip_y = 300.0f32;
    let torso = 120.0f32;
    let theta = theta_deg.to_radians();
    let shoulder = (200.0 + torso * theta.sin(), hip_y - torso * theta.cos());

    landmarks[pi::LEFT_SHOULDER] = Some(Landmark::new(shoulder.0 - 30.0, shoulder.1, 0.9));
    landmarks[pi::RIGHT_SHOULDER] = Some(Landmark::new(shoulder.0 + 30.0, shoulder.1, 0.9));
    landmarks[pi::LEFT_HIP] = Some(Landmark::new(170.0, hip_y, 0.9));
    landmarks[pi::RIGHT_HIP] = Some(Landmark::new(230.0, hip_y, 0.9));
    landmarks[pi::LEFT_ANKLE] = Some(Landmark::new(170.0, hip_y + 150.0, 0.9));
    landmarks[pi::RIGHT_ANKLE] = Some(Landmark::new(230.0, hip_y + 150.0, 0.9));
    landmarks[pi::LEFT_KNEE] = Some(Landmark::new(170.0, hip_y + 75.0, 0.9));
    landmarks[pi::RIGHT_KNEE] = Some(Landmark::new(230.0, hip_y + 75.0, 0.9));

    PoseSample::new(
        ts_ns,
        SubjectId::from(subject),
        DetectorFamily::Pose,
        landmarks,
        BoundingBox::new(100.0, 100.0, 250.0, 400.0),
    )
    .unwrap()
}
