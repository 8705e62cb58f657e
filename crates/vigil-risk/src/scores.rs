//! Derived posture scores.

use vigil_models::landmark::pose_index as pi;
use vigil_models::PoseSample;

/// Midpoint of two landmark indices, if both are present.
fn midpoint(sample: &PoseSample, a: usize, b: usize) -> Option<(f32, f32)> {
    let la = sample.landmark(a)?;
    let lb = sample.landmark(b)?;
    Some(((la.x + lb.x) / 2.0, (la.y + lb.y) / 2.0))
}

/// Torso angle from vertical in degrees: 0 upright, 90 horizontal.
///
/// Measured on the shoulder-midpoint to hip-midpoint line. `None` when
/// either midpoint is missing.
pub fn torso_angle_deg(sample: &PoseSample) -> Option<f32> {
    let shoulders = midpoint(sample, pi::LEFT_SHOULDER, pi::RIGHT_SHOULDER)?;
    let hips = midpoint(sample, pi::LEFT_HIP, pi::RIGHT_HIP)?;
    let dx = hips.0 - shoulders.0;
    let dy = hips.1 - shoulders.1;
    if dx.abs() <= f32::EPSILON && dy.abs() <= f32::EPSILON {
        return None;
    }
    // Angle between the torso line and the image vertical (y grows down).
    Some(dx.abs().atan2(dy).to_degrees().clamp(0.0, 180.0))
}

/// Posture deviation in [0, 1]: 0 at vertical, 1 at `full_deg` or beyond.
pub fn posture_deviation(sample: &PoseSample, full_deg: f32) -> Option<f32> {
    let angle = torso_angle_deg(sample)?;
    Some((angle / full_deg.max(1.0)).clamp(0.0, 1.0))
}

/// Balance score in [0, 1] from the horizontal deviation of the hip
/// midpoint off the ankle midpoint, normalized by stance width.
pub fn balance_score(sample: &PoseSample) -> Option<f32> {
    let hips = midpoint(sample, pi::LEFT_HIP, pi::RIGHT_HIP)?;
    let ankles = midpoint(sample, pi::LEFT_ANKLE, pi::RIGHT_ANKLE)?;
    let left = sample.landmark(pi::LEFT_ANKLE)?;
    let right = sample.landmark(pi::RIGHT_ANKLE)?;
    let stance = (left.x - right.x).abs().max(sample.bbox.width * 0.1).max(1.0);
    let deviation = (hips.0 - ankles.0).abs() / stance;
    Some((1.0 - deviation).clamp(0.0, 1.0))
}

/// Stability score in [0, 1] from torso-angle variance over the recent
/// window; zero variance maps to 1.
pub fn stability_from_variance(angles: &[f32], variance_ref: f32) -> f32 {
    if angles.len() < 2 {
        return 1.0;
    }
    let mean = angles.iter().sum::<f32>() / angles.len() as f32;
    let variance =
        angles.iter().map(|a| (a - mean) * (a - mean)).sum::<f32>() / angles.len() as f32;
    (1.0 - variance / variance_ref.max(f32::EPSILON)).clamp(0.0, 1.0)
}

/// Mean landmark displacement between consecutive samples, normalized by
/// the bounding-box diagonal, clamped to [0, 1].
pub fn activity_level(prev: &PoseSample, current: &PoseSample) -> f32 {
    let diagonal = (current.bbox.width * current.bbox.width
        + current.bbox.height * current.bbox.height)
        .sqrt()
        .max(1.0);
    let mut total = 0.0f32;
    let mut counted = 0usize;
    for (a, b) in prev.landmarks.iter().zip(&current.landmarks) {
        if let (Some(a), Some(b)) = (a, b) {
            total += ((a.x - b.x).powi(2) + (a.y - b.y).powi(2)).sqrt();
            counted += 1;
        }
    }
    if counted == 0 {
        return 0.0;
    }
    (total / counted as f32 / diagonal * 10.0).clamp(0.0, 1.0)
}

/// Slow exponential moving average used for the fatigue indicator.
#[derive(Debug, Clone, Default)]
pub struct FatigueEma {
    value: f32,
    last_ts_ns: Option<u64>,
}

impl FatigueEma {
    /// Fold one stability observation into the EMA.
    ///
    /// The effective alpha is `dt / horizon`, so the average decays over
    /// roughly the configured horizon regardless of sample rate.
    pub fn update(&mut self, ts_ns: u64, stability_score: f32, horizon_secs: u64) -> f32 {
        let decline = (1.0 - stability_score).clamp(0.0, 1.0);
        let alpha = match self.last_ts_ns {
            Some(prev) if ts_ns > prev => {
                let dt = (ts_ns - prev) as f32 / 1_000_000_000.0;
                (dt / horizon_secs.max(1) as f32).clamp(0.0, 1.0)
            }
            Some(_) => 0.0,
            None => 1.0,
        };
        self.value += alpha * (decline - self.value);
        self.last_ts_ns = Some(ts_ns);
        self.value
    }

    pub fn value(&self) -> f32 {
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::tilted_sample;

    #[test]
    fn test_upright_torso() {
        let sample = tilted_sample(0, 0.0);
        let angle = torso_angle_deg(&sample).unwrap();
        assert!(angle < 1.0, "angle {angle}");
        assert!(posture_deviation(&sample, 80.0).unwrap() < 0.02);
    }

    #[test]
    fn test_horizontal_torso() {
        let sample = tilted_sample(0, 85.0);
        let angle = torso_angle_deg(&sample).unwrap();
        assert!(angle > 80.0, "angle {angle}");
        assert_eq!(posture_deviation(&sample, 80.0).unwrap(), 1.0);
    }

    #[test]
    fn test_balanced_stance() {
        let sample = tilted_sample(0, 0.0);
        assert!(balance_score(&sample).unwrap() > 0.95);
    }

    #[test]
    fn test_stability_drops_with_variance() {
        let steady = stability_from_variance(&[10.0, 10.5, 9.5, 10.0], 400.0);
        let shaky = stability_from_variance(&[5.0, 45.0, 10.0, 70.0], 400.0);
        assert!(steady > 0.95);
        assert!(shaky < steady);
    }

    #[test]
    fn test_fatigue_ema_rises_with_instability() {
        let mut ema = FatigueEma::default();
        let mut last = 0.0;
        for i in 0..10u64 {
            last = ema.update(i * 1_000_000_000, 0.2, 60);
        }
        assert!(last > 0.0);
        // Recovery drives it back down.
        for i in 10..200u64 {
            ema.update(i * 1_000_000_000, 1.0, 60);
        }
        assert!(ema.value() < last);
    }

    #[test]
    fn test_activity_level() {
        let a = tilted_sample(0, 0.0);
        let b = tilted_sample(1, 0.0);
        assert_eq!(activity_level(&a, &b), 0.0);
        let c = tilted_sample(2, 45.0);
        assert!(activity_level(&b, &c) > 0.0);
    }
}
