//! Silhouette-based generic CPU pose backend.
//!
//! The fallback of last resort: no model file, no accelerator. It
//! segments the foreground by luminance deviation from the frame mean,
//! fits a principal body axis through the silhouette, and places the 33
//! pose landmarks at anatomical fractions along that axis. Visibility is
//! reported low so downstream scoring weights these detections
//! accordingly.

use vigil_models::landmark::pose_index as pi;
use vigil_models::DetectorFamily;

use crate::backend::{BackendClass, BackendDescriptor, Capabilities, LatencyClass};
use crate::detector::{Detector, RawCoords, RawLandmark, RawOutput, RawSubject};
use crate::error::{DetectError, DetectResult};

pub const BACKEND_NAME: &str = "heuristic-cpu";

/// Input resolution the silhouette analysis runs at.
const INPUT_W: u32 = 256;
const INPUT_H: u32 = 256;

/// Minimum fraction of foreground pixels to report a subject at all.
const MIN_COVERAGE: f32 = 0.01;

/// Visibility attached to synthesized landmarks.
const SYNTH_VISIBILITY: f32 = 0.3;

pub struct HeuristicPoseBackend {
    descriptor: BackendDescriptor,
    closed: bool,
}

impl HeuristicPoseBackend {
    pub fn new() -> Self {
        Self {
            descriptor: BackendDescriptor {
                name: BACKEND_NAME.to_string(),
                class: BackendClass::GenericCpu,
                capabilities: Capabilities {
                    pose: true,
                    face: false,
                    hand: false,
                    fp16: false,
                    int8: false,
                },
                latency: LatencyClass::Realtime,
                platforms: Vec::new(),
            },
            closed: false,
        }
    }
}

impl Default for HeuristicPoseBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Foreground statistics of a luminance image.
struct Silhouette {
    count: usize,
    mean_x: f32,
    mean_y: f32,
    min_y: f32,
    max_y: f32,
    min_x: f32,
    max_x: f32,
    /// Covariance terms for the principal axis.
    cov_xx: f32,
    cov_xy: f32,
    cov_yy: f32,
}

fn segment(input: &[u8], width: u32, height: u32) -> Silhouette {
    let n = (width * height) as usize;
    let mut luma = vec![0f32; n];
    let mut total = 0f32;
    for (i, px) in input.chunks_exact(3).enumerate().take(n) {
        let y = 0.299 * px[0] as f32 + 0.587 * px[1] as f32 + 0.114 * px[2] as f32;
        luma[i] = y;
        total += y;
    }
    let mean = total / n as f32;

    // Foreground = pixels deviating strongly from the global mean.
    let threshold = 32.0f32;
    let mut s = Silhouette {
        count: 0,
        mean_x: 0.0,
        mean_y: 0.0,
        min_y: f32::MAX,
        max_y: f32::MIN,
        min_x: f32::MAX,
        max_x: f32::MIN,
        cov_xx: 0.0,
        cov_xy: 0.0,
        cov_yy: 0.0,
    };
    let mut sum_x = 0f64;
    let mut sum_y = 0f64;
    let mut fg = Vec::new();
    for y in 0..height {
        for x in 0..width {
            let v = luma[(y * width + x) as usize];
            if (v - mean).abs() > threshold {
                fg.push((x as f32, y as f32));
                sum_x += x as f64;
                sum_y += y as f64;
                s.min_x = s.min_x.min(x as f32);
                s.max_x = s.max_x.max(x as f32);
                s.min_y = s.min_y.min(y as f32);
                s.max_y = s.max_y.max(y as f32);
            }
        }
    }
    s.count = fg.len();
    if s.count == 0 {
        return s;
    }
    s.mean_x = (sum_x / s.count as f64) as f32;
    s.mean_y = (sum_y / s.count as f64) as f32;
    for (x, y) in &fg {
        let dx = x - s.mean_x;
        let dy = y - s.mean_y;
        s.cov_xx += dx * dx;
        s.cov_xy += dx * dy;
        s.cov_yy += dy * dy;
    }
    s
}

/// Unit vector of the dominant silhouette axis, pointing downward.
fn principal_axis(s: &Silhouette) -> (f32, f32) {
    // Leading eigenvector of the 2x2 covariance matrix.
    let tr = s.cov_xx + s.cov_yy;
    let det = s.cov_xx * s.cov_yy - s.cov_xy * s.cov_xy;
    let lambda = tr / 2.0 + ((tr * tr / 4.0 - det).max(0.0)).sqrt();
    let (mut ax, mut ay) = if s.cov_xy.abs() > f32::EPSILON {
        (lambda - s.cov_yy, s.cov_xy)
    } else if s.cov_xx >= s.cov_yy {
        (1.0, 0.0)
    } else {
        (0.0, 1.0)
    };
    let norm = (ax * ax + ay * ay).sqrt();
    if norm > f32::EPSILON {
        ax /= norm;
        ay /= norm;
    }
    if ay < 0.0 {
        ax = -ax;
        ay = -ay;
    }
    (ax, ay)
}

/// Anatomical fractions along the head-to-foot axis, with lateral
/// offsets as a fraction of silhouette width.
const BODY_PLAN: &[(usize, f32, f32)] = &[
    (pi::NOSE, 0.05, 0.0),
    (pi::LEFT_SHOULDER, 0.22, -0.5),
    (pi::RIGHT_SHOULDER, 0.22, 0.5),
    (pi::LEFT_ELBOW, 0.38, -0.6),
    (pi::RIGHT_ELBOW, 0.38, 0.6),
    (pi::LEFT_WRIST, 0.5, -0.6),
    (pi::RIGHT_WRIST, 0.5, 0.6),
    (pi::LEFT_HIP, 0.55, -0.3),
    (pi::RIGHT_HIP, 0.55, 0.3),
    (pi::LEFT_KNEE, 0.75, -0.3),
    (pi::RIGHT_KNEE, 0.75, 0.3),
    (pi::LEFT_ANKLE, 0.95, -0.3),
    (pi::RIGHT_ANKLE, 0.95, 0.3),
];

impl Detector for HeuristicPoseBackend {
    fn infer(
        &mut self,
        input: &[u8],
        width: u32,
        height: u32,
        family: DetectorFamily,
    ) -> DetectResult<RawOutput> {
        if self.closed {
            return Err(DetectError::Closed);
        }
        if family != DetectorFamily::Pose {
            return Err(DetectError::backend_failed(
                BACKEND_NAME,
                format!("{family:?} is not supported"),
            ));
        }
        if input.len() < (width * height * 3) as usize {
            return Err(DetectError::InvalidInput("input buffer too small".to_string()));
        }

        let s = segment(input, width, height);
        let coverage = s.count as f32 / (width * height) as f32;
        if coverage < MIN_COVERAGE {
            return Ok(RawOutput {
                subjects: Vec::new(),
                coords: RawCoords::InputPixels,
            });
        }

        let (ax, ay) = principal_axis(&s);
        let half_len = ((s.max_y - s.min_y).max(s.max_x - s.min_x)) / 2.0;
        let head = (s.mean_x - ax * half_len, s.mean_y - ay * half_len);
        let body_w = (s.max_x - s.min_x).max(4.0) * 0.25;
        // Perpendicular to the body axis.
        let (px, py) = (-ay, ax);

        let mut landmarks: Vec<RawLandmark> = vec![None; family.landmark_count()];
        for &(idx, frac, lateral) in BODY_PLAN {
            let along = frac * half_len * 2.0;
            let x = head.0 + ax * along + px * lateral * body_w;
            let y = head.1 + ay * along + py * lateral * body_w;
            landmarks[idx] = Some((x, y, None, SYNTH_VISIBILITY));
        }

        let subject = RawSubject {
            bbox: (s.min_x, s.min_y, s.max_x - s.min_x, s.max_y - s.min_y),
            landmarks,
            confidence: (coverage * 4.0).clamp(0.2, 0.5),
        };

        Ok(RawOutput {
            subjects: vec![subject],
            coords: RawCoords::InputPixels,
        })
    }

    fn input_size(&self) -> (u32, u32) {
        (INPUT_W, INPUT_H)
    }

    fn describe(&self) -> &BackendDescriptor {
        &self.descriptor
    }

    fn close(&mut self) {
        self.closed = true;
    }
}
