//! Full-pipeline scenarios over scripted sources and backends.

use async_trait::async_trait;

use vigil_detect::{
    DetectorConfig, DetectorStage, RawCoords, RawLandmark, RawOutput, RawSubject, ScriptedBackend,
};
use vigil_models::landmark::pose_index as pi;
use vigil_models::{AlertLevel, AudioChunk, AudioEvent};
use vigil_runtime::{spawn_pipeline, FixedTagger, PipelineCounters, RuntimeConfig};
use vigil_source::{KeywordSpotter, ScriptedSource, SourceResult};

const FRAME_NS: u64 = 33_000_000;
/// Scripted backend input is 256x256; frames match, so the letterbox is
/// the identity and pixel geometry passes straight through.
const SIDE: u32 = 256;

/// Raw pose output for a fall at `progress` (0 upright, 1 collapsed),
/// in detector-input pixels.
fn falling_raw(progress: f32) -> RawOutput {
    let progress = progress.clamp(0.0, 1.0);
    let mut landmarks: Vec<RawLandmark> = vec![None; 33];
    let ankle_y = 225.0f32;
    let hip_y = 150.0 + 50.0 * progress;
    let hip_mid_x = 100.0 + 60.0 * progress;
    let torso = 60.0f32;
    let theta = (85.0 * progress).to_radians();
    let shoulder = (hip_mid_x + torso * theta.sin(), hip_y - torso * theta.cos());

    let mut set = |idx: usize, x: f32, y: f32| {
        landmarks[idx] = Some((x, y, None, 0.9));
    };
    set(pi::LEFT_SHOULDER, shoulder.0 - 15.0, shoulder.1);
    set(pi::RIGHT_SHOULDER, shoulder.0 + 15.0, shoulder.1);
    set(pi::LEFT_HIP, hip_mid_x - 15.0, hip_y);
    set(pi::RIGHT_HIP, hip_mid_x + 15.0, hip_y);
    set(pi::LEFT_ANKLE, 85.0, ankle_y);
    set(pi::RIGHT_ANKLE, 115.0, ankle_y);
    set(pi::LEFT_KNEE, 85.0, (hip_y + ankle_y) / 2.0);
    set(pi::RIGHT_KNEE, 115.0, (hip_y + ankle_y) / 2.0);

    RawOutput {
        subjects: vec![RawSubject {
            bbox: (50.0, 25.0, 150.0, 210.0),
            landmarks,
            confidence: 0.9,
        }],
        coords: RawCoords::InputPixels,
    }
}

fn standing_raw() -> RawOutput {
    falling_raw(0.0)
}

fn frames(n: u64) -> ScriptedSource {
    let mut source = ScriptedSource::default();
    for i in 0..n {
        source.push_frame(i * FRAME_NS, i, SIDE, SIDE);
    }
    source
}

fn config() -> RuntimeConfig {
    RuntimeConfig {
        // Large enough that replay never drops a frame.
        frame_channel_capacity: 128,
        ..Default::default()
    }
}

fn stage_for(outputs: Vec<RawOutput>) -> DetectorStage {
    DetectorStage::new(
        Box::new(ScriptedBackend::from_raw_outputs(outputs)),
        DetectorConfig::default(),
    )
}

/// Spotter that hears "help" in any loud chunk.
struct InstantSpotter;

#[async_trait]
impl KeywordSpotter for InstantSpotter {
    async fn spot(&self, chunk: &AudioChunk) -> SourceResult<Vec<AudioEvent>> {
        let loud = chunk.samples.iter().any(|s| s.abs() > 0.3);
        Ok(if loud {
            vec![AudioEvent {
                ts_ns: chunk.ts_ns,
                keyword: "help".to_string(),
                confidence: 0.8,
            }]
        } else {
            Vec::new()
        })
    }
}

/// A standing subject produces thirty scored samples and no alert.
#[tokio::test]
async fn scenario_standing_produces_no_alert() {
    let outputs = (0..30).map(|_| standing_raw()).collect();
    let mut handle = spawn_pipeline(
        config(),
        frames(30),
        vec![stage_for(outputs)],
        Box::new(FixedTagger::new("ada")),
        None,
        None,
    );
    handle.join().await;

    assert_eq!(PipelineCounters::get(&handle.counters.samples_scored), 30);
    assert_eq!(PipelineCounters::get(&handle.counters.alerts_emitted), 0);
    assert!(handle.alerts.recv().await.is_none());
}

/// A fall raises exactly one alert at high/critical with the fall
/// cause, and the cooldown suppresses everything after it.
#[tokio::test]
async fn scenario_fall_alerts_once() {
    let outputs: Vec<RawOutput> = (0..10)
        .map(|i| falling_raw(0.1 + 0.09 * i as f32))
        .chain((0..30).map(|_| falling_raw(1.0)))
        .collect();
    let mut handle = spawn_pipeline(
        config(),
        frames(40),
        vec![stage_for(outputs)],
        Box::new(FixedTagger::new("ada")),
        None,
        None,
    );
    handle.join().await;

    assert_eq!(PipelineCounters::get(&handle.counters.alerts_emitted), 1);
    let alert = handle.alerts.recv().await.expect("one alert");
    assert!(alert.level >= AlertLevel::High);
    assert!(alert.cause.fall);
    assert!(!alert.cause.audio_help);
    assert_eq!(alert.confidence, 0.75);
    assert!(handle.alerts.recv().await.is_none());
}

/// Normal posture plus one loud "help" chunk alerts once at medium
/// with the audio cause and 0.60 confidence.
#[tokio::test]
async fn scenario_audio_help_alerts_medium() {
    let mut source = ScriptedSource::default();
    for i in 0..3u64 {
        source.push_frame(i * FRAME_NS, i, SIDE, SIDE);
    }
    // One loud chunk early, then plenty of quiet frames for the fused
    // event to land on.
    source.push_audio(3 * FRAME_NS, 16_000, 0.8, 1_600);
    for i in 3..30u64 {
        source.push_frame(i * FRAME_NS, i, SIDE, SIDE);
    }

    let outputs = (0..30).map(|_| standing_raw()).collect();
    let mut handle = spawn_pipeline(
        config(),
        source,
        vec![stage_for(outputs)],
        Box::new(FixedTagger::new("ada")),
        Some(Box::new(InstantSpotter)),
        None,
    );
    handle.join().await;

    assert_eq!(PipelineCounters::get(&handle.counters.audio_events), 1);
    assert_eq!(PipelineCounters::get(&handle.counters.alerts_emitted), 1);
    let alert = handle.alerts.recv().await.expect("one alert");
    assert_eq!(alert.level, AlertLevel::Medium);
    assert!(alert.cause.audio_help);
    assert!(!alert.cause.fall);
    assert_eq!(alert.confidence, 0.60);
}

/// Zero-detection frames downgrade to the fallback backend; detections
/// resume through it.
#[tokio::test]
async fn scenario_backend_fallback_on_empty_frames() {
    // Primary never sees anything.
    let primary = DetectorStage::new(
        Box::new(ScriptedBackend::with_subject_script(vec![], 0).named("primary")),
        DetectorConfig::default(),
    );
    // Fallback sees the subject every frame.
    let fallback = stage_for((0..20).map(|_| standing_raw()).collect());

    let mut handle = spawn_pipeline(
        config(),
        frames(10),
        vec![primary, fallback],
        Box::new(FixedTagger::new("ada")),
        None,
        None,
    );
    handle.join().await;

    // Three empty frames on the primary, then the fallback carries the
    // remaining seven.
    assert_eq!(PipelineCounters::get(&handle.counters.samples_scored), 7);
    assert_eq!(PipelineCounters::get(&handle.counters.alerts_emitted), 0);
}
