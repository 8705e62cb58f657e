//! End-to-end scoring scenarios over the engine + trigger pair.

use vigil_models::landmark::pose_index as pi;
use vigil_models::{
    AlertLevel, AudioEvent, BoundingBox, DetectorFamily, Landmark, PoseSample, SubjectId,
};
use vigil_risk::{AlertTrigger, IngestOutcome, RiskConfig, RiskEngine, TriggerConfig, TriggerOutcome};

const FRAME_NS: u64 = 33_000_000;

/// A subject mid-fall: `progress` 0 is upright, 1 is collapsed (torso
/// near horizontal, hips far off the stance line).
fn falling_sample(ts_ns: u64, progress: f32) -> PoseSample {
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

fn standing_sample(ts_ns: u64) -> PoseSample {
    falling_sample(ts_ns, 0.0)
}

fn help_event(ts_ns: u64) -> AudioEvent {
    AudioEvent {
        ts_ns,
        keyword: "help".to_string(),
        confidence: 0.8,
    }
}

struct Run {
    fresh: Vec<vigil_models::AlertEvent>,
    promoted: Vec<vigil_models::AlertEvent>,
}

fn run(
    engine: &mut RiskEngine,
    trigger: &mut AlertTrigger,
    samples: impl IntoIterator<Item = PoseSample>,
) -> Run {
    let mut result = Run {
        fresh: Vec::new(),
        promoted: Vec::new(),
    };
    for sample in samples {
        let IngestOutcome::Scored {
            assessment,
            fused_audio,
        } = engine.ingest(sample)
        else {
            continue;
        };
        match trigger.evaluate(&assessment, fused_audio.as_ref()) {
            TriggerOutcome::Alert(event) => result.fresh.push(event),
            TriggerOutcome::Promoted(event) => result.promoted.push(event),
            _ => {}
        }
    }
    result
}

/// Thirty frames of quiet standing never alert.
#[test]
fn scenario_standing_no_alert() {
    let mut engine = RiskEngine::new(RiskConfig::default());
    let mut trigger = AlertTrigger::new(TriggerConfig::default());

    let run = run(
        &mut engine,
        &mut trigger,
        (0..30u64).map(|i| standing_sample(i * FRAME_NS)),
    );
    assert!(run.fresh.is_empty());
    assert!(run.promoted.is_empty());
}

/// A fall produces exactly one fresh alert at high or critical, and
/// nothing further within the cooldown.
#[test]
fn scenario_fall_single_alert() {
    let mut engine = RiskEngine::new(RiskConfig::default());
    let mut trigger = AlertTrigger::new(TriggerConfig::default());

    // Posture degrades over ten frames, then the subject stays down for
    // another second (well inside the 3 s cooldown).
    let samples = (0..10u64)
        .map(|i| falling_sample(i * FRAME_NS, 0.1 + 0.09 * i as f32))
        .chain((10..40u64).map(|i| falling_sample(i * FRAME_NS, 1.0)));
    let run = run(&mut engine, &mut trigger, samples);

    assert_eq!(run.fresh.len(), 1, "expected exactly one fresh alert");
    let alert = &run.fresh[0];
    assert!(alert.level >= AlertLevel::High, "level {:?}", alert.level);
    assert!(alert.cause.fall);
    assert!(!alert.cause.audio_help);
    assert_eq!(alert.confidence, 0.75);
    // The alert fired within 500 ms of the fall completing.
    assert!(alert.ts_ns <= 10 * FRAME_NS + 500_000_000);
}

/// Normal posture plus a single help keyword alerts once at medium
/// with the audio cause and 0.60 confidence.
#[test]
fn scenario_audio_only_alert() {
    let mut engine = RiskEngine::new(RiskConfig::default());
    let mut trigger = AlertTrigger::new(TriggerConfig::default());

    // Ten quiet frames first.
    let early = run(
        &mut engine,
        &mut trigger,
        (0..10u64).map(|i| standing_sample(i * FRAME_NS)),
    );
    assert!(early.fresh.is_empty());

    engine.ingest_audio(help_event(10 * FRAME_NS));
    let late = run(
        &mut engine,
        &mut trigger,
        (10..30u64).map(|i| standing_sample(i * FRAME_NS)),
    );

    assert_eq!(late.fresh.len(), 1);
    let alert = &late.fresh[0];
    assert_eq!(alert.level, AlertLevel::Medium);
    assert!(alert.cause.audio_help);
    assert!(!alert.cause.fall);
    assert_eq!(alert.confidence, 0.60);
}

/// A fall with a help keyword inside the fusion window carries both
/// cause flags and 0.95 confidence.
#[test]
fn scenario_combined_fall_and_audio() {
    let mut engine = RiskEngine::new(RiskConfig::default());
    let mut trigger = AlertTrigger::new(TriggerConfig::default());

    // The cry for help lands just as the subject hits the ground.
    engine.ingest_audio(help_event(0));
    let samples = (0..10u64).map(|i| falling_sample(i * FRAME_NS, 1.0));
    let run = run(&mut engine, &mut trigger, samples);

    assert_eq!(run.fresh.len(), 1);
    let alert = &run.fresh[0];
    assert!(alert.cause.fall && alert.cause.audio_help);
    assert_eq!(alert.confidence, 0.95);
    assert!(alert.level >= AlertLevel::High);
}

/// Promotions inside the cooldown raise severity without a second fresh
/// alert.
#[test]
fn scenario_promotion_within_cooldown() {
    let mut engine = RiskEngine::new(RiskConfig::default());
    let mut trigger = AlertTrigger::new(TriggerConfig::default());

    // Worsen gradually: the first alert fires at high, the collapse then
    // promotes it to critical.
    let samples = (0..30u64).map(|i| falling_sample(i * FRAME_NS, (0.55 + 0.02 * i as f32).min(1.0)));
    let run = run(&mut engine, &mut trigger, samples);

    assert_eq!(run.fresh.len(), 1);
    if let Some(promoted) = run.promoted.last() {
        assert!(promoted.level > run.fresh[0].level);
    }
}
