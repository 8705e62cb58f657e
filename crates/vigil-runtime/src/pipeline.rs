//! Task graph assembly for the detection runtime.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use vigil_detect::{DetectorStage, FallbackController};
use vigil_models::{AlertEvent, AudioChunk, AudioEvent, DetectorFamily, Frame, PoseSample, SubjectId};
use vigil_risk::{AlertTrigger, IngestOutcome, RiskEngine, TriggerOutcome};
use vigil_source::{KeywordSpotter, MediaEvent, MediaSource, ScriptedSource, SourceResult};

use crate::channels::{ring_channel, RingReceiver, RingSender};
use crate::config::RuntimeConfig;
use crate::counters::PipelineCounters;
use crate::sink::AlertLogSink;
use crate::tagger::SubjectTagger;

/// Anything that yields media events: live capture or a scripted replay.
#[async_trait]
pub trait EventSource: Send {
    async fn next(&mut self) -> SourceResult<MediaEvent>;
}

#[async_trait]
impl EventSource for MediaSource {
    async fn next(&mut self) -> SourceResult<MediaEvent> {
        MediaSource::next(self).await
    }
}

#[async_trait]
impl EventSource for ScriptedSource {
    async fn next(&mut self) -> SourceResult<MediaEvent> {
        ScriptedSource::next(self).await
    }
}

/// Messages routed to a fusion worker.
enum WorkerMsg {
    Sample(PoseSample),
    Audio(AudioEvent),
}

/// Handle over a running pipeline.
pub struct PipelineHandle {
    /// Deduplicated alerts, freshest-first under backpressure.
    pub alerts: RingReceiver<AlertEvent>,
    pub counters: Arc<PipelineCounters>,
    cancel: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl PipelineHandle {
    /// Signal cancellation; tasks stop at their next suspension point.
    pub fn cancel(&self) {
        let _ = self.cancel.send(true);
    }

    /// Wait for every pipeline task to finish (EOF or cancellation).
    pub async fn join(&mut self) {
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                warn!("pipeline task panicked: {e}");
            }
        }
    }
}

/// Spawn the full detection pipeline.
///
/// `stages` is the fallback chain from the registry, best backend
/// first. The spotter is optional; without it, audio chunks are
/// discarded at the source boundary.
pub fn spawn_pipeline(
    config: RuntimeConfig,
    source: impl EventSource + 'static,
    stages: Vec<DetectorStage>,
    tagger: Box<dyn SubjectTagger>,
    spotter: Option<Box<dyn KeywordSpotter>>,
    alert_log: Option<AlertLogSink>,
) -> PipelineHandle {
    let config = config.normalized();
    let counters = Arc::new(PipelineCounters::default());
    let (cancel_tx, cancel_rx) = watch::channel(false);

    let (frame_tx, frame_rx) = ring_channel::<Frame>(config.frame_channel_capacity);
    let (audio_tx, audio_rx) = ring_channel::<AudioChunk>(4);
    let (alert_tx, alert_rx) = ring_channel::<AlertEvent>(config.alert_channel_capacity);

    // Fusion worker pool: subject id hashes onto a fixed worker, which
    // owns that subject's ring.
    let mut worker_txs = Vec::with_capacity(config.fusion_workers);
    let mut tasks = Vec::new();
    let alert_log = alert_log.map(Arc::new);
    for worker_index in 0..config.fusion_workers {
        let (tx, rx) = ring_channel::<WorkerMsg>(64);
        worker_txs.push(tx);
        tasks.push(tokio::spawn(fusion_worker(
            worker_index,
            rx,
            RiskEngine::new(config.risk.clone()),
            AlertTrigger::new(config.trigger.clone()),
            alert_tx.clone(),
            alert_log.clone(),
            Arc::clone(&counters),
            cancel_rx.clone(),
        )));
    }
    drop(alert_tx);

    // Keyword spotting stage.
    if let Some(spotter) = spotter {
        tasks.push(tokio::spawn(spotter_task(
            spotter,
            audio_rx,
            worker_txs.clone(),
            Arc::clone(&counters),
            cancel_rx.clone(),
        )));
    } else {
        drop(audio_rx);
    }

    // Detection stage.
    tasks.push(tokio::spawn(detect_task(
        config.clone(),
        stages,
        tagger,
        frame_rx,
        worker_txs,
        Arc::clone(&counters),
        cancel_rx.clone(),
    )));

    // Capture producer.
    tasks.push(tokio::spawn(capture_task(
        source,
        std::time::Duration::from_secs(config.source_stall_timeout_secs),
        frame_tx,
        audio_tx,
        Arc::clone(&counters),
        cancel_rx,
    )));

    PipelineHandle {
        alerts: alert_rx,
        counters,
        cancel: cancel_tx,
        tasks,
    }
}

async fn capture_task(
    mut source: impl EventSource,
    stall_timeout: std::time::Duration,
    frame_tx: RingSender<Frame>,
    audio_tx: RingSender<AudioChunk>,
    counters: Arc<PipelineCounters>,
    mut cancel: watch::Receiver<bool>,
) {
    loop {
        let event = tokio::select! {
            _ = cancel.changed() => {
                if *cancel.borrow() {
                    info!("capture task cancelled");
                    return;
                }
                continue;
            }
            event = tokio::time::timeout(stall_timeout, source.next()) => match event {
                Ok(event) => event,
                Err(_) => {
                    warn!(?stall_timeout, "capture stalled; declaring source lost");
                    return;
                }
            },
        };
        match event {
            Ok(MediaEvent::Frame(frame)) => {
                PipelineCounters::bump(&counters.frames_in);
                let dropped = frame_tx.send(frame);
                if dropped > 0 {
                    PipelineCounters::bump(&counters.frames_dropped);
                }
            }
            Ok(MediaEvent::Audio(chunk)) => {
                audio_tx.send(chunk);
            }
            Err(e) if e.is_eof() => {
                info!("source reached end of stream");
                return;
            }
            Err(e) if e.is_retryable() => {
                warn!("capture device lost: {e}");
                return;
            }
            Err(e) => {
                warn!("capture failed: {e}");
                return;
            }
        }
    }
}

async fn spotter_task(
    spotter: Box<dyn KeywordSpotter>,
    mut audio_rx: RingReceiver<AudioChunk>,
    worker_txs: Vec<RingSender<WorkerMsg>>,
    counters: Arc<PipelineCounters>,
    mut cancel: watch::Receiver<bool>,
) {
    loop {
        let chunk = tokio::select! {
            _ = cancel.changed() => {
                if *cancel.borrow() {
                    return;
                }
                continue;
            }
            chunk = audio_rx.recv() => match chunk {
                Some(chunk) => chunk,
                None => return,
            },
        };
        match spotter.spot(&chunk).await {
            Ok(events) => {
                for event in events {
                    PipelineCounters::bump(&counters.audio_events);
                    debug!(keyword = %event.keyword, "keyword spotted");
                    // Ambient audio fuses with every subject.
                    for tx in &worker_txs {
                        tx.send(WorkerMsg::Audio(event.clone()));
                    }
                }
            }
            Err(e) => warn!("keyword spotting failed: {e}"),
        }
    }
}

fn worker_for(subject: &SubjectId, workers: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    subject.as_str().hash(&mut hasher);
    (hasher.finish() % workers as u64) as usize
}

#[allow(clippy::too_many_arguments)]
async fn detect_task(
    config: RuntimeConfig,
    mut stages: Vec<DetectorStage>,
    mut tagger: Box<dyn SubjectTagger>,
    mut frame_rx: RingReceiver<Frame>,
    worker_txs: Vec<RingSender<WorkerMsg>>,
    counters: Arc<PipelineCounters>,
    mut cancel: watch::Receiver<bool>,
) {
    if stages.is_empty() {
        warn!("no detector stages; detection disabled");
        return;
    }
    let mut controller = FallbackController::new(
        config.detector.empty_frames_before_fallback,
        config.detector.successes_before_upgrade,
        stages.len(),
    );

    loop {
        let frame = tokio::select! {
            _ = cancel.changed() => {
                if *cancel.borrow() {
                    info!("detect task cancelled");
                    break;
                }
                continue;
            }
            frame = frame_rx.recv() => match frame {
                Some(frame) => frame,
                None => break,
            },
        };

        let base_id = tagger
            .tag(&frame)
            .await
            .unwrap_or_else(|| SubjectId::from("unidentified"));

        let level = controller.level();
        // A bad frame is dropped and counted, never fatal.
        let result = match stages[level].detect(&frame, DetectorFamily::Pose) {
            Ok(result) => {
                controller.record(result.subjects.len());
                result
            }
            Err(e) => {
                warn!(backend = %stages[level].method(), "detection failed: {e}");
                PipelineCounters::bump(&counters.detector_failures);
                controller.record(0);
                continue;
            }
        };

        for (index, subject) in result.subjects.into_iter().enumerate() {
            let subject_id = if index == 0 {
                base_id.clone()
            } else {
                SubjectId(format!("{base_id}-{index}"))
            };
            match PoseSample::new(
                frame.ts_ns,
                subject_id.clone(),
                subject.family,
                subject.landmarks,
                subject.bbox,
            ) {
                Ok(sample) => {
                    let target = worker_for(&subject_id, worker_txs.len());
                    worker_txs[target].send(WorkerMsg::Sample(sample));
                }
                Err(e) => {
                    warn!("rejected sample: {e}");
                    PipelineCounters::bump(&counters.bad_frames);
                }
            }
        }
    }

    for stage in &mut stages {
        stage.close();
    }
}

#[allow(clippy::too_many_arguments)]
async fn fusion_worker(
    worker_index: usize,
    mut rx: RingReceiver<WorkerMsg>,
    mut engine: RiskEngine,
    mut trigger: AlertTrigger,
    alert_tx: RingSender<AlertEvent>,
    alert_log: Option<Arc<AlertLogSink>>,
    counters: Arc<PipelineCounters>,
    mut cancel: watch::Receiver<bool>,
) {
    loop {
        let msg = tokio::select! {
            _ = cancel.changed() => {
                if *cancel.borrow() {
                    debug!(worker = worker_index, "fusion worker cancelled");
                    return;
                }
                continue;
            }
            msg = rx.recv() => match msg {
                Some(msg) => msg,
                None => return,
            },
        };
        match msg {
            WorkerMsg::Audio(event) => engine.ingest_audio(event),
            WorkerMsg::Sample(sample) => {
                let outcome = engine.ingest(sample);
                let IngestOutcome::Scored {
                    assessment,
                    fused_audio,
                } = outcome
                else {
                    continue;
                };
                PipelineCounters::bump(&counters.samples_scored);

                match trigger.evaluate(&assessment, fused_audio.as_ref()) {
                    TriggerOutcome::Alert(event) => {
                        PipelineCounters::bump(&counters.alerts_emitted);
                        if let Some(log) = &alert_log {
                            log.append(&event).await;
                        }
                        let dropped = alert_tx.send(event);
                        if dropped > 0 {
                            PipelineCounters::bump(&counters.alerts_dropped);
                        }
                    }
                    TriggerOutcome::Promoted(event) => {
                        debug!(
                            subject = %event.subject_id,
                            level = event.level.as_str(),
                            "active alert promoted"
                        );
                    }
                    TriggerOutcome::Suppressed | TriggerOutcome::Quiet => {}
                }
            }
        }
    }
}
