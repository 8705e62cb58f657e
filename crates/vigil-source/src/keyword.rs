//! Keyword spotting over captured audio chunks.
//!
//! Chunks below an energy gate are skipped without transcription. Louder
//! chunks are written to a temporary WAV file and handed to an external
//! speech-to-text command; its stdout transcript is scanned for the
//! configured help keywords.

use std::io::Write;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use vigil_models::{AudioChunk, AudioEvent};

use crate::error::{SourceError, SourceResult};

/// Configuration for the transcriber-backed spotter.
#[derive(Debug, Clone)]
pub struct KeywordSpotterConfig {
    /// Speech-to-text command; receives the WAV path as its last argument
    /// and must print the transcript on stdout.
    pub command: PathBuf,
    /// Extra arguments placed before the WAV path.
    pub args: Vec<String>,
    /// Keywords that produce events (matched lowercased, substring).
    pub keywords: Vec<String>,
    /// RMS energy below which a chunk is not transcribed.
    pub min_rms: f32,
    /// Confidence attached to emitted events.
    pub confidence: f32,
}

impl Default for KeywordSpotterConfig {
    fn default() -> Self {
        Self {
            command: PathBuf::from("whisper-cli"),
            args: vec!["--no-timestamps".to_string()],
            keywords: vec![
                "help".to_string(),
                "救命".to_string(),
                "emergency".to_string(),
            ],
            min_rms: 0.01,
            confidence: 0.8,
        }
    }
}

/// Turns audio chunks into keyword events.
#[async_trait]
pub trait KeywordSpotter: Send + Sync {
    /// Inspect one chunk; returns at most one event per keyword heard.
    async fn spot(&self, chunk: &AudioChunk) -> SourceResult<Vec<AudioEvent>>;
}

/// Spotter that shells out to an external transcriber.
pub struct TranscriberSpotter {
    config: KeywordSpotterConfig,
}

impl TranscriberSpotter {
    pub fn new(config: KeywordSpotterConfig) -> Self {
        Self { config }
    }

    /// Scan a transcript for configured keywords.
    fn match_keywords(&self, transcript: &str, ts_ns: u64) -> Vec<AudioEvent> {
        let lowered = transcript.to_lowercase();
        self.config
            .keywords
            .iter()
            .filter(|kw| lowered.contains(kw.to_lowercase().as_str()))
            .map(|kw| AudioEvent {
                ts_ns,
                keyword: kw.to_lowercase(),
                confidence: self.config.confidence,
            })
            .collect()
    }
}

/// Root-mean-square energy of a chunk.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f32 = samples.iter().map(|s| s * s).sum();
    (sum / samples.len() as f32).sqrt()
}

/// Encode mono f32 samples as a 16-bit PCM WAV blob.
fn encode_wav(chunk: &AudioChunk) -> Vec<u8> {
    let n = chunk.samples.len();
    let data_len = (n * 2) as u32;
    let mut out = Vec::with_capacity(44 + n * 2);
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVEfmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes()); // PCM
    out.extend_from_slice(&1u16.to_le_bytes()); // mono
    out.extend_from_slice(&chunk.sample_rate.to_le_bytes());
    out.extend_from_slice(&(chunk.sample_rate * 2).to_le_bytes());
    out.extend_from_slice(&2u16.to_le_bytes());
    out.extend_from_slice(&16u16.to_le_bytes());
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    for sample in &chunk.samples {
        let v = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}

#[async_trait]
impl KeywordSpotter for TranscriberSpotter {
    async fn spot(&self, chunk: &AudioChunk) -> SourceResult<Vec<AudioEvent>> {
        let energy = rms(&chunk.samples);
        if energy < self.config.min_rms {
            return Ok(Vec::new());
        }

        let mut wav = tempfile::Builder::new()
            .suffix(".wav")
            .tempfile()
            .map_err(SourceError::Io)?;
        wav.write_all(&encode_wav(chunk)).map_err(SourceError::Io)?;
        let wav_path = wav.path().to_path_buf();

        debug!(rms = energy, path = %wav_path.display(), "transcribing audio chunk");
        let output = Command::new(&self.config.command)
            .args(&self.config.args)
            .arg(&wav_path)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| SourceError::TranscriberFailed(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("transcriber exited with {}: {}", output.status, stderr.trim());
            return Err(SourceError::TranscriberFailed(format!(
                "exit {}",
                output.status
            )));
        }

        let transcript = String::from_utf8_lossy(&output.stdout);
        Ok(self.match_keywords(&transcript, chunk.ts_ns))
    }
}
