//! FFmpeg-backed frame and audio capture.
//!
//! Each stream is decoded by its own FFmpeg child process writing raw
//! bytes to stdout: `rgb24` pixels for video, `f32le` mono samples for
//! audio. Reads are cancel-safe: partially filled buffers survive a
//! dropped `next_*` future.

use std::path::Path;
use std::process::Stdio;
use std::time::Instant;

use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStdout, Command};
use tracing::{debug, info, warn};

use vigil_models::{AudioChunk, Frame, PixelLayout};

use crate::config::SourceConfig;
use crate::error::{SourceError, SourceResult};
use crate::MediaEvent;

/// Locate the ffmpeg binary once per call site.
fn find_ffmpeg() -> SourceResult<std::path::PathBuf> {
    which::which("ffmpeg").map_err(|_| SourceError::FfmpegNotFound)
}

/// Input arguments for a camera index or a file path.
fn input_args(config: &SourceConfig) -> SourceResult<Vec<String>> {
    if let Some(file) = &config.file {
        return Ok(vec!["-i".to_string(), file.to_string_lossy().to_string()]);
    }
    let index = config
        .camera_index
        .ok_or_else(|| SourceError::InvalidConfig("no camera index or file".to_string()))?;
    let device = camera_device(index);
    Ok(vec![
        "-f".to_string(),
        capture_format().to_string(),
        "-framerate".to_string(),
        config.fps.to_string(),
        "-i".to_string(),
        device,
    ])
}

fn camera_device(index: u32) -> String {
    if cfg!(target_os = "macos") {
        index.to_string()
    } else {
        format!("/dev/video{index}")
    }
}

fn capture_format() -> &'static str {
    if cfg!(target_os = "macos") {
        "avfoundation"
    } else {
        "v4l2"
    }
}

/// Reads fixed-size records from a child stdout, keeping partial fills
/// across cancelled futures.
struct RecordReader {
    stdout: ChildStdout,
    buf: Vec<u8>,
    filled: usize,
}

impl RecordReader {
    fn new(stdout: ChildStdout, record_len: usize) -> Self {
        Self {
            stdout,
            buf: vec![0u8; record_len],
            filled: 0,
        }
    }

    /// Fill the record buffer, returning a copy when complete.
    async fn next_record(&mut self) -> SourceResult<Vec<u8>> {
        while self.filled < self.buf.len() {
            let n = self.stdout.read(&mut self.buf[self.filled..]).await?;
            if n == 0 {
                if self.filled == 0 {
                    return Err(SourceError::Eof);
                }
                return Err(SourceError::DeviceLost(format!(
                    "stream truncated mid-record ({} of {} bytes)",
                    self.filled,
                    self.buf.len()
                )));
            }
            self.filled += n;
        }
        self.filled = 0;
        Ok(self.buf.clone())
    }
}

/// Video capture stream.
pub struct FrameCapture {
    child: Child,
    reader: RecordReader,
    width: u32,
    height: u32,
    epoch: Instant,
    seq: u64,
    last_ts_ns: u64,
}

impl FrameCapture {
    /// Spawn the FFmpeg decoder for the configured video input.
    pub fn open(config: &SourceConfig, epoch: Instant) -> SourceResult<Self> {
        config.validate().map_err(SourceError::InvalidConfig)?;
        let ffmpeg = find_ffmpeg()?;

        let mut args: Vec<String> = vec!["-nostdin".to_string(), "-v".to_string(), "error".to_string()];
        args.extend(input_args(config)?);
        args.extend([
            "-an".to_string(),
            "-vf".to_string(),
            format!("scale={}:{},fps={}", config.width, config.height, config.fps),
            "-f".to_string(),
            "rawvideo".to_string(),
            "-pix_fmt".to_string(),
            "rgb24".to_string(),
            "pipe:1".to_string(),
        ]);

        debug!(?args, "spawning ffmpeg video capture");
        let mut child = Command::new(&ffmpeg)
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SourceError::DeviceLost("ffmpeg stdout unavailable".to_string()))?;

        let record_len = config.width as usize * config.height as usize * 3;
        info!(
            width = config.width,
            height = config.height,
            fps = config.fps,
            "video capture started"
        );
        Ok(Self {
            child,
            reader: RecordReader::new(stdout, record_len),
            width: config.width,
            height: config.height,
            epoch,
            seq: 0,
            last_ts_ns: 0,
        })
    }

    /// Read the next frame. Blocks until a full frame arrives.
    pub async fn next_frame(&mut self) -> SourceResult<Frame> {
        let data = match self.reader.next_record().await {
            Ok(data) => data,
            Err(SourceError::Eof) => {
                // Distinguish clean EOF from device loss via exit status.
                return match self.child.wait().await {
                    Ok(status) if status.success() => Err(SourceError::Eof),
                    Ok(status) => Err(SourceError::DeviceLost(format!(
                        "ffmpeg exited with {status}"
                    ))),
                    Err(e) => Err(SourceError::DeviceLost(e.to_string())),
                };
            }
            Err(e) => return Err(e),
        };

        // Monotonic, strictly increasing timestamps.
        let now_ns = self.epoch.elapsed().as_nanos() as u64;
        let ts_ns = now_ns.max(self.last_ts_ns + 1);
        self.last_ts_ns = ts_ns;
        let seq = self.seq;
        self.seq += 1;

        Frame::new(ts_ns, seq, PixelLayout::Rgb8, self.width, self.height, data).ok_or_else(|| {
            SourceError::DeviceLost("frame buffer size mismatch".to_string())
        })
    }
}

/// Audio capture stream (mono f32).
pub struct AudioCapture {
    child: Child,
    reader: RecordReader,
    sample_rate: u32,
    epoch: Instant,
    emitted_samples: u64,
}

impl AudioCapture {
    /// Spawn the FFmpeg decoder for the configured audio input.
    pub fn open(config: &SourceConfig, epoch: Instant) -> SourceResult<Self> {
        config.validate().map_err(SourceError::InvalidConfig)?;
        let ffmpeg = find_ffmpeg()?;

        let mut args: Vec<String> = vec!["-nostdin".to_string(), "-v".to_string(), "error".to_string()];
        args.extend(input_args(config)?);
        args.extend([
            "-vn".to_string(),
            "-ac".to_string(),
            "1".to_string(),
            "-ar".to_string(),
            config.audio_sample_rate.to_string(),
            "-f".to_string(),
            "f32le".to_string(),
            "pipe:1".to_string(),
        ]);

        debug!(?args, "spawning ffmpeg audio capture");
        let mut child = Command::new(&ffmpeg)
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SourceError::DeviceLost("ffmpeg stdout unavailable".to_string()))?;

        info!(
            sample_rate = config.audio_sample_rate,
            chunk_samples = config.audio_chunk_samples,
            "audio capture started"
        );
        Ok(Self {
            child,
            reader: RecordReader::new(stdout, config.audio_chunk_samples * 4),
            sample_rate: config.audio_sample_rate,
            epoch,
            emitted_samples: 0,
        })
    }

    /// Read the next chunk of mono samples.
    pub async fn next_chunk(&mut self) -> SourceResult<AudioChunk> {
        let bytes = match self.reader.next_record().await {
            Ok(bytes) => bytes,
            Err(SourceError::Eof) => {
                return match self.child.wait().await {
                    Ok(status) if status.success() => Err(SourceError::Eof),
                    Ok(status) => Err(SourceError::DeviceLost(format!(
                        "ffmpeg exited with {status}"
                    ))),
                    Err(e) => Err(SourceError::DeviceLost(e.to_string())),
                };
            }
            Err(e) => return Err(e),
        };

        let samples: Vec<f32> = bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]).clamp(-1.0, 1.0))
            .collect();

        // Chunk start time comes from the sample clock, which shares the
        // video epoch, so frame and audio timestamps are comparable.
        let ts_ns = self
            .emitted_samples
            .saturating_mul(1_000_000_000)
            .checked_div(self.sample_rate as u64)
            .unwrap_or_else(|| self.epoch.elapsed().as_nanos() as u64);
        self.emitted_samples += samples.len() as u64;

        Ok(AudioChunk {
            ts_ns,
            sample_rate: self.sample_rate,
            samples,
        })
    }
}

/// A combined media source: one video stream plus an optional audio
/// stream, multiplexed through `next()`.
pub struct MediaSource {
    video: FrameCapture,
    audio: Option<AudioCapture>,
}

/// Open a media source per the configuration.
pub fn open(config: &SourceConfig) -> SourceResult<MediaSource> {
    let epoch = Instant::now();
    let video = FrameCapture::open(config, epoch)?;
    let audio = if config.audio_enabled {
        match AudioCapture::open(config, epoch) {
            Ok(a) => Some(a),
            Err(e) => {
                warn!("audio capture unavailable, continuing video-only: {e}");
                None
            }
        }
    } else {
        None
    };
    Ok(MediaSource { video, audio })
}

impl MediaSource {
    /// Next frame or audio chunk, whichever completes first.
    ///
    /// Safe to call in a `select!` loop: both inner readers keep partial
    /// records across cancellation.
    pub async fn next(&mut self) -> SourceResult<MediaEvent> {
        match &mut self.audio {
            Some(audio) => {
                tokio::select! {
                    frame = self.video.next_frame() => frame.map(MediaEvent::Frame),
                    chunk = audio.next_chunk() => chunk.map(MediaEvent::Audio),
                }
            }
            None => self.video.next_frame().await.map(MediaEvent::Frame),
        }
    }

    /// Split into independent streams, one per producer task.
    pub fn into_parts(self) -> (FrameCapture, Option<AudioCapture>) {
        (self.video, self.audio)
    }
}
