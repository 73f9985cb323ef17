//! Processor configuration.

use std::path::PathBuf;
use std::time::Duration;

use sparrow_media::YoloBirdDetectorConfig;

use crate::error::{ProcessorError, ProcessorResult};

/// Processor configuration.
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// Location of the live HLS playlist
    pub playlist_path: PathBuf,
    /// Location of the annotation artifact served to the frontend
    pub annotations_path: PathBuf,
    /// Root of the stream archive
    pub archive_dir: PathBuf,
    /// How many trailing segments to keep when archiving on detection
    pub archive_limit: usize,
    /// Poll interval while the playlist is healthy
    pub poll_interval: Duration,
    /// First retry delay when the playlist is missing or malformed
    pub backoff_min: Duration,
    /// Retry delay cap
    pub backoff_max: Duration,
    /// Width the extracted frame is scaled to, in pixels
    pub frame_resolution: u32,
    /// Hard timeout for one FFmpeg invocation
    pub ffmpeg_timeout: Duration,
    /// Path to the YOLOv8 ONNX model
    pub model_path: PathBuf,
    /// Confidence threshold for bird presence
    pub confidence_threshold: f32,
    /// Square input size of the detection model
    pub detector_input_size: u32,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            playlist_path: PathBuf::from("/var/www/html/hls/sparrow_cam.m3u8"),
            annotations_path: PathBuf::from("/var/www/html/annotations/bird.json"),
            archive_dir: PathBuf::from("/var/www/html/storage/sparrow_cam/archive"),
            archive_limit: 1,
            poll_interval: Duration::from_secs(1),
            backoff_min: Duration::from_secs(1),
            backoff_max: Duration::from_secs(10),
            frame_resolution: 480,
            ffmpeg_timeout: Duration::from_secs(30),
            model_path: PathBuf::from("models/yolov8n.onnx"),
            confidence_threshold: 0.25,
            detector_input_size: 640,
        }
    }
}

impl ProcessorConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            playlist_path: env_path("PLAYLIST_PATH", defaults.playlist_path),
            annotations_path: env_path("ANNOTATIONS_PATH", defaults.annotations_path),
            archive_dir: env_path("ARCHIVE_DIR", defaults.archive_dir),
            archive_limit: env_parsed("ARCHIVE_LIMIT", defaults.archive_limit),
            poll_interval: env_secs("POLL_INTERVAL_SECS", defaults.poll_interval),
            backoff_min: env_secs("BACKOFF_MIN_SECS", defaults.backoff_min),
            backoff_max: env_secs("BACKOFF_MAX_SECS", defaults.backoff_max),
            frame_resolution: env_parsed("FRAME_WIDTH", defaults.frame_resolution),
            ffmpeg_timeout: env_secs("FFMPEG_TIMEOUT_SECS", defaults.ffmpeg_timeout),
            model_path: env_path("DETECTOR_MODEL_PATH", defaults.model_path),
            confidence_threshold: env_parsed("DETECTOR_CONFIDENCE", defaults.confidence_threshold),
            detector_input_size: env_parsed("DETECTOR_INPUT_SIZE", defaults.detector_input_size),
        }
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> ProcessorResult<()> {
        if self.archive_limit == 0 {
            return Err(ProcessorError::config("ARCHIVE_LIMIT must be positive"));
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(ProcessorError::config(
                "DETECTOR_CONFIDENCE must be within 0..=1",
            ));
        }
        if self.backoff_min > self.backoff_max {
            return Err(ProcessorError::config(
                "BACKOFF_MIN_SECS must not exceed BACKOFF_MAX_SECS",
            ));
        }
        Ok(())
    }

    /// Directory holding the playlist and its segment files.
    pub fn stream_dir(&self) -> PathBuf {
        self.playlist_path
            .parent()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Detector configuration slice of this config.
    pub fn detector_config(&self) -> YoloBirdDetectorConfig {
        YoloBirdDetectorConfig {
            model_path: self.model_path.clone(),
            confidence_threshold: self.confidence_threshold,
            input_size: self.detector_input_size,
        }
    }
}

fn env_path(key: &str, default: PathBuf) -> PathBuf {
    std::env::var(key).map(PathBuf::from).unwrap_or(default)
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn env_secs(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
}
