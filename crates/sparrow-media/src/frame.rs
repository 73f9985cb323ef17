//! First-frame extraction from HLS segments.
//!
//! The detection pass looks at a single representative frame per segment:
//! the first one FFmpeg can decode from the MPEG-TS container.

use std::path::Path;

use async_trait::async_trait;
use image::DynamicImage;
use tracing::debug;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

/// Default width the extracted frame is scaled to (height follows aspect).
pub const DEFAULT_FRAME_WIDTH: u32 = 480;

/// Default hard timeout for one FFmpeg invocation.
pub const DEFAULT_FFMPEG_TIMEOUT_SECS: u64 = 30;

/// Source of representative frames for segments.
#[async_trait]
pub trait FrameExtractor: Send + Sync {
    /// Extract the first decodable frame of a segment.
    async fn first_frame(&self, segment: &Path) -> MediaResult<DynamicImage>;
}

/// Frame extractor backed by the FFmpeg CLI.
#[derive(Debug, Clone)]
pub struct FfmpegFrameExtractor {
    /// Width the frame is scaled to before decoding
    scale_width: u32,
    /// FFmpeg timeout in seconds
    timeout_secs: u64,
}

impl Default for FfmpegFrameExtractor {
    fn default() -> Self {
        Self {
            scale_width: DEFAULT_FRAME_WIDTH,
            timeout_secs: DEFAULT_FFMPEG_TIMEOUT_SECS,
        }
    }
}

impl FfmpegFrameExtractor {
    pub fn new(scale_width: u32, timeout_secs: u64) -> Self {
        Self {
            scale_width,
            timeout_secs,
        }
    }
}

#[async_trait]
impl FrameExtractor for FfmpegFrameExtractor {
    async fn first_frame(&self, segment: &Path) -> MediaResult<DynamicImage> {
        if !segment.exists() {
            return Err(MediaError::SegmentNotFound(segment.to_path_buf()));
        }

        // FFmpeg refuses to write to an existing file without -y, and we
        // want the PNG gone once decoded, so route it through a temp file.
        let frame_file = tempfile::Builder::new()
            .prefix("sparrow_frame_")
            .suffix(".png")
            .tempfile()?;

        let filter = format!("scale={}:-2", self.scale_width);
        let cmd = FfmpegCommand::new(segment, frame_file.path())
            .single_frame()
            .video_filter(&filter)
            .format("image2")
            .log_level("error");

        FfmpegRunner::new()
            .with_timeout(self.timeout_secs)
            .run(&cmd)
            .await?;

        let frame = image::open(frame_file.path())?;
        debug!(
            segment = %segment.display(),
            width = frame.width(),
            height = frame.height(),
            "Extracted first frame"
        );

        Ok(frame)
    }
}
