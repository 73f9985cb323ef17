//! FFmpeg frame extraction and ONNX bird detection.
//!
//! This crate covers the media edge of the pipeline:
//! - `command`: FFmpeg command builder and runner
//! - `frame`: first-frame extraction from an HLS segment
//! - `detect`: the detector boundary and the YOLOv8 bird detector

pub mod command;
pub mod detect;
pub mod error;
pub mod frame;

pub use command::{check_ffmpeg, FfmpegCommand, FfmpegRunner};
pub use detect::{Detector, YoloBirdDetector, YoloBirdDetectorConfig, COCO_BIRD_CLASS_ID};
pub use error::{MediaError, MediaResult};
pub use frame::{FfmpegFrameExtractor, FrameExtractor};
