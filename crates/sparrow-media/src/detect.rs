//! Bird detection on a single frame.
//!
//! The pipeline only needs a boolean answer per segment, so the detector
//! boundary is a one-method trait. The production implementation runs a
//! YOLOv8 ONNX model and reports presence of the COCO "bird" class.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use image::DynamicImage;
use ndarray::Array;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::{Tensor, Value};
use tracing::{debug, info};

use crate::error::{MediaError, MediaResult};

/// COCO class id for "bird".
pub const COCO_BIRD_CLASS_ID: usize = 14;

/// Boolean presence classifier applied to one representative frame.
///
/// Implementations may be slow (hundreds of milliseconds) and must not
/// retry internally; any failure is a per-segment failure for the caller.
pub trait Detector: Send + Sync {
    /// Return whether a bird is present in the frame.
    fn detect(&self, frame: &DynamicImage) -> MediaResult<bool>;
}

/// Configuration for the YOLOv8 bird detector.
#[derive(Debug, Clone)]
pub struct YoloBirdDetectorConfig {
    /// Path to the ONNX model file
    pub model_path: PathBuf,
    /// Confidence threshold for a bird candidate to count as presence
    pub confidence_threshold: f32,
    /// Model input size (square)
    pub input_size: u32,
}

impl Default for YoloBirdDetectorConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/yolov8n.onnx"),
            confidence_threshold: 0.25,
            input_size: 640,
        }
    }
}

/// Bird detector using a YOLOv8 ONNX model on CPU.
#[derive(Debug)]
pub struct YoloBirdDetector {
    session: Mutex<Session>,
    config: YoloBirdDetectorConfig,
}

impl YoloBirdDetector {
    /// Create a detector from config.
    ///
    /// Returns an error if the model file doesn't exist or cannot be loaded.
    /// Both are fatal at startup: there is no detection capability without
    /// the model.
    pub fn new(config: YoloBirdDetectorConfig) -> MediaResult<Self> {
        if !config.model_path.exists() {
            return Err(MediaError::ModelNotFound(config.model_path.clone()));
        }

        let session = Mutex::new(create_session(&config.model_path)?);
        info!(
            model_path = %config.model_path.display(),
            input_size = config.input_size,
            confidence_threshold = config.confidence_threshold,
            "Bird detector initialized"
        );

        Ok(Self { session, config })
    }

    /// Get the configuration.
    pub fn config(&self) -> &YoloBirdDetectorConfig {
        &self.config
    }

    /// Confidence of the strongest bird candidate in the frame.
    pub fn bird_confidence(&self, frame: &DynamicImage) -> MediaResult<f32> {
        let input = self.preprocess(frame)?;
        let outputs = self.run_inference(input)?;
        self.max_bird_score(&outputs)
    }

    /// Preprocess a frame for YOLOv8 inference.
    ///
    /// Resize to the square model input, normalize to [0, 1], NCHW layout.
    fn preprocess(&self, frame: &DynamicImage) -> MediaResult<Value> {
        let input_size = self.config.input_size;

        let resized = frame.resize_exact(
            input_size,
            input_size,
            image::imageops::FilterType::Triangle,
        );

        let rgb = resized.to_rgb8();
        let (w, h) = (input_size as usize, input_size as usize);

        let mut chw_data: Vec<f32> = Vec::with_capacity(3 * h * w);
        for c in 0..3 {
            for y in 0..h {
                for x in 0..w {
                    let pixel = rgb.get_pixel(x as u32, y as u32);
                    chw_data.push(pixel[c] as f32 / 255.0);
                }
            }
        }

        let shape = vec![1usize, 3, h, w];
        Tensor::from_array((shape, chw_data.into_boxed_slice()))
            .map(Value::from)
            .map_err(|e| MediaError::detection_failed(format!("Failed to create tensor: {}", e)))
    }

    /// Run ONNX inference and return the flattened output tensor.
    fn run_inference(&self, input: Value) -> MediaResult<Vec<f32>> {
        let mut session = self
            .session
            .lock()
            .map_err(|_| MediaError::detection_failed("Session lock poisoned"))?;

        let outputs = session
            .run(ort::inputs![input])
            .map_err(|e| MediaError::detection_failed(format!("ONNX inference failed: {}", e)))?;

        let output = outputs
            .get("output0")
            .ok_or_else(|| MediaError::detection_failed("Missing output0 tensor"))?;

        let tensor = output
            .try_extract_tensor::<f32>()
            .map_err(|e| MediaError::detection_failed(format!("Failed to extract tensor: {}", e)))?;

        Ok(tensor.1.iter().copied().collect())
    }

    /// Scan the YOLOv8 output for the strongest bird candidate.
    ///
    /// Output layout is [1, 84, 8400]: 4 bbox values plus 80 class scores
    /// per detection candidate. Presence only needs the best class-14 score,
    /// so no box decoding or NMS happens here.
    fn max_bird_score(&self, outputs: &[f32]) -> MediaResult<f32> {
        let num_boxes = 8400;
        let num_features = 84;

        if outputs.len() != num_features * num_boxes {
            return Err(MediaError::detection_failed(format!(
                "Unexpected output size: expected {}, got {}",
                num_features * num_boxes,
                outputs.len()
            )));
        }

        let output_array = Array::from_shape_vec((num_features, num_boxes), outputs.to_vec())
            .map_err(|e| MediaError::detection_failed(format!("Failed to reshape output: {}", e)))?;
        let scores = output_array.row(4 + COCO_BIRD_CLASS_ID);

        Ok(scores.iter().copied().fold(0.0f32, f32::max))
    }
}

impl Detector for YoloBirdDetector {
    fn detect(&self, frame: &DynamicImage) -> MediaResult<bool> {
        let confidence = self.bird_confidence(frame)?;
        let detected = confidence >= self.config.confidence_threshold;
        debug!(confidence, detected, "Bird detection completed");
        Ok(detected)
    }
}

/// Create an ONNX Runtime session on the CPU execution provider.
fn create_session(model_path: &Path) -> MediaResult<Session> {
    let model_bytes = std::fs::read(model_path)
        .map_err(|e| MediaError::detection_failed(format!("Failed to read model file: {}", e)))?;

    Session::builder()
        .map_err(|e| MediaError::detection_failed(format!("Failed to create session builder: {}", e)))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| MediaError::detection_failed(format!("Failed to set optimization level: {}", e)))?
        .commit_from_memory(&model_bytes)
        .map_err(|e| MediaError::detection_failed(format!("Failed to load ONNX model: {}", e)))
}
