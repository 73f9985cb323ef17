//! Shared data models for the sparrowcam stream processor.
//!
//! This crate provides:
//! - Segment identity types
//! - HLS playlist snapshot parsing
//! - Annotation records persisted for the web frontend

pub mod annotation;
pub mod playlist;
pub mod segment;

// Re-export common types
pub use annotation::{Annotation, AnnotationMap};
pub use playlist::PlaylistSnapshot;
pub use segment::{SegmentId, SegmentRef};
