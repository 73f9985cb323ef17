//! HLS segment processor.
//!
//! This crate provides:
//! - The watchtower that surfaces newly published segments from the live
//!   playlist, with backoff while the playlist is missing or malformed
//! - The sequential orchestrator that extracts a frame, runs detection and
//!   records the outcome in the annotation store
//! - The stream archiver that snapshots the live window on detection
//! - Configuration and the binary entrypoints

pub mod archiver;
pub mod config;
pub mod error;
pub mod processor;
pub mod watchtower;

pub use archiver::{ArchiveError, ArchivePrefix, StreamArchiver};
pub use config::ProcessorConfig;
pub use error::{ProcessorError, ProcessorResult};
pub use processor::SegmentProcessor;
pub use watchtower::{Backoff, Watchtower};
