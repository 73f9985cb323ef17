//! Error types for the annotation store.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur while persisting annotations.
///
/// Note what is missing here: a corrupt or absent annotation file is not an
/// error. The store self-heals by treating it as empty and rewriting it on
/// the next upsert. The variants below are write-side failures, and an
/// unwritable destination is fatal for the process.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to serialize annotations: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to write annotation file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to replace annotation file {path}: {source}")]
    Replace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
