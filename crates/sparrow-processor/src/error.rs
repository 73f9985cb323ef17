//! Processor error types.

use thiserror::Error;

pub type ProcessorResult<T> = Result<T, ProcessorError>;

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("Media error: {0}")]
    Media(#[from] sparrow_media::MediaError),

    #[error("Store error: {0}")]
    Store(#[from] sparrow_annotations::StoreError),

    #[error("Archive error: {0}")]
    Archive(#[from] crate::archiver::ArchiveError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ProcessorError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether this error must terminate the process.
    ///
    /// Frame extraction, detection and archiving failures are scoped to one
    /// segment and the loop moves on. An annotation store that cannot be
    /// written has no recovery strategy, and neither does bad configuration.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ProcessorError::Store(_) | ProcessorError::Config(_))
    }
}
