//! File-backed annotation store.
//!
//! Single writer (the processor), best-effort external readers (the web
//! frontend serves the file over HTTP verbatim). There is no coordination
//! protocol: readers may observe a store that is one cycle stale, but they
//! must never observe a torn file, so every write goes to a sibling temp
//! file first and is renamed over the target.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tokio::fs;
use tracing::{debug, warn};

use sparrow_models::{Annotation, AnnotationMap, SegmentId};

use crate::error::{StoreError, StoreResult};

/// Durable mapping from segment filename to detection outcome.
#[derive(Debug, Clone)]
pub struct AnnotationStore {
    path: PathBuf,
}

impl AnnotationStore {
    /// Create a store backed by the given file.
    ///
    /// The file does not need to exist yet; it is created on first upsert.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The annotation artifact location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record the detection outcome for one segment.
    ///
    /// Loads the current store, sets the record, and persists the whole map
    /// back before returning. Repeating the call with identical arguments
    /// leaves the artifact unchanged in content.
    pub async fn upsert(
        &self,
        id: &SegmentId,
        bird_detected: bool,
        processed_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let mut annotations = self.load().await;
        annotations.insert(
            id.as_str().to_string(),
            Annotation::new(bird_detected, processed_at),
        );
        self.persist(&annotations).await
    }

    /// Drop every record whose segment is no longer in the active window.
    ///
    /// Rewrites the file only when something was actually removed.
    pub async fn prune(&self, active: &HashSet<SegmentId>) -> StoreResult<()> {
        let mut annotations = self.load().await;
        let before = annotations.len();
        annotations.retain(|name, _| active.contains(&SegmentId::new(name.clone())));

        let removed = before - annotations.len();
        if removed == 0 {
            return Ok(());
        }

        debug!(removed, "Pruned stale annotations");
        self.persist(&annotations).await
    }

    /// Current contents of the store.
    ///
    /// A missing or unparsable file reads as an empty map, never an error.
    pub async fn read(&self) -> AnnotationMap {
        self.load().await
    }

    async fn load(&self) -> AnnotationMap {
        let content = match fs::read(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return AnnotationMap::new(),
            Err(e) => {
                warn!(path = %self.path.display(), "Annotation file unreadable, treating as empty: {}", e);
                return AnnotationMap::new();
            }
        };

        match serde_json::from_slice(&content) {
            Ok(annotations) => annotations,
            Err(e) => {
                warn!(path = %self.path.display(), "Annotation file corrupt, resetting: {}", e);
                AnnotationMap::new()
            }
        }
    }

    async fn persist(&self, annotations: &AnnotationMap) -> StoreResult<()> {
        let json = serde_json::to_vec(annotations)?;

        // Same-directory temp file keeps the rename atomic, so the HTTP
        // reader sees either the old artifact or the new one, never a
        // partial write.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, &json).await.map_err(|source| StoreError::Write {
            path: tmp.clone(),
            source,
        })?;

        fs::rename(&tmp, &self.path)
            .await
            .map_err(|source| StoreError::Replace {
                path: self.path.clone(),
                source,
            })
    }
}
