//! Segment processing orchestrator.
//!
//! Strictly sequential: one segment is pulled from the watchtower, one
//! frame is extracted, one detection pass runs, one annotation is written.
//! There is no parallelism between polling and processing and none across
//! segments, so annotations land in exactly the order segments were
//! surfaced.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{error, info, warn};

use sparrow_annotations::AnnotationStore;
use sparrow_media::{Detector, FrameExtractor};
use sparrow_models::SegmentRef;

use crate::archiver::{ArchivePrefix, StreamArchiver};
use crate::error::{ProcessorError, ProcessorResult};
use crate::watchtower::Watchtower;

/// Drives the pipeline: watchtower -> frame extraction -> detection ->
/// annotation store.
pub struct SegmentProcessor {
    extractor: Arc<dyn FrameExtractor>,
    detector: Arc<dyn Detector>,
    store: AnnotationStore,
    archiver: Option<(StreamArchiver, usize)>,
}

impl SegmentProcessor {
    pub fn new(
        extractor: Arc<dyn FrameExtractor>,
        detector: Arc<dyn Detector>,
        store: AnnotationStore,
    ) -> Self {
        Self {
            extractor,
            detector,
            store,
            archiver: None,
        }
    }

    /// Archive the live window whenever a bird is detected, keeping the
    /// trailing `limit` segments.
    pub fn with_archiver(mut self, archiver: StreamArchiver, limit: usize) -> Self {
        self.archiver = Some((archiver, limit));
        self
    }

    /// Run the pipeline until shutdown.
    ///
    /// A failure on one segment is logged and the segment skipped (no
    /// annotation written); only fatal errors — an annotation store that
    /// cannot be written — escape this loop.
    pub async fn run(&self, mut watchtower: Watchtower) -> ProcessorResult<()> {
        while let Some(segment) = watchtower.next_segment().await {
            let started = Instant::now();

            match self.process_segment(&segment).await {
                Ok(bird_detected) => {
                    info!(
                        segment = %segment.id,
                        bird_detected,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Segment processed"
                    );
                }
                Err(e) if e.is_fatal() => {
                    error!(segment = %segment.id, "Fatal error while processing: {}", e);
                    return Err(e);
                }
                Err(e) => {
                    warn!(segment = %segment.id, "Skipping segment: {}", e);
                }
            }

            // one prune per poll cycle, against the cycle's own snapshot
            self.store.prune(watchtower.window()).await?;
        }

        info!("Watchtower stopped, processor shutting down");
        Ok(())
    }

    /// Process a single segment; returns whether a bird was detected.
    async fn process_segment(&self, segment: &SegmentRef) -> ProcessorResult<bool> {
        let frame = self.extractor.first_frame(&segment.path).await?;
        let bird_detected = self.detector.detect(&frame)?;

        if bird_detected {
            self.archive_window(segment).await;
        }

        self.store
            .upsert(&segment.id, bird_detected, Utc::now())
            .await?;

        Ok(bird_detected)
    }

    /// Best-effort archive on detection; never blocks the annotation write.
    async fn archive_window(&self, segment: &SegmentRef) {
        let Some((archiver, limit)) = &self.archiver else {
            return;
        };

        // bounding at the triggering segment keeps segments that land
        // mid-archive out of the snapshot
        match archiver
            .archive(ArchivePrefix::Auto, Some(*limit), Some(segment.id.as_str()))
            .await
        {
            Ok(destination) => {
                info!(
                    segment = %segment.id,
                    destination = %destination.display(),
                    "Archived stream window"
                );
            }
            Err(e) => {
                warn!(segment = %segment.id, "Failed to archive stream window: {}", e);
            }
        }
    }
}
