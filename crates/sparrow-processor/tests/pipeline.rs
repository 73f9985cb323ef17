//! End-to-end pipeline tests with stubbed frame extraction and detection.
//!
//! FFmpeg and the ONNX model are not exercised here; the point is the
//! behavior of the loop itself — ordering, annotation content, pruning and
//! per-segment failure isolation — under an evolving playlist.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use image::DynamicImage;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use sparrow_annotations::AnnotationStore;
use sparrow_media::{Detector, FrameExtractor, MediaError, MediaResult};
use sparrow_processor::{Backoff, ProcessorResult, SegmentProcessor, Watchtower};

struct StubFrameExtractor;

#[async_trait]
impl FrameExtractor for StubFrameExtractor {
    async fn first_frame(&self, segment: &Path) -> MediaResult<DynamicImage> {
        if !segment.exists() {
            return Err(MediaError::SegmentNotFound(segment.to_path_buf()));
        }
        Ok(DynamicImage::new_rgb8(2, 2))
    }
}

/// Detector returning a scripted result per call, in segment order.
struct ScriptedDetector {
    results: Mutex<VecDeque<Result<bool, String>>>,
}

impl ScriptedDetector {
    fn new(results: Vec<Result<bool, String>>) -> Self {
        Self {
            results: Mutex::new(results.into()),
        }
    }
}

impl Detector for ScriptedDetector {
    fn detect(&self, _frame: &DynamicImage) -> MediaResult<bool> {
        match self.results.lock().unwrap().pop_front() {
            Some(Ok(detected)) => Ok(detected),
            Some(Err(msg)) => Err(MediaError::detection_failed(msg)),
            None => Ok(false),
        }
    }
}

fn write_playlist(dir: &Path, segments: &[&str]) {
    let mut manifest = String::from("#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-TARGETDURATION:2\n");
    for segment in segments {
        manifest.push_str("#EXTINF:2.0,\n");
        manifest.push_str(segment);
        manifest.push('\n');
        std::fs::write(dir.join(segment), b"ts").unwrap();
    }
    std::fs::write(dir.join("sparrow_cam.m3u8"), manifest).unwrap();
}

struct Pipeline {
    store: AnnotationStore,
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<ProcessorResult<()>>,
}

impl Pipeline {
    fn start(dir: &Path, results: Vec<Result<bool, String>>) -> Self {
        let store = AnnotationStore::new(dir.join("bird.json"));
        let (shutdown, shutdown_rx) = watch::channel(false);

        let watchtower = Watchtower::new(
            dir.join("sparrow_cam.m3u8"),
            Duration::from_secs(1),
            Backoff::new(Duration::from_secs(1), Duration::from_secs(10)),
            shutdown_rx,
        );

        let processor = SegmentProcessor::new(
            Arc::new(StubFrameExtractor),
            Arc::new(ScriptedDetector::new(results)),
            store.clone(),
        );

        let handle = tokio::spawn(async move { processor.run(watchtower).await });

        Self {
            store,
            shutdown,
            handle,
        }
    }

    /// Wait until the annotation artifact satisfies `condition`.
    async fn wait_for<F>(&self, condition: F)
    where
        F: Fn(&sparrow_models::AnnotationMap) -> bool,
    {
        for _ in 0..1_000 {
            if condition(&self.store.read().await) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        panic!("condition not reached: {:?}", self.store.read().await);
    }

    async fn stop(self) {
        self.shutdown.send(true).unwrap();
        self.handle.await.unwrap().unwrap();
    }
}

#[tokio::test(start_paused = true)]
async fn test_one_pass_annotates_every_segment() {
    let dir = tempfile::tempdir().unwrap();
    write_playlist(dir.path(), &["seg1.ts", "seg2.ts"]);

    let pipeline = Pipeline::start(dir.path(), vec![Ok(true), Ok(false)]);
    pipeline.wait_for(|annotations| annotations.len() == 2).await;

    let annotations = pipeline.store.read().await;
    assert!(annotations["seg1.ts"].bird_detected);
    assert!(!annotations["seg2.ts"].bird_detected);

    pipeline.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_sliding_window_prunes_stale_annotations() {
    let dir = tempfile::tempdir().unwrap();
    write_playlist(dir.path(), &["seg1.ts", "seg2.ts", "seg3.ts"]);

    let pipeline = Pipeline::start(
        dir.path(),
        vec![Ok(true), Ok(false), Ok(true), Ok(false)],
    );
    pipeline.wait_for(|annotations| annotations.len() == 3).await;

    // seg1 leaves the window; it is never reprocessed, yet its record goes
    write_playlist(dir.path(), &["seg2.ts", "seg3.ts", "seg4.ts"]);
    pipeline
        .wait_for(|annotations| {
            annotations.contains_key("seg4.ts") && !annotations.contains_key("seg1.ts")
        })
        .await;

    let annotations = pipeline.store.read().await;
    let keys: Vec<_> = annotations.keys().map(String::as_str).collect();
    assert_eq!(keys, ["seg2.ts", "seg3.ts", "seg4.ts"]);

    pipeline.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_detector_failure_skips_segment_only() {
    let dir = tempfile::tempdir().unwrap();
    write_playlist(dir.path(), &["seg1.ts", "seg2.ts"]);

    let pipeline = Pipeline::start(
        dir.path(),
        vec![Err("inference failed".to_string()), Ok(true)],
    );
    pipeline
        .wait_for(|annotations| annotations.contains_key("seg2.ts"))
        .await;

    // the failed segment got no record, and the pipeline kept going
    let annotations = pipeline.store.read().await;
    assert_eq!(annotations.len(), 1);
    assert!(annotations["seg2.ts"].bird_detected);

    pipeline.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_annotations_survive_processor_restart() {
    let dir = tempfile::tempdir().unwrap();
    write_playlist(dir.path(), &["seg1.ts"]);

    let first = Pipeline::start(dir.path(), vec![Ok(true)]);
    first.wait_for(|annotations| annotations.len() == 1).await;
    first.stop().await;

    // a fresh watchtower re-surfaces seg1; reprocessing overwrites the
    // record in place rather than duplicating it
    let second = Pipeline::start(dir.path(), vec![Ok(false)]);
    second
        .wait_for(|annotations| {
            annotations.len() == 1 && !annotations["seg1.ts"].bird_detected
        })
        .await;

    second.stop().await;
}
