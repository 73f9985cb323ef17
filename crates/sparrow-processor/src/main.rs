//! HLS segment processor binary.

use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use sparrow_annotations::AnnotationStore;
use sparrow_media::{FfmpegFrameExtractor, YoloBirdDetector};
use sparrow_processor::{
    Backoff, ProcessorConfig, SegmentProcessor, StreamArchiver, Watchtower,
};

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("sparrow=info".parse().unwrap())
        .add_directive("ort=warn".parse().unwrap());

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    info!("Starting sparrow-processor");

    // Load configuration
    let config = ProcessorConfig::from_env();
    if let Err(e) = config.validate() {
        error!("{}", e);
        std::process::exit(1);
    }
    info!("Processor config: {:?}", config);

    // No detection capability without the model; bail out early
    let detector = match YoloBirdDetector::new(config.detector_config()) {
        Ok(d) => Arc::new(d),
        Err(e) => {
            error!("Failed to initialize bird detector: {}", e);
            std::process::exit(1);
        }
    };

    let extractor = Arc::new(FfmpegFrameExtractor::new(
        config.frame_resolution,
        config.ffmpeg_timeout.as_secs(),
    ));
    let store = AnnotationStore::new(&config.annotations_path);
    let archiver = StreamArchiver::new(config.stream_dir(), &config.archive_dir);

    // Shutdown signal, honored between segments only
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
        let _ = shutdown_tx.send(true);
    });

    let watchtower = Watchtower::new(
        &config.playlist_path,
        config.poll_interval,
        Backoff::new(config.backoff_min, config.backoff_max),
        shutdown_rx,
    );

    let processor = SegmentProcessor::new(extractor, detector, store)
        .with_archiver(archiver, config.archive_limit);

    if let Err(e) = processor.run(watchtower).await {
        error!("Processor error: {}", e);
        std::process::exit(1);
    }

    info!("Processor shutdown complete");
}
