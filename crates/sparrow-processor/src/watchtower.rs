//! Playlist watchtower.
//!
//! Polls the live HLS playlist and surfaces each newly published segment
//! exactly once, in playlist order. The playlist is a sliding window owned
//! by an external streaming service: it may not exist yet, may be rewritten
//! mid-read, and evicts old segments as new ones are published. Segments
//! evicted before ever appearing in a polled snapshot are permanently
//! skipped; freshness wins over completeness.

use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::fs;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use sparrow_models::{PlaylistSnapshot, SegmentId, SegmentRef};

/// Retry delay that doubles on each consecutive failure, bounded by a
/// maximum, and resets on success.
#[derive(Debug, Clone)]
pub struct Backoff {
    min: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            min,
            max,
            current: min,
        }
    }

    /// The delay to apply for the failure just observed.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }

    /// Reset after a success.
    pub fn reset(&mut self) {
        self.current = self.min;
    }
}

/// Outcome of one playlist poll.
enum Poll {
    /// Playlist read and parsed, at least one segment present
    Snapshot(PlaylistSnapshot),
    /// Playlist exists but references no segments yet
    Empty,
    /// Playlist missing or unreadable
    NotReady,
}

/// Surfaces newly published segments from the live playlist.
///
/// Owns all discovery state (seen set, backoff, buffered segments) as plain
/// instance fields: one watchtower per monitor run, created at startup and
/// discarded at process exit.
pub struct Watchtower {
    playlist_path: PathBuf,
    segment_dir: PathBuf,
    poll_interval: Duration,
    backoff: Backoff,
    /// Delay before the next poll; zero for the very first one
    next_poll_delay: Duration,
    seen: HashSet<SegmentId>,
    /// Latest successfully parsed window, for annotation pruning
    window: HashSet<SegmentId>,
    /// New segments from the last snapshot, not yet handed out
    pending: VecDeque<SegmentRef>,
    shutdown: watch::Receiver<bool>,
}

impl Watchtower {
    pub fn new(
        playlist_path: impl Into<PathBuf>,
        poll_interval: Duration,
        backoff: Backoff,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let playlist_path = playlist_path.into();
        let segment_dir = playlist_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        Self {
            playlist_path,
            segment_dir,
            poll_interval,
            backoff,
            next_poll_delay: Duration::ZERO,
            seen: HashSet::new(),
            window: HashSet::new(),
            pending: VecDeque::new(),
            shutdown,
        }
    }

    /// The next newly observed segment, in playlist order.
    ///
    /// Suspends between polls (poll interval on success, backoff while the
    /// playlist is unavailable) and returns `None` only when shutdown is
    /// signalled. Every returned segment id is returned at most once over
    /// the lifetime of this watchtower.
    pub async fn next_segment(&mut self) -> Option<SegmentRef> {
        loop {
            if *self.shutdown.borrow() {
                return None;
            }

            if let Some(segment) = self.pending.pop_front() {
                return Some(segment);
            }

            if !self.wait(self.next_poll_delay).await {
                return None;
            }

            match self.poll().await {
                Poll::Snapshot(snapshot) => {
                    self.backoff.reset();
                    self.ingest(&snapshot);
                    self.next_poll_delay = self.poll_interval;
                }
                Poll::Empty => {
                    self.next_poll_delay = self.poll_interval;
                }
                Poll::NotReady => {
                    self.next_poll_delay = self.backoff.next_delay();
                }
            }
        }
    }

    /// Identities in the most recent successful snapshot.
    pub fn window(&self) -> &HashSet<SegmentId> {
        &self.window
    }

    async fn poll(&self) -> Poll {
        let content = match fs::read_to_string(&self.playlist_path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(playlist = %self.playlist_path.display(), "Waiting for playlist");
                return Poll::NotReady;
            }
            Err(e) => {
                warn!(playlist = %self.playlist_path.display(), "Failed to read playlist: {}", e);
                return Poll::NotReady;
            }
        };

        let snapshot = PlaylistSnapshot::parse(&content);
        if snapshot.is_empty() {
            debug!("No segments in playlist yet");
            return Poll::Empty;
        }

        Poll::Snapshot(snapshot)
    }

    /// Fold one snapshot into the discovery state.
    ///
    /// New identities are buffered in playlist order and marked seen; then
    /// the seen set is intersected with the snapshot so it never outgrows
    /// the playlist window.
    fn ingest(&mut self, snapshot: &PlaylistSnapshot) {
        for id in snapshot.segments() {
            if self.seen.contains(id) {
                continue;
            }
            self.seen.insert(id.clone());

            let path = self.segment_dir.join(id.as_str());
            if path.exists() {
                self.pending.push_back(SegmentRef::new(id.clone(), path));
            } else {
                warn!(segment = %id, "Segment file not found, skipping");
            }
        }

        let active: HashSet<SegmentId> = snapshot.segments().iter().cloned().collect();
        self.seen.retain(|id| active.contains(id));
        self.window = active;
    }

    /// Sleep for `delay`, returning `false` if shutdown arrives first.
    async fn wait(&mut self, delay: Duration) -> bool {
        if delay.is_zero() {
            return true;
        }

        tokio::select! {
            changed = self.shutdown.changed() => match changed {
                Ok(()) => !*self.shutdown.borrow(),
                Err(_) => false,
            },
            _ = tokio::time::sleep(delay) => true,
        }
    }
}
