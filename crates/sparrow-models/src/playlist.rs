//! HLS playlist snapshot parsing.
//!
//! A playlist is a sliding window: the external streaming service appends
//! new segments and evicts old ones on every rewrite. Parsing is line-based
//! and deliberately strict about segment naming — anything that is not a
//! bare lowercase `.ts` filename is ignored.

use std::sync::LazyLock;

use regex::Regex;

use crate::segment::SegmentId;

static SEGMENT_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9_-]+\.ts$").unwrap());

/// Ordered view of the segments currently referenced by the playlist.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaylistSnapshot {
    segments: Vec<SegmentId>,
}

impl PlaylistSnapshot {
    /// Parse a playlist manifest into the ordered list of segment ids.
    ///
    /// Header tags (`#EXTM3U`, `#EXT-X-*`) and per-segment metadata lines
    /// (`#EXTINF:...`) are skipped; only lines matching the segment naming
    /// pattern count.
    pub fn parse(manifest: &str) -> Self {
        let segments = manifest
            .lines()
            .map(str::trim)
            .filter(|line| SEGMENT_LINE.is_match(line))
            .map(SegmentId::from)
            .collect();

        Self { segments }
    }

    /// Segments in playlist order.
    pub fn segments(&self) -> &[SegmentId] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn contains(&self, id: &SegmentId) -> bool {
        self.segments.contains(id)
    }
}
