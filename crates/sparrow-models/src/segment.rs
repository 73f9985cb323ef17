//! Segment identity types.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Identity of one HLS segment: its filename within the playlist.
///
/// Filenames are stable and unique within the lifetime of a playlist, so
/// they serve as the key for both deduplication and annotation storage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SegmentId(String);

impl SegmentId {
    /// Create a segment id from a playlist filename.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The segment filename as referenced by the playlist.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SegmentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SegmentId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// A segment surfaced by the watchtower: its identity plus the on-disk
/// location of the media file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentRef {
    pub id: SegmentId,
    pub path: PathBuf,
}

impl SegmentRef {
    pub fn new(id: SegmentId, path: impl Into<PathBuf>) -> Self {
        Self {
            id,
            path: path.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_id_display() {
        let id = SegmentId::new("seg_00042.ts");
        assert_eq!(id.to_string(), "seg_00042.ts");
        assert_eq!(id.as_str(), "seg_00042.ts");
    }

    #[test]
    fn test_segment_id_serializes_as_plain_string() {
        let id = SegmentId::new("seg_1.ts");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"seg_1.ts\"");
    }
}
