//! Stream archiver.
//!
//! Copies the live HLS window (playlist plus segment files) into a dated,
//! uniquely named archive directory, then trims the copy down to the
//! requested number of trailing segments and rewrites the archived playlist
//! to match. Used automatically on positive detections and manually through
//! the `sparrow-archive` binary.

use std::path::{Path, PathBuf};

use chrono::Utc;
use thiserror::Error;
use tokio::fs;
use tracing::info;
use uuid::Uuid;

/// Playlist tags that belong to the header rather than to a segment.
const M3U8_HEADER_TAGS: &[&str] = &[
    "#EXTM3U",
    "#EXT-X-VERSION",
    "#EXT-X-MEDIA-SEQUENCE",
    "#EXT-X-TARGETDURATION",
    "#EXT-X-STREAM-INF",
];

pub type ArchiveResult<T> = Result<T, ArchiveError>;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Segment limit must be positive")]
    InvalidLimit,

    #[error("Stream directory does not exist: {0}")]
    MissingStreamDir(PathBuf),

    #[error("Archive directory does not exist: {0}")]
    MissingArchiveDir(PathBuf),

    #[error("No playlist file found in stream directory")]
    MissingPlaylist,

    #[error("Multiple playlist files found in stream directory")]
    MultiplePlaylists,

    #[error("No segment files found in stream directory")]
    NoSegments,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Why an archive was taken; becomes the directory name prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchivePrefix {
    /// Triggered by a positive detection
    Auto,
    /// Requested through the archive binary
    Manual,
}

impl ArchivePrefix {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArchivePrefix::Auto => "auto",
            ArchivePrefix::Manual => "manual",
        }
    }
}

/// One segment entry of a playlist: its metadata lines and filename.
#[derive(Debug, Clone)]
struct SegmentEntry {
    metadata: Vec<String>,
    name: String,
}

/// Parsed playlist split into header and segment entries.
#[derive(Debug, Clone)]
struct PlaylistData {
    header_lines: Vec<String>,
    entries: Vec<SegmentEntry>,
}

/// Archives the live HLS window to timestamped unique directories.
#[derive(Debug, Clone)]
pub struct StreamArchiver {
    stream_dir: PathBuf,
    archive_dir: PathBuf,
}

impl StreamArchiver {
    pub fn new(stream_dir: impl Into<PathBuf>, archive_dir: impl Into<PathBuf>) -> Self {
        Self {
            stream_dir: stream_dir.into(),
            archive_dir: archive_dir.into(),
        }
    }

    /// Copy the current playlist and segments into a new archive directory,
    /// keeping only the trailing `limit` segments (all of them when `None`).
    ///
    /// `end_segment` bounds the window at the segment that triggered the
    /// archive: anything the playlist gained after it is dropped, and the
    /// limit is counted backwards from it.
    ///
    /// Returns the archive directory created.
    pub async fn archive(
        &self,
        prefix: ArchivePrefix,
        limit: Option<usize>,
        end_segment: Option<&str>,
    ) -> ArchiveResult<PathBuf> {
        let playlist_name = self.validate(limit).await?;
        let destination = self.copy_stream(&playlist_name, prefix).await?;

        let playlist =
            load_playlist_data(&destination.join(&playlist_name), limit, end_segment).await?;
        clean_archive(&destination, &playlist_name, &playlist).await?;

        info!(
            destination = %destination.display(),
            segments = playlist.entries.len(),
            "Archived stream"
        );
        Ok(destination)
    }

    /// Check archive prerequisites; returns the playlist filename.
    async fn validate(&self, limit: Option<usize>) -> ArchiveResult<String> {
        if limit == Some(0) {
            return Err(ArchiveError::InvalidLimit);
        }
        if !self.stream_dir.is_dir() {
            return Err(ArchiveError::MissingStreamDir(self.stream_dir.clone()));
        }
        if !self.archive_dir.is_dir() {
            return Err(ArchiveError::MissingArchiveDir(self.archive_dir.clone()));
        }

        let playlists = files_with_extension(&self.stream_dir, "m3u8").await?;
        let playlist_name = match playlists.as_slice() {
            [] => return Err(ArchiveError::MissingPlaylist),
            [single] => single.clone(),
            _ => return Err(ArchiveError::MultiplePlaylists),
        };

        if files_with_extension(&self.stream_dir, "ts").await?.is_empty() {
            return Err(ArchiveError::NoSegments);
        }

        Ok(playlist_name)
    }

    /// Create the dated archive directory and copy all stream files into it.
    async fn copy_stream(
        &self,
        playlist_name: &str,
        prefix: ArchivePrefix,
    ) -> ArchiveResult<PathBuf> {
        let now = Utc::now();
        let directory_name = format!(
            "{}_{}_{}",
            prefix.as_str(),
            now.format("%Y-%m-%dT%H:%M:%SZ"),
            Uuid::new_v4()
        );
        let destination = self
            .archive_dir
            .join(now.format("%Y/%m/%d").to_string())
            .join(directory_name);
        fs::create_dir_all(&destination).await?;

        fs::copy(
            self.stream_dir.join(playlist_name),
            destination.join(playlist_name),
        )
        .await?;

        for segment in files_with_extension(&self.stream_dir, "ts").await? {
            fs::copy(self.stream_dir.join(&segment), destination.join(&segment)).await?;
        }

        Ok(destination)
    }
}

/// Parse the copied playlist and apply the end-segment bound and limit.
async fn load_playlist_data(
    playlist_path: &Path,
    limit: Option<usize>,
    end_segment: Option<&str>,
) -> ArchiveResult<PlaylistData> {
    let content = fs::read_to_string(playlist_path).await?;
    let lines: Vec<&str> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    let mut header_lines = Vec::new();
    let mut entries = Vec::new();
    let mut metadata = Vec::new();

    for line in lines {
        if M3U8_HEADER_TAGS.iter().any(|tag| line.starts_with(tag)) {
            header_lines.push(line.to_string());
        } else if line.starts_with('#') {
            metadata.push(line.to_string());
        } else {
            entries.push(SegmentEntry {
                metadata: std::mem::take(&mut metadata),
                name: line.to_string(),
            });
        }
    }

    match end_segment {
        Some(end) => {
            // Segments past `end` arrived while the archive was being taken;
            // an `end` the playlist does not know leaves the window as is.
            if let Some(end_idx) = entries.iter().position(|e| e.name == end) {
                entries.truncate(end_idx + 1);
                apply_limit(&mut entries, limit);
            }
        }
        None => apply_limit(&mut entries, limit),
    }

    Ok(PlaylistData {
        header_lines,
        entries,
    })
}

/// Keep only the trailing `limit` entries.
fn apply_limit(entries: &mut Vec<SegmentEntry>, limit: Option<usize>) {
    if let Some(limit) = limit {
        if limit < entries.len() {
            entries.drain(..entries.len() - limit);
        }
    }
}

/// Remove archived files the trimmed playlist no longer references, then
/// rewrite the playlist itself.
async fn clean_archive(
    destination: &Path,
    playlist_name: &str,
    playlist: &PlaylistData,
) -> ArchiveResult<()> {
    let kept: Vec<&str> = playlist.entries.iter().map(|e| e.name.as_str()).collect();

    let mut dir = fs::read_dir(destination).await?;
    while let Some(entry) = dir.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if !kept.contains(&name.as_str()) {
            fs::remove_file(entry.path()).await?;
        }
    }

    let mut lines = playlist.header_lines.clone();
    for entry in &playlist.entries {
        lines.extend(entry.metadata.iter().cloned());
        lines.push(entry.name.clone());
    }
    lines.push(String::new());

    fs::write(destination.join(playlist_name), lines.join("\n")).await?;
    Ok(())
}

/// Filenames in `dir` with the given extension, sorted for determinism.
async fn files_with_extension(dir: &Path, extension: &str) -> std::io::Result<Vec<String>> {
    let mut names = Vec::new();
    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == extension) {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
    }
    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> (tempfile::TempDir, tempfile::TempDir, StreamArchiver) {
        let stream = tempfile::tempdir().unwrap();
        let archive = tempfile::tempdir().unwrap();

        let manifest = "#EXTM3U\n\
                        #EXT-X-VERSION:3\n\
                        #EXT-X-TARGETDURATION:2\n\
                        #EXTINF:2.0,\n\
                        seg_001.ts\n\
                        #EXTINF:2.0,\n\
                        seg_002.ts\n\
                        #EXTINF:2.0,\n\
                        seg_003.ts\n";
        std::fs::write(stream.path().join("sparrow_cam.m3u8"), manifest).unwrap();
        for name in ["seg_001.ts", "seg_002.ts", "seg_003.ts"] {
            std::fs::write(stream.path().join(name), name.as_bytes()).unwrap();
        }

        let archiver = StreamArchiver::new(stream.path(), archive.path());
        (stream, archive, archiver)
    }

    async fn archived_files(destination: &Path) -> Vec<String> {
        let mut names = Vec::new();
        let mut dir = fs::read_dir(destination).await.unwrap();
        while let Some(entry) = dir.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_archive_keeps_trailing_limit() {
        let (_stream, _archive, archiver) = fixture();

        let destination = archiver.archive(ArchivePrefix::Auto, Some(1), None).await.unwrap();

        let files = archived_files(&destination).await;
        assert_eq!(files, ["seg_003.ts", "sparrow_cam.m3u8"]);

        let playlist = fs::read_to_string(destination.join("sparrow_cam.m3u8"))
            .await
            .unwrap();
        assert!(playlist.contains("seg_003.ts"));
        assert!(!playlist.contains("seg_001.ts"));
        assert!(playlist.starts_with("#EXTM3U"));
        assert!(playlist.ends_with('\n'));
    }

    #[tokio::test]
    async fn test_archive_without_limit_keeps_everything() {
        let (_stream, _archive, archiver) = fixture();

        let destination = archiver.archive(ArchivePrefix::Manual, None, None).await.unwrap();

        let files = archived_files(&destination).await;
        assert_eq!(
            files,
            ["seg_001.ts", "seg_002.ts", "seg_003.ts", "sparrow_cam.m3u8"]
        );
    }

    #[tokio::test]
    async fn test_end_segment_bounds_the_archive() {
        let (_stream, _archive, archiver) = fixture();

        let destination = archiver
            .archive(ArchivePrefix::Auto, Some(1), Some("seg_002.ts"))
            .await
            .unwrap();

        // seg_003 landed after the trigger and must not be kept
        let files = archived_files(&destination).await;
        assert_eq!(files, ["seg_002.ts", "sparrow_cam.m3u8"]);
    }

    #[tokio::test]
    async fn test_end_segment_without_limit_keeps_preceding_window() {
        let (_stream, _archive, archiver) = fixture();

        let destination = archiver
            .archive(ArchivePrefix::Auto, None, Some("seg_002.ts"))
            .await
            .unwrap();

        let files = archived_files(&destination).await;
        assert_eq!(files, ["seg_001.ts", "seg_002.ts", "sparrow_cam.m3u8"]);
    }

    #[tokio::test]
    async fn test_unknown_end_segment_keeps_everything() {
        let (_stream, _archive, archiver) = fixture();

        let destination = archiver
            .archive(ArchivePrefix::Auto, Some(1), Some("seg_099.ts"))
            .await
            .unwrap();

        let files = archived_files(&destination).await;
        assert_eq!(
            files,
            ["seg_001.ts", "seg_002.ts", "seg_003.ts", "sparrow_cam.m3u8"]
        );
    }

    #[tokio::test]
    async fn test_archive_directory_is_dated_and_prefixed() {
        let (_stream, archive, archiver) = fixture();

        let destination = archiver.archive(ArchivePrefix::Auto, Some(1), None).await.unwrap();

        let relative = destination.strip_prefix(archive.path()).unwrap();
        let components: Vec<_> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().to_string())
            .collect();
        assert_eq!(components.len(), 4); // YYYY/MM/DD/<dirname>
        assert!(components[3].starts_with("auto_"));
    }

    #[tokio::test]
    async fn test_zero_limit_is_rejected() {
        let (_stream, _archive, archiver) = fixture();
        let err = archiver.archive(ArchivePrefix::Manual, Some(0), None).await.unwrap_err();
        assert!(matches!(err, ArchiveError::InvalidLimit));
    }

    #[tokio::test]
    async fn test_missing_playlist_is_rejected() {
        let (stream, _archive, archiver) = fixture();
        std::fs::remove_file(stream.path().join("sparrow_cam.m3u8")).unwrap();

        let err = archiver.archive(ArchivePrefix::Auto, Some(1), None).await.unwrap_err();
        assert!(matches!(err, ArchiveError::MissingPlaylist));
    }

    #[tokio::test]
    async fn test_multiple_playlists_are_rejected() {
        let (stream, _archive, archiver) = fixture();
        std::fs::write(stream.path().join("other.m3u8"), "#EXTM3U\n").unwrap();

        let err = archiver.archive(ArchivePrefix::Auto, Some(1), None).await.unwrap_err();
        assert!(matches!(err, ArchiveError::MultiplePlaylists));
    }

    #[tokio::test]
    async fn test_no_segments_is_rejected() {
        let (stream, _archive, archiver) = fixture();
        for name in ["seg_001.ts", "seg_002.ts", "seg_003.ts"] {
            std::fs::remove_file(stream.path().join(name)).unwrap();
        }

        let err = archiver.archive(ArchivePrefix::Auto, Some(1), None).await.unwrap_err();
        assert!(matches!(err, ArchiveError::NoSegments));
    }

    #[tokio::test]
    async fn test_missing_archive_dir_is_rejected() {
        let (_stream, archive, archiver) = fixture();
        drop(archive);

        let err = archiver.archive(ArchivePrefix::Auto, Some(1), None).await.unwrap_err();
        assert!(matches!(err, ArchiveError::MissingArchiveDir(_)));
    }
}
