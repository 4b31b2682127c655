//! Path utilities for detecting file types by extension.
//!
//! These operate on plain `&str` names as well as [`Path`]s, because remote
//! listings hand back server-side paths that never touch the local
//! filesystem.

use std::path::Path;

/// Video file extensions recognised by listings and the gateway.
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "avi", "mov", "wmv", "flv", "webm", "m4v"];

/// Caption file extensions, used when picking an entry out of an archive.
const SUBTITLE_EXTENSIONS: &[&str] = &["srt", "ass", "ssa", "vtt", "sub"];

/// Lowercased extension of a `/`-separated name, if any.
pub fn extension_of(name: &str) -> Option<String> {
    let file_name = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let (stem, ext) = file_name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Check if a name (local or remote path) has a video extension.
///
/// ```
/// use mediagate_common::paths::is_video_name;
///
/// assert!(is_video_name("/media/Show/S01E01.MKV"));
/// assert!(!is_video_name("/media/Show/S01E01.srt"));
/// ```
pub fn is_video_name(name: &str) -> bool {
    extension_of(name)
        .map(|ext| VIDEO_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// Check if a local path has a video extension.
pub fn is_video_file(path: &Path) -> bool {
    path.to_str().map(is_video_name).unwrap_or(false)
}

/// Check if a name has a caption extension.
pub fn is_subtitle_name(name: &str) -> bool {
    extension_of(name)
        .map(|ext| SUBTITLE_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// Get the list of video file extensions.
#[must_use]
pub fn video_extensions() -> &'static [&'static str] {
    VIDEO_EXTENSIONS
}

/// Join a remote directory and an entry name with a single `/`.
pub fn join_remote(dir: &str, name: &str) -> String {
    if dir.is_empty() || dir == "/" {
        format!("/{}", name.trim_start_matches('/'))
    } else {
        format!("{}/{}", dir.trim_end_matches('/'), name.trim_start_matches('/'))
    }
}
