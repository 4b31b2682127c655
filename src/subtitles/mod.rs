//! Caption delivery: extraction cache, payload decoding and the subtitle
//! index client.

pub mod archive;
pub mod cache;
pub mod provider;

pub use cache::SubtitleCache;
pub use provider::{SearchQuery, SearchResults, SubtitleProvider};

use mediagate_subtitle::{shift_timestamps, to_canonical};

/// WebVTT content type for every caption response.
pub const CAPTIONS_CONTENT_TYPE: &str = "text/vtt; charset=utf-8";

/// Convert raw captions to WebVTT, rebased so playback that began at
/// `start` seconds sees its first cue at the right time.
///
/// Always runs the timestamp rewriter so every cue comes out as
/// `HH:MM:SS.mmm`, even with no offset.
pub fn render_captions(raw: &str, start: Option<f64>) -> String {
    let offset = start.filter(|s| s.is_finite() && *s > 0.0).unwrap_or(0.0);
    shift_timestamps(&to_canonical(raw), offset)
}
