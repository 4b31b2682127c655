//! Mediagate-Subtitle: caption normalization.
//!
//! Every caption the gateway serves is WebVTT. This crate converts the two
//! dialects found in the wild (SubRip and ASS/SSA scripts) into WebVTT and
//! rewrites cue timestamps for transcoded playback, whose clock always
//! starts at zero regardless of the seek position.
//!
//! Everything here is a pure text transform. Malformed input is never an
//! error: anything that yields no cues is handed back untouched.
//!
//! ```
//! use mediagate_subtitle::{shift_timestamps, to_canonical};
//!
//! let vtt = to_canonical("1\n00:00:01,000 --> 00:00:03,000\nHello\n\n");
//! assert!(vtt.starts_with("WEBVTT"));
//! assert!(vtt.contains("00:00:01.000 --> 00:00:03.000\nHello"));
//!
//! let shifted = shift_timestamps(&vtt, 0.5);
//! assert!(shifted.contains("00:00:00.500 --> 00:00:02.500"));
//! ```

pub mod ass;
pub mod shift;
pub mod srt;

pub use shift::shift_timestamps;

/// Header line that opens every WebVTT document.
pub const WEBVTT_HEADER: &str = "WEBVTT";

/// Caption dialects recognised by [`detect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// Already canonical.
    WebVtt,
    /// Advanced SubStation Alpha / SubStation Alpha script.
    Ass,
    /// SubRip, also the fallback for anything unrecognised.
    Srt,
}

/// Classify raw caption text.
pub fn detect(raw: &str) -> Dialect {
    let text = raw.trim_start_matches('\u{feff}').trim_start();
    if text.starts_with(WEBVTT_HEADER) {
        return Dialect::WebVtt;
    }
    if text.contains("[Script Info]")
        || text
            .lines()
            .any(|line| line.trim_start().starts_with("Dialogue:"))
    {
        return Dialect::Ass;
    }
    Dialect::Srt
}

/// Convert caption text of any supported dialect to WebVTT.
///
/// WebVTT input is returned unchanged. Input that produces no cues is also
/// returned unchanged, so callers always have something to serve.
pub fn to_canonical(raw: &str) -> String {
    let dialect = detect(raw);
    let converted = match dialect {
        Dialect::WebVtt => return raw.to_string(),
        Dialect::Ass => ass::to_webvtt(raw),
        Dialect::Srt => srt::to_webvtt(raw),
    };

    match converted {
        Some(vtt) => vtt,
        None => {
            tracing::debug!(?dialect, bytes = raw.len(), "No cues found, passing captions through");
            raw.to_string()
        }
    }
}

/// Assemble a WebVTT document from rendered cue blocks.
pub(crate) fn render_document(cues: &[String]) -> Option<String> {
    if cues.is_empty() {
        return None;
    }
    let mut out = String::with_capacity(cues.iter().map(|c| c.len() + 2).sum::<usize>() + 8);
    out.push_str(WEBVTT_HEADER);
    out.push_str("\n\n");
    out.push_str(&cues.join("\n\n"));
    out.push('\n');
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_dialects() {
        assert_eq!(detect("WEBVTT\n\n00:01.000 --> 00:02.000\nx\n"), Dialect::WebVtt);
        assert_eq!(detect("\u{feff}WEBVTT\n"), Dialect::WebVtt);
        assert_eq!(detect("[Script Info]\nTitle: x\n"), Dialect::Ass);
        assert_eq!(
            detect("Dialogue: 0,0:00:01.00,0:00:03.00,Default,,0,0,0,,Hi"),
            Dialect::Ass
        );
        assert_eq!(detect("1\n00:00:01,000 --> 00:00:03,000\nHello\n"), Dialect::Srt);
        assert_eq!(detect("garbage"), Dialect::Srt);
    }

    #[test]
    fn canonical_input_is_identity() {
        let vtt = "WEBVTT\n\n00:00:01.000 --> 00:00:03.000\nHello\n\n00:00:04.000 --> 00:00:05.500\nWorld\n";
        assert_eq!(to_canonical(vtt), vtt);
    }

    #[test]
    fn converted_output_is_stable() {
        let once = to_canonical("1\n00:00:01,000 --> 00:00:03,000\nHello\n\n");
        assert_eq!(to_canonical(&once), once);
    }

    #[test]
    fn srt_sample() {
        let vtt = to_canonical("1\n00:00:01,000 --> 00:00:03,000\nHello\n\n");
        assert_eq!(vtt, "WEBVTT\n\n00:00:01.000 --> 00:00:03.000\nHello\n");
    }

    #[test]
    fn ass_sample() {
        let raw = "[Script Info]\nScriptType: v4.00+\n\n[Events]\n\
                   Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text\n\
                   Dialogue: 0,0:00:01.00,0:00:03.00,Default,,0,0,0,,Hi {\\an8}\n";
        let vtt = to_canonical(raw);
        assert!(vtt.contains("00:00:01.00 --> 00:00:03.00\nHi\n"), "{vtt}");
        assert!(!vtt.contains("\\an8"));
    }

    #[test]
    fn garbage_passes_through() {
        let raw = "this is not a caption file";
        assert_eq!(to_canonical(raw), raw);
    }
}
