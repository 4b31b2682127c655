//! Cue timestamp rewriting.

use std::sync::LazyLock;

use regex::{Captures, Regex};

/// A cue timing pair. Hours are optional on both sides and the fraction may
/// be hundredths (ASS) or milliseconds, with either a dot or a comma.
static TIMING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:(\d{1,2}):)?(\d{2}):(\d{2})[.,](\d{2,3})[ \t]*-->[ \t]*(?:(\d{1,2}):)?(\d{2}):(\d{2})[.,](\d{2,3})",
    )
    .expect("valid regex")
});

/// Subtract `offset_secs` from every cue timing pair, flooring at zero.
///
/// Every matched pair is re-rendered as `HH:MM:SS.mmm --> HH:MM:SS.mmm`,
/// so a zero offset normalizes timestamps without moving them. Anything
/// after the end timestamp on the timing line (cue settings) is kept.
pub fn shift_timestamps(text: &str, offset_secs: f64) -> String {
    let offset_ms = if offset_secs.is_finite() {
        (offset_secs * 1000.0).round() as i64
    } else {
        0
    };

    TIMING
        .replace_all(text, |caps: &Captures<'_>| {
            let start = shift(to_millis(caps, 1), offset_ms);
            let end = shift(to_millis(caps, 5), offset_ms);
            format!("{} --> {}", format_timestamp(start), format_timestamp(end))
        })
        .into_owned()
}

/// Render milliseconds as `HH:MM:SS.mmm`.
pub fn format_timestamp(ms: u64) -> String {
    let hours = ms / 3_600_000;
    let minutes = (ms / 60_000) % 60;
    let seconds = (ms / 1000) % 60;
    let millis = ms % 1000;
    format!("{hours:02}:{minutes:02}:{seconds:02}.{millis:03}")
}

fn shift(ms: u64, offset_ms: i64) -> u64 {
    (ms as i64).saturating_sub(offset_ms).max(0) as u64
}

/// Read one timestamp starting at capture group `first` (hours).
fn to_millis(caps: &Captures<'_>, first: usize) -> u64 {
    let num = |i: usize| -> u64 {
        caps.get(i)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0)
    };
    let fraction = caps.get(first + 3).map(|m| m.as_str()).unwrap_or("0");
    let frac_ms = match fraction.len() {
        2 => num(first + 3) * 10,
        _ => num(first + 3),
    };
    ((num(first) * 60 + num(first + 1)) * 60 + num(first + 2)) * 1000 + frac_ms
}
