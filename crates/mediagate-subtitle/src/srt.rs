//! SubRip conversion.

use std::sync::LazyLock;

use regex::Regex;

use crate::render_document;

static BLOCK_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n[ \t]*\n").expect("valid regex"));

/// Convert SubRip text to WebVTT, or `None` when no cue was found.
///
/// Blocks are separated by blank lines. The timing line is located by its
/// `-->` arrow rather than by position, since the numeric index line is
/// optional in practice. Lines before the timing line are dropped.
pub fn to_webvtt(raw: &str) -> Option<String> {
    let text = raw.trim_start_matches('\u{feff}').replace("\r\n", "\n").replace('\r', "\n");

    let cues: Vec<String> = BLOCK_SEPARATOR
        .split(text.trim())
        .filter_map(convert_block)
        .collect();

    render_document(&cues)
}

fn convert_block(block: &str) -> Option<String> {
    let lines: Vec<&str> = block.lines().collect();
    let timing_idx = lines.iter().position(|line| line.contains("-->"))?;

    let mut cue = lines[timing_idx].trim().replace(',', ".");
    for line in &lines[timing_idx + 1..] {
        cue.push('\n');
        cue.push_str(line.trim_end());
    }
    Some(cue)
}
