//! ASS/SSA script conversion.
//!
//! Only the `[Events]` section matters. Column positions come from its
//! `Format:` line when present, otherwise the standard v4+ layout is
//! assumed. Timestamps keep their source precision (`H:MM:SS.cc` becomes
//! `HH:MM:SS.cc`); the shift pass renders them with milliseconds.

use std::sync::LazyLock;

use regex::Regex;

use crate::render_document;

static OVERRIDE_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{[^}]*\}").expect("valid regex"));

static ASS_TIME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+):(\d{2}):(\d{2})\.(\d{1,3})$").expect("valid regex"));

/// Column layout of `Dialogue:` lines.
#[derive(Debug, Clone, Copy)]
struct EventFormat {
    fields: usize,
    start: usize,
    end: usize,
    text: usize,
}

impl Default for EventFormat {
    /// `Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text`
    fn default() -> Self {
        Self {
            fields: 10,
            start: 1,
            end: 2,
            text: 9,
        }
    }
}

impl EventFormat {
    fn parse(spec: &str) -> Option<Self> {
        let names: Vec<String> = spec
            .split(',')
            .map(|s| s.trim().to_ascii_lowercase())
            .collect();
        let idx = |name: &str| names.iter().position(|n| n == name);
        let text = idx("text")?;
        // Text must be last, it is the only column allowed to contain commas.
        if text + 1 != names.len() {
            return None;
        }
        Some(Self {
            fields: names.len(),
            start: idx("start")?,
            end: idx("end")?,
            text,
        })
    }
}

struct Cue {
    start_ms: u64,
    block: String,
}

/// Convert an ASS/SSA script to WebVTT, or `None` when it has no dialogue.
pub fn to_webvtt(raw: &str) -> Option<String> {
    let mut format = EventFormat::default();
    let mut in_events = false;
    let mut cues = Vec::new();

    for line in raw.lines() {
        let line = line.trim_start_matches('\u{feff}').trim();
        if line.starts_with('[') {
            in_events = line.eq_ignore_ascii_case("[events]");
            continue;
        }

        if let Some(spec) = line.strip_prefix("Format:") {
            if in_events {
                format = EventFormat::parse(spec).unwrap_or_default();
            }
            continue;
        }

        if let Some(rest) = line.strip_prefix("Dialogue:") {
            if let Some(cue) = convert_dialogue(rest, format) {
                cues.push(cue);
            }
        }
    }

    // Scripts are not required to list events chronologically.
    cues.sort_by_key(|c| c.start_ms);
    let blocks: Vec<String> = cues.into_iter().map(|c| c.block).collect();
    render_document(&blocks)
}

fn convert_dialogue(rest: &str, format: EventFormat) -> Option<Cue> {
    let columns: Vec<&str> = rest.trim_start().splitn(format.fields, ',').collect();
    if columns.len() < format.fields {
        return None;
    }

    let (start, start_ms) = convert_time(columns[format.start].trim())?;
    let (end, _) = convert_time(columns[format.end].trim())?;
    let text = clean_text(columns[format.text]);
    if text.is_empty() {
        return None;
    }

    Some(Cue {
        start_ms,
        block: format!("{start} --> {end}\n{text}"),
    })
}

/// Pad the hour field to two digits, keeping the fraction as written.
fn convert_time(ts: &str) -> Option<(String, u64)> {
    let caps = ASS_TIME.captures(ts)?;
    let hours: u64 = caps[1].parse().ok()?;
    let minutes: u64 = caps[2].parse().ok()?;
    let seconds: u64 = caps[3].parse().ok()?;
    let fraction = &caps[4];
    let frac_ms: u64 = match fraction.len() {
        1 => fraction.parse::<u64>().ok()? * 100,
        2 => fraction.parse::<u64>().ok()? * 10,
        _ => fraction.parse().ok()?,
    };

    let rendered = format!("{hours:02}:{}:{}.{fraction}", &caps[2], &caps[3]);
    let ms = ((hours * 60 + minutes) * 60 + seconds) * 1000 + frac_ms;
    Some((rendered, ms))
}

fn clean_text(text: &str) -> String {
    let stripped = OVERRIDE_BLOCK.replace_all(text, "");
    let expanded = stripped
        .replace("\\N", "\n")
        .replace("\\n", "\n")
        .replace("\\h", " ");
    expanded
        .lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCRIPT: &str = "[Script Info]\n\
        Title: Sample\n\
        ScriptType: v4.00+\n\
        \n\
        [V4+ Styles]\n\
        Format: Name, Fontname, Fontsize, PrimaryColour\n\
        Style: Default,Arial,20,&H00FFFFFF\n\
        \n\
        [Events]\n\
        Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text\n\
        Dialogue: 0,0:00:05.50,0:00:07.00,Default,,0,0,0,,Second, with a comma\n\
        Dialogue: 0,0:00:01.00,0:00:03.00,Default,,0,0,0,,{\\i1}First{\\i0}\\Nline two\n";

    #[test]
    fn converts_dialogue_lines() {
        let vtt = to_webvtt(SCRIPT).unwrap();
        assert_eq!(
            vtt,
            "WEBVTT\n\n\
             00:00:01.00 --> 00:00:03.00\nFirst\nline two\n\n\
             00:00:05.50 --> 00:00:07.00\nSecond, with a comma\n"
        );
    }

    #[test]
    fn styles_format_line_is_ignored() {
        // The styles section has only four columns; using it for events
        // would put the text column in the wrong place.
        let vtt = to_webvtt(SCRIPT).unwrap();
        assert!(vtt.contains("Second, with a comma"));
    }

    #[test]
    fn custom_event_format() {
        let raw = "[Events]\nFormat: Start, End, Text\nDialogue: 0:00:02.00,0:00:04.00,Moved\n";
        let vtt = to_webvtt(raw).unwrap();
        assert!(vtt.contains("00:00:02.00 --> 00:00:04.00\nMoved"));
    }

    #[test]
    fn hard_space_and_lowercase_break() {
        assert_eq!(clean_text("a\\hb\\nc"), "a b\nc");
        assert_eq!(clean_text("{\\an8}{\\pos(10,10)}  Top  "), "Top");
    }

    #[test]
    fn pads_hours_only() {
        assert_eq!(convert_time("0:00:01.00").unwrap().0, "00:00:01.00");
        assert_eq!(convert_time("1:02:03.456").unwrap(), ("01:02:03.456".to_string(), 3_723_456));
        assert!(convert_time("bogus").is_none());
    }

    #[test]
    fn empty_and_malformed_dialogue_is_dropped() {
        let raw = "[Events]\nDialogue: 0,0:00:01.00,0:00:02.00,Default,,0,0,0,,{\\an8}\nDialogue: short\n";
        assert!(to_webvtt(raw).is_none());
    }
}
