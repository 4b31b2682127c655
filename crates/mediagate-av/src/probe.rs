//! Track layout inspection via `ffprobe`.
//!
//! Shells out to `ffprobe -v quiet -print_format json -show_format
//! -show_streams` and maps the JSON into [`MediaInfo`], the shape served by
//! `/media-info`. Track indices are relative to their kind, matching the
//! `audio` and `track` query parameters the gateway accepts.

use std::path::PathBuf;
use std::time::Duration;

use mediagate_common::{Error, Result};
use serde::{Deserialize, Serialize};

use crate::command::ToolCommand;
use crate::input::InputLocator;

const PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// Codecs ffmpeg can re-emit as SubRip.
const TEXT_SUBTITLE_CODECS: &[&str] = &[
    "subrip", "srt", "ass", "ssa", "webvtt", "mov_text", "text", "microdvd", "subviewer",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaInfo {
    /// Seconds.
    pub duration: Option<f64>,
    /// Bytes.
    pub size: Option<u64>,
    /// Bits per second.
    pub bitrate: Option<u64>,
    /// ffprobe `format_name`, e.g. `matroska,webm`.
    pub format: Option<String>,
    pub video_tracks: Vec<VideoTrack>,
    pub audio_tracks: Vec<AudioTrack>,
    pub subtitle_tracks: Vec<SubtitleTrack>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoTrack {
    /// Absolute stream index in the container.
    pub index: u32,
    /// Index among video streams.
    pub track_index: u32,
    pub codec: Option<String>,
    pub profile: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub frame_rate: Option<f64>,
    pub pixel_format: Option<String>,
    pub default: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioTrack {
    pub index: u32,
    /// Index among audio streams; the value `/stream?audio=` expects.
    pub track_index: u32,
    pub codec: Option<String>,
    pub channels: Option<u32>,
    pub channel_layout: Option<String>,
    pub sample_rate: Option<u32>,
    pub language: Option<String>,
    pub title: Option<String>,
    pub default: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubtitleTrack {
    pub index: u32,
    /// Index among subtitle streams; the value `/subtitle?track=` expects.
    pub track_index: u32,
    pub codec: Option<String>,
    pub language: Option<String>,
    pub title: Option<String>,
    pub default: bool,
    pub forced: bool,
    /// Bitmap tracks (PGS, VobSub) cannot be converted to text captions.
    pub text_based: bool,
}

/// A prober backed by the `ffprobe` CLI.
#[derive(Debug, Clone)]
pub struct MediaProber {
    ffprobe_path: PathBuf,
}

impl MediaProber {
    pub fn new(ffprobe_path: PathBuf) -> Self {
        Self { ffprobe_path }
    }

    /// Probe a local file, URL or piped stream.
    pub async fn probe(&self, input: InputLocator) -> Result<MediaInfo> {
        tracing::debug!(input = %input, "Probing media");

        let (input_arg, pipe) = input.take_pipe();
        let mut cmd = ToolCommand::new(self.ffprobe_path.clone());
        cmd.args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(input_arg)
        .timeout(PROBE_TIMEOUT);

        let output = match pipe {
            Some(stream) => cmd.execute_piped(stream).await?,
            None => cmd.execute().await?,
        };

        parse_ffprobe_json(&output.stdout)
    }
}

// ---------------------------------------------------------------------------
// JSON structures
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    format_name: Option<String>,
    duration: Option<String>,
    size: Option<String>,
    bit_rate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    index: u32,
    codec_type: Option<String>,
    codec_name: Option<String>,
    profile: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
    pix_fmt: Option<String>,
    channels: Option<u32>,
    channel_layout: Option<String>,
    sample_rate: Option<String>,
    #[serde(default)]
    disposition: FfprobeDisposition,
    #[serde(default)]
    tags: FfprobeTags,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeDisposition {
    #[serde(default)]
    default: u8,
    #[serde(default)]
    forced: u8,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeTags {
    language: Option<String>,
    title: Option<String>,
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

/// Map raw ffprobe JSON into [`MediaInfo`].
pub fn parse_ffprobe_json(json: &str) -> Result<MediaInfo> {
    let output: FfprobeOutput = serde_json::from_str(json)
        .map_err(|e| Error::Parse(format!("ffprobe JSON parse error: {e}")))?;

    let format = output.format;
    let parse_num = |s: &Option<String>| s.as_deref().and_then(|v| v.parse::<u64>().ok());

    let mut info = MediaInfo {
        duration: format
            .as_ref()
            .and_then(|f| f.duration.as_deref())
            .and_then(|s| s.parse::<f64>().ok()),
        size: format.as_ref().and_then(|f| parse_num(&f.size)),
        bitrate: format.as_ref().and_then(|f| parse_num(&f.bit_rate)),
        format: format.and_then(|f| f.format_name),
        video_tracks: Vec::new(),
        audio_tracks: Vec::new(),
        subtitle_tracks: Vec::new(),
    };

    for stream in output.streams {
        match stream.codec_type.as_deref() {
            Some("video") => {
                // Cover art is exposed as a single-frame video stream.
                if stream.codec_name.as_deref() == Some("mjpeg") && stream.avg_frame_rate.as_deref() == Some("0/0") {
                    continue;
                }
                info.video_tracks.push(VideoTrack {
                    index: stream.index,
                    track_index: info.video_tracks.len() as u32,
                    frame_rate: stream
                        .avg_frame_rate
                        .as_deref()
                        .and_then(parse_frame_rate)
                        .or_else(|| stream.r_frame_rate.as_deref().and_then(parse_frame_rate)),
                    codec: stream.codec_name,
                    profile: stream.profile,
                    width: stream.width,
                    height: stream.height,
                    pixel_format: stream.pix_fmt,
                    default: stream.disposition.default == 1,
                });
            }
            Some("audio") => {
                info.audio_tracks.push(AudioTrack {
                    index: stream.index,
                    track_index: info.audio_tracks.len() as u32,
                    codec: stream.codec_name,
                    channels: stream.channels,
                    channel_layout: stream.channel_layout,
                    sample_rate: stream.sample_rate.and_then(|s| s.parse().ok()),
                    language: stream.tags.language,
                    title: stream.tags.title,
                    default: stream.disposition.default == 1,
                });
            }
            Some("subtitle") => {
                let text_based = stream
                    .codec_name
                    .as_deref()
                    .map(|c| TEXT_SUBTITLE_CODECS.contains(&c))
                    .unwrap_or(false);
                info.subtitle_tracks.push(SubtitleTrack {
                    index: stream.index,
                    track_index: info.subtitle_tracks.len() as u32,
                    codec: stream.codec_name,
                    language: stream.tags.language,
                    title: stream.tags.title,
                    default: stream.disposition.default == 1,
                    forced: stream.disposition.forced == 1,
                    text_based,
                });
            }
            _ => {}
        }
    }

    Ok(info)
}

fn parse_frame_rate(rate: &str) -> Option<f64> {
    match rate.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.parse().ok()?;
            let den: f64 = den.parse().ok()?;
            (den != 0.0 && num != 0.0).then(|| num / den)
        }
        None => rate.parse().ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "streams": [
            {"index": 0, "codec_type": "video", "codec_name": "h264", "profile": "High",
             "width": 1920, "height": 1080, "avg_frame_rate": "24000/1001",
             "r_frame_rate": "24000/1001", "pix_fmt": "yuv420p",
             "disposition": {"default": 1, "forced": 0}},
            {"index": 1, "codec_type": "audio", "codec_name": "ac3", "channels": 6,
             "channel_layout": "5.1(side)", "sample_rate": "48000",
             "disposition": {"default": 1}, "tags": {"language": "eng", "title": "Surround"}},
            {"index": 2, "codec_type": "audio", "codec_name": "aac", "channels": 2,
             "sample_rate": "44100", "tags": {"language": "fra"}},
            {"index": 3, "codec_type": "subtitle", "codec_name": "subrip",
             "disposition": {"default": 0, "forced": 1}, "tags": {"language": "eng"}},
            {"index": 4, "codec_type": "subtitle", "codec_name": "hdmv_pgs_subtitle"},
            {"index": 5, "codec_type": "attachment", "codec_name": "ttf"}
        ],
        "format": {"format_name": "matroska,webm", "duration": "5400.250000",
                   "size": "1073741824", "bit_rate": "1590000"}
    }"#;

    #[test]
    fn parses_format() {
        let info = parse_ffprobe_json(SAMPLE).unwrap();
        assert_eq!(info.format.as_deref(), Some("matroska,webm"));
        assert_eq!(info.duration, Some(5400.25));
        assert_eq!(info.size, Some(1_073_741_824));
        assert_eq!(info.bitrate, Some(1_590_000));
    }

    #[test]
    fn groups_tracks_with_relative_indices() {
        let info = parse_ffprobe_json(SAMPLE).unwrap();
        assert_eq!(info.video_tracks.len(), 1);
        let v = &info.video_tracks[0];
        assert_eq!((v.width, v.height), (Some(1920), Some(1080)));
        assert!((v.frame_rate.unwrap() - 23.976).abs() < 0.001);

        assert_eq!(info.audio_tracks.len(), 2);
        assert_eq!(info.audio_tracks[1].index, 2);
        assert_eq!(info.audio_tracks[1].track_index, 1);
        assert_eq!(info.audio_tracks[0].title.as_deref(), Some("Surround"));
        assert!(info.audio_tracks[0].default);

        assert_eq!(info.subtitle_tracks.len(), 2);
        assert!(info.subtitle_tracks[0].forced);
        assert!(info.subtitle_tracks[0].text_based);
        assert!(!info.subtitle_tracks[1].text_based);
        assert_eq!(info.subtitle_tracks[1].track_index, 1);
    }

    #[test]
    fn serializes_camel_case() {
        let info = parse_ffprobe_json(SAMPLE).unwrap();
        let json = serde_json::to_value(&info).unwrap();
        assert!(json.get("videoTracks").is_some());
        assert!(json.get("subtitleTracks").is_some());
        assert_eq!(json["audioTracks"][1]["trackIndex"], 1);
    }

    #[test]
    fn skips_cover_art() {
        let json = r#"{"streams": [
            {"index": 0, "codec_type": "video", "codec_name": "mjpeg", "avg_frame_rate": "0/0"}
        ]}"#;
        let info = parse_ffprobe_json(json).unwrap();
        assert!(info.video_tracks.is_empty());
        assert!(info.format.is_none());
    }

    #[test]
    fn invalid_json_is_parse_error() {
        let err = parse_ffprobe_json("not json").unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn frame_rates() {
        assert_eq!(parse_frame_rate("25/1"), Some(25.0));
        assert_eq!(parse_frame_rate("0/0"), None);
        assert_eq!(parse_frame_rate("30"), Some(30.0));
    }
}
