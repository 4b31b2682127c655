//! ffmpeg argument construction for live fragmented-MP4 output.

use crate::encoder::EncoderProfile;

use super::TranscodeConfig;

/// Everything that varies between two transcode sessions.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscodeArgs {
    /// Value for `-i`.
    pub input: String,
    /// Seconds; `0` starts at the beginning.
    pub seek_secs: f64,
    /// Audio stream index among audio streams.
    pub audio_track: Option<u32>,
    pub profile: EncoderProfile,
}

/// Build the full ffmpeg command line, excluding the program.
///
/// Seeking happens on the input side (`-ss` before `-i`) so decoding starts
/// at the requested point with audio and video aligned. Output is fragmented
/// MP4 on stdout with a constant frame rate and resampled stereo AAC.
pub fn build_args(args: &TranscodeArgs, config: &TranscodeConfig) -> Vec<String> {
    let mut out: Vec<String> = ["-hide_banner", "-loglevel", "error"]
        .iter()
        .map(|s| s.to_string())
        .collect();

    if args.input != "pipe:0" {
        out.push("-nostdin".into());
    }

    out.extend(args.profile.input_args());

    if args.seek_secs > 0.0 {
        out.push("-ss".into());
        out.push(format!("{:.3}", args.seek_secs));
    }

    out.push("-i".into());
    out.push(args.input.clone());

    if let Some(track) = args.audio_track {
        out.extend([
            "-map".to_string(),
            "0:v:0".to_string(),
            "-map".to_string(),
            format!("0:a:{track}"),
        ]);
    }
    out.extend(["-sn".to_string(), "-dn".to_string()]);

    out.extend(args.profile.video_args(config.video_bitrate));
    out.extend(["-fps_mode".to_string(), "cfr".to_string()]);

    out.extend([
        "-c:a".to_string(),
        "aac".to_string(),
        "-b:a".to_string(),
        format!("{}k", config.audio_bitrate),
        "-ar".to_string(),
        config.audio_sample_rate.to_string(),
        "-ac".to_string(),
        "2".to_string(),
        "-af".to_string(),
        "aresample=async=1".to_string(),
    ]);

    out.extend(
        [
            "-max_muxing_queue_size",
            "1024",
            "-f",
            "mp4",
            "-movflags",
            "frag_keyframe+empty_moov+default_base_moof",
            "pipe:1",
        ]
        .iter()
        .map(|s| s.to_string()),
    );

    out
}
