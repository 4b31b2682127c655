//! H.264 encoder selection.
//!
//! `hw_accel = "auto"` runs `ffmpeg -hide_banner -encoders` once at startup,
//! then trial-encodes a single synthetic frame with each listed hardware
//! encoder. Distribution builds list NVENC, QSV and VA-API whether or not a
//! device exists, so only an encoder that survives the trial is used.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::command::ToolCommand;

/// Configured acceleration preference.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HwAccel {
    #[default]
    Auto,
    None,
    Videotoolbox,
    Nvenc,
    Vaapi,
    Qsv,
}

/// The encoder a transcode session actually uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncoderProfile {
    Software,
    Videotoolbox,
    Nvenc,
    Vaapi,
    Qsv,
}

/// Render node used for VA-API encodes.
const VAAPI_DEVICE: &str = "/dev/dri/renderD128";

impl EncoderProfile {
    /// ffmpeg encoder name.
    pub fn encoder(self) -> &'static str {
        match self {
            Self::Software => "libx264",
            Self::Videotoolbox => "h264_videotoolbox",
            Self::Nvenc => "h264_nvenc",
            Self::Vaapi => "h264_vaapi",
            Self::Qsv => "h264_qsv",
        }
    }

    /// Arguments that must precede `-i`.
    pub fn input_args(self) -> Vec<String> {
        match self {
            Self::Vaapi => vec!["-vaapi_device".into(), VAAPI_DEVICE.into()],
            _ => Vec::new(),
        }
    }

    /// Video encoding arguments with a `kbps` bitrate ceiling.
    pub fn video_args(self, kbps: u32) -> Vec<String> {
        let rate = format!("{kbps}k");
        let bufsize = format!("{}k", kbps.saturating_mul(2));
        let mut args: Vec<String> = vec!["-c:v".into(), self.encoder().into()];

        let tuning: &[&str] = match self {
            Self::Software => &["-preset", "veryfast", "-tune", "zerolatency", "-pix_fmt", "yuv420p"],
            Self::Videotoolbox => &["-realtime", "1", "-allow_sw", "1", "-pix_fmt", "yuv420p"],
            Self::Nvenc => &["-preset", "p1", "-tune", "ll", "-rc", "vbr", "-pix_fmt", "yuv420p"],
            Self::Vaapi => &["-vf", "format=nv12,hwupload"],
            Self::Qsv => &["-preset", "veryfast", "-look_ahead", "0", "-pix_fmt", "nv12"],
        };
        args.extend(tuning.iter().map(|s| s.to_string()));
        args.extend(["-b:v".to_string(), rate.clone(), "-maxrate".to_string(), rate, "-bufsize".to_string(), bufsize]);
        args
    }

    /// Hardware encoders in preference order for this platform.
    fn hardware_candidates() -> &'static [EncoderProfile] {
        if cfg!(target_os = "macos") {
            &[Self::Videotoolbox]
        } else {
            &[Self::Nvenc, Self::Qsv, Self::Vaapi]
        }
    }

    /// Hardware profiles present in `ffmpeg -encoders` output, in
    /// preference order. Presence only means compiled in.
    pub fn listed_hardware(list: &str) -> Vec<Self> {
        let available: Vec<&str> = list
            .lines()
            .filter_map(|line| line.split_whitespace().nth(1))
            .collect();
        Self::hardware_candidates()
            .iter()
            .copied()
            .filter(|p| available.contains(&p.encoder()))
            .collect()
    }

    /// Arguments for a one-frame encode of a synthetic source.
    fn trial_args(self) -> Vec<String> {
        let mut args: Vec<String> = vec!["-hide_banner".into(), "-nostdin".into()];
        args.extend(self.input_args());
        args.extend(
            ["-f", "lavfi", "-i", "color=s=64x64", "-frames:v", "1"]
                .iter()
                .map(|s| s.to_string()),
        );
        args.extend(["-c:v".to_string(), self.encoder().to_string()]);
        if self == Self::Vaapi {
            args.extend(["-vf".to_string(), "format=nv12,hwupload".to_string()]);
        }
        args.extend(["-f".to_string(), "null".to_string(), "-".to_string()]);
        args
    }
}

impl fmt::Display for EncoderProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.encoder())
    }
}

/// Resolve the configured preference into a concrete profile.
///
/// Explicit choices are taken as-is; only `Auto` spawns ffmpeg.
pub async fn resolve_profile(accel: HwAccel, ffmpeg: Option<&Path>) -> EncoderProfile {
    let profile = match accel {
        HwAccel::None => EncoderProfile::Software,
        HwAccel::Videotoolbox => EncoderProfile::Videotoolbox,
        HwAccel::Nvenc => EncoderProfile::Nvenc,
        HwAccel::Vaapi => EncoderProfile::Vaapi,
        HwAccel::Qsv => EncoderProfile::Qsv,
        HwAccel::Auto => match ffmpeg {
            Some(path) => detect(path).await,
            None => EncoderProfile::Software,
        },
    };
    tracing::info!(?accel, encoder = %profile, "Selected video encoder");
    profile
}

async fn detect(ffmpeg: &Path) -> EncoderProfile {
    let output = ToolCommand::new(ffmpeg.to_path_buf())
        .args(["-hide_banner", "-encoders"])
        .timeout(Duration::from_secs(10))
        .execute()
        .await;

    let listed = match output {
        Ok(out) => EncoderProfile::listed_hardware(&out.stdout),
        Err(e) => {
            tracing::warn!(error = %e, "Encoder detection failed, using software encoding");
            return EncoderProfile::Software;
        }
    };

    for candidate in listed {
        match trial_encode(ffmpeg, candidate).await {
            Ok(()) => return candidate,
            Err(e) => {
                tracing::debug!(encoder = %candidate, error = %e, "Hardware encoder unusable on this host")
            }
        }
    }
    EncoderProfile::Software
}

async fn trial_encode(ffmpeg: &Path, profile: EncoderProfile) -> mediagate_common::Result<()> {
    ToolCommand::new(ffmpeg.to_path_buf())
        .args(profile.trial_args())
        .timeout(Duration::from_secs(15))
        .execute()
        .await
        .map(|_| ())
}
