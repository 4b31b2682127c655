//! Live transcoding to fragmented MP4.
//!
//! [`TranscodeSupervisor`] spawns one ffmpeg process per request and owns it
//! until exit. [`build_args`] is kept separate so the command line can be
//! tested without spawning anything.

mod args;
mod session;

pub use args::{build_args, TranscodeArgs};
pub use session::{
    SessionHandle, SessionInfo, SessionState, TranscodeOutput, TranscodeRequest,
    TranscodeSupervisor,
};

use serde::{Deserialize, Serialize};

use crate::encoder::HwAccel;

/// `[transcode]` configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscodeConfig {
    #[serde(default)]
    pub hw_accel: HwAccel,

    /// Video bitrate ceiling in kbit/s, shared by every encoder profile.
    #[serde(default = "default_video_bitrate")]
    pub video_bitrate: u32,

    /// AAC bitrate in kbit/s.
    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate: u32,

    #[serde(default = "default_audio_sample_rate")]
    pub audio_sample_rate: u32,

    /// How long a session gets to exit after SIGTERM before it is killed.
    #[serde(default = "default_grace_period_ms")]
    pub grace_period_ms: u64,
}

fn default_video_bitrate() -> u32 {
    4000
}

fn default_audio_bitrate() -> u32 {
    192
}

fn default_audio_sample_rate() -> u32 {
    48_000
}

fn default_grace_period_ms() -> u64 {
    2000
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            hw_accel: HwAccel::default(),
            video_bitrate: default_video_bitrate(),
            audio_bitrate: default_audio_bitrate(),
            audio_sample_rate: default_audio_sample_rate(),
            grace_period_ms: default_grace_period_ms(),
        }
    }
}
