//! Mediagate-AV: ffmpeg and ffprobe integration.
//!
//! - [`ToolRegistry`] resolves the binaries once at startup.
//! - [`ToolCommand`] runs short-lived invocations with a timeout, optionally
//!   feeding stdin from a [`mediagate_common::ByteStream`].
//! - [`MediaProber`] maps ffprobe JSON into [`MediaInfo`].
//! - [`extract_subtitle`] pulls an embedded caption track out as SubRip.
//! - [`transcode::TranscodeSupervisor`] owns live fragmented-MP4 encodes.

pub mod command;
pub mod encoder;
pub mod input;
pub mod probe;
pub mod subtitle;
pub mod tools;
pub mod transcode;

pub use command::{ToolCommand, ToolOutput};
pub use encoder::{resolve_profile, EncoderProfile, HwAccel};
pub use input::InputLocator;
pub use probe::{AudioTrack, MediaInfo, MediaProber, SubtitleTrack, VideoTrack};
pub use subtitle::extract_subtitle;
pub use tools::{ToolInfo, ToolRegistry, ToolsConfig};
pub use transcode::{
    SessionHandle, SessionInfo, SessionState, TranscodeConfig, TranscodeOutput, TranscodeRequest,
    TranscodeSupervisor,
};
