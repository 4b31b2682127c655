//! Container classification.
//!
//! The gateway only needs to know two things about a container: which MIME
//! type to advertise and whether a browser can demux it natively. Anything
//! it cannot demux goes through the transcoder.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::paths::extension_of;

/// Container formats the gateway distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Container {
    Mp4,
    M4v,
    Mov,
    Webm,
    Mkv,
    Avi,
    Wmv,
    Flv,
    Other,
}

impl Container {
    /// Classify by extension.
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "mp4" => Self::Mp4,
            "m4v" => Self::M4v,
            "mov" => Self::Mov,
            "webm" => Self::Webm,
            "mkv" => Self::Mkv,
            "avi" => Self::Avi,
            "wmv" => Self::Wmv,
            "flv" => Self::Flv,
            _ => Self::Other,
        }
    }

    /// Classify a local or remote file name by its extension.
    pub fn from_name(name: &str) -> Self {
        extension_of(name)
            .map(|ext| Self::from_extension(&ext))
            .unwrap_or(Self::Other)
    }

    /// Whether browsers cannot parse this container and it must be re-encoded.
    pub fn needs_transcode(self) -> bool {
        matches!(self, Self::Mkv | Self::Avi | Self::Wmv | Self::Flv)
    }

    /// MIME type advertised for range responses.
    pub fn content_type(self) -> &'static str {
        match self {
            Self::Mp4 | Self::M4v => "video/mp4",
            Self::Mov => "video/quicktime",
            Self::Webm => "video/webm",
            Self::Mkv => "video/x-matroska",
            Self::Avi => "video/x-msvideo",
            Self::Wmv => "video/x-ms-wmv",
            Self::Flv => "video/x-flv",
            Self::Other => "application/octet-stream",
        }
    }
}

impl fmt::Display for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Mp4 => "mp4",
            Self::M4v => "m4v",
            Self::Mov => "mov",
            Self::Webm => "webm",
            Self::Mkv => "mkv",
            Self::Avi => "avi",
            Self::Wmv => "wmv",
            Self::Flv => "flv",
            Self::Other => "other",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matroska_needs_transcode() {
        assert!(Container::from_name("/films/Alien.mkv").needs_transcode());
        assert!(Container::from_name("old.AVI").needs_transcode());
    }

    #[test]
    fn browser_containers_play_directly() {
        for name in ["a.mp4", "a.m4v", "a.webm", "a.mov"] {
            assert!(!Container::from_name(name).needs_transcode(), "{name}");
        }
    }

    #[test]
    fn content_types() {
        assert_eq!(Container::from_name("x.mp4").content_type(), "video/mp4");
        assert_eq!(Container::from_name("x.mkv").content_type(), "video/x-matroska");
        assert_eq!(Container::from_name("x").content_type(), "application/octet-stream");
    }

    #[test]
    fn serde_lowercase() {
        let json = serde_json::to_string(&Container::Webm).unwrap();
        assert_eq!(json, "\"webm\"");
        assert_eq!(Container::Mkv.to_string(), "mkv");
    }
}
