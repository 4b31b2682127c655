//! External tool detection.
//!
//! The [`ToolRegistry`] resolves ffmpeg and ffprobe once at startup, either
//! from configured paths or from `PATH`, and hands out their locations.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use mediagate_common::{Error, Result};
use serde::{Deserialize, Serialize};

/// Tools the gateway shells out to.
const KNOWN_TOOLS: &[&str] = &["ffmpeg", "ffprobe"];

/// `[tools]` configuration section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Explicit ffmpeg binary; `PATH` is searched when unset or missing.
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,
    /// Explicit ffprobe binary.
    #[serde(default)]
    pub ffprobe_path: Option<PathBuf>,
}

/// Availability information for a tool, returned by [`ToolRegistry::check_all`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub available: bool,
    /// First line of `-version` output.
    pub version: Option<String>,
    pub path: Option<PathBuf>,
}

/// Registry holding resolved tool locations.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, PathBuf>,
}

impl ToolRegistry {
    /// Resolve every known tool.
    ///
    /// A configured path is used when it exists. Otherwise [`which::which`]
    /// searches `PATH`. Tools that are not found are left out and reported
    /// by [`ToolRegistry::require`] when first needed.
    pub fn discover(config: &ToolsConfig) -> Self {
        let mut tools = HashMap::new();

        for &name in KNOWN_TOOLS {
            let configured = match name {
                "ffmpeg" => config.ffmpeg_path.as_deref(),
                "ffprobe" => config.ffprobe_path.as_deref(),
                _ => None,
            };

            let resolved = match configured {
                Some(p) if p.exists() => Some(p.to_path_buf()),
                Some(p) => {
                    tracing::warn!(tool = name, path = %p.display(), "Configured tool path does not exist, searching PATH");
                    which::which(name).ok()
                }
                None => which::which(name).ok(),
            };

            match resolved {
                Some(path) => {
                    tracing::debug!(tool = name, path = %path.display(), "Resolved tool");
                    tools.insert(name.to_string(), path);
                }
                None => tracing::warn!(tool = name, "Tool not found"),
            }
        }

        Self { tools }
    }

    /// Build a registry from explicit paths, skipping discovery.
    pub fn with_paths(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        let mut tools = HashMap::new();
        tools.insert("ffmpeg".to_string(), ffmpeg.into());
        tools.insert("ffprobe".to_string(), ffprobe.into());
        Self { tools }
    }

    /// Location of the named tool, or [`Error::Tool`] if it was not found.
    pub fn require(&self, name: &str) -> Result<&Path> {
        self.tools
            .get(name)
            .map(PathBuf::as_path)
            .ok_or_else(|| Error::tool(name, format!("{name} not found; is it installed and in PATH?")))
    }

    pub fn ffmpeg(&self) -> Result<&Path> {
        self.require("ffmpeg")
    }

    pub fn ffprobe(&self) -> Result<&Path> {
        self.require("ffprobe")
    }

    /// Check all known tools, running each one to read its version.
    ///
    /// This spawns processes synchronously; call it off the async runtime.
    pub fn check_all(&self) -> Vec<ToolInfo> {
        KNOWN_TOOLS
            .iter()
            .map(|&name| match self.tools.get(name) {
                Some(path) => ToolInfo {
                    name: name.to_string(),
                    available: true,
                    version: detect_version(path),
                    path: Some(path.clone()),
                },
                None => ToolInfo {
                    name: name.to_string(),
                    available: false,
                    version: None,
                    path: None,
                },
            })
            .collect()
    }
}

/// Run `<tool> -version` and return the first line of stdout.
fn detect_version(path: &Path) -> Option<String> {
    let output = std::process::Command::new(path).arg("-version").output().ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .map(|s| s.to_string())
}
