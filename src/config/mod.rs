pub mod persist;
mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Find the first existing config file among the default locations.
pub fn find_default_config() -> Option<PathBuf> {
    let default_paths = [
        "./mediagate.toml",
        "~/.config/mediagate/config.toml",
        "/etc/mediagate/config.toml",
    ];

    default_paths
        .iter()
        .map(|p| PathBuf::from(shellexpand::tilde(p).as_ref()))
        .find(|p| p.exists())
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    match find_default_config() {
        Some(path) => load_config(&path),
        None => Ok(Config::default()),
    }
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    if config.server.port == 0 {
        anyhow::bail!("Server port cannot be 0");
    }

    let mut ids = HashSet::new();
    for source in &config.remote_sources {
        source
            .validate()
            .with_context(|| format!("Invalid remote source '{}'", source.id))?;
        if !ids.insert(source.id.as_str()) {
            anyhow::bail!("Duplicate remote source id '{}'", source.id);
        }
        if source.secure && source.trust == mediagate_remote::TrustPolicy::AcceptInvalid {
            tracing::warn!(source = %source.id, "Remote source accepts invalid TLS certificates");
        }
    }

    for (name, path) in [
        ("ffmpeg", &config.tools.ffmpeg_path),
        ("ffprobe", &config.tools.ffprobe_path),
    ] {
        if let Some(path) = path {
            if !path.exists() {
                tracing::warn!("Configured {} path does not exist: {:?}", name, path);
            }
        }
    }

    if config.subtitles.provider.api_key.is_none() {
        tracing::debug!("No subtitle provider API key configured, search and download are disabled");
    }

    if config.remote.max_scan_depth == 0 {
        tracing::warn!("remote.max_scan_depth is 0, listings will not descend into directories");
    }

    Ok(())
}
