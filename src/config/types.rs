use mediagate_av::{ToolsConfig, TranscodeConfig};
use mediagate_remote::{RemoteConfig, RemoteSourceConfig};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub tools: ToolsConfig,

    #[serde(default)]
    pub transcode: TranscodeConfig,

    #[serde(default)]
    pub subtitles: SubtitlesConfig,

    #[serde(default)]
    pub remote: RemoteConfig,

    #[serde(default)]
    pub remote_sources: Vec<RemoteSourceConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SubtitlesConfig {
    /// Where extracted caption tracks are kept (default: a directory under
    /// the system temp dir). Purged on shutdown.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    #[serde(default)]
    pub provider: ProviderConfig,
}

impl SubtitlesConfig {
    pub fn resolved_cache_dir(&self) -> PathBuf {
        self.cache_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("mediagate-subtitles"))
    }
}

/// OpenSubtitles-compatible REST API.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderConfig {
    #[serde(default = "default_provider_base_url")]
    pub base_url: String,

    /// Sent as `Api-Key`. Search and download are refused without it.
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Prefix for `subtitle_id` downloads from the legacy site.
    #[serde(default = "default_legacy_download_base")]
    pub legacy_download_base: String,
}

fn default_provider_base_url() -> String {
    "https://api.opensubtitles.com/api/v1".to_string()
}

fn default_user_agent() -> String {
    format!("mediagate v{}", env!("CARGO_PKG_VERSION"))
}

fn default_legacy_download_base() -> String {
    "https://dl.opensubtitles.org/en/download/sub/".to_string()
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_provider_base_url(),
            api_key: None,
            user_agent: default_user_agent(),
            legacy_download_base: default_legacy_download_base(),
        }
    }
}
