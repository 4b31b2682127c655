//! Application context shared by all handlers.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use mediagate_av::{
    resolve_profile, EncoderProfile, InputLocator, MediaProber, ToolRegistry, TranscodeSupervisor,
};
use mediagate_common::Result;
use mediagate_remote::{Connector, RemoteChannel, SuppaConnector};

use crate::config::Config;
use crate::streaming::is_local_file;
use crate::subtitles::{SubtitleCache, SubtitleProvider};

/// The long-lived gateway state.
///
/// Built once at startup; [`AppContext::shutdown`] tears down everything it
/// owns. Cloning is cheap and shares the registries.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    /// Path to config file (for persistence)
    pub config_path: Option<PathBuf>,
    pub tools: Arc<ToolRegistry>,
    pub prober: MediaProber,
    /// Encoder chosen at startup from `[transcode] hw_accel`.
    pub encoder: EncoderProfile,
    pub transcoder: TranscodeSupervisor,
    pub remote: Arc<RemoteChannel>,
    pub subtitle_cache: Arc<SubtitleCache>,
    pub subtitle_provider: Arc<SubtitleProvider>,
    /// Serializes config file rewrites.
    pub persist_lock: Arc<tokio::sync::Mutex<()>>,
}

impl AppContext {
    /// Production context: tools from `PATH` or config, real FTP connector.
    pub async fn new(config: Config, config_path: Option<PathBuf>) -> Self {
        let tools = ToolRegistry::discover(&config.tools);
        let connector = Arc::new(SuppaConnector::new(config.remote.connect_timeout()));
        Self::with_parts(config, config_path, tools, connector).await
    }

    /// Context with explicit tools and remote connector.
    pub async fn with_parts(
        config: Config,
        config_path: Option<PathBuf>,
        tools: ToolRegistry,
        connector: Arc<dyn Connector>,
    ) -> Self {
        // A missing tool surfaces when a request needs it: spawning the bare
        // name fails with a setup error.
        let ffmpeg = tool_path(tools.ffmpeg().ok(), "ffmpeg");
        let ffprobe = tool_path(tools.ffprobe().ok(), "ffprobe");

        let encoder = resolve_profile(config.transcode.hw_accel, tools.ffmpeg().ok()).await;

        let remote = RemoteChannel::new(connector, config.remote.clone());
        for source in &config.remote_sources {
            remote.register(source.clone());
        }

        let subtitle_cache = SubtitleCache::new(config.subtitles.resolved_cache_dir());
        let subtitle_provider = SubtitleProvider::new(config.subtitles.provider.clone());

        Self {
            prober: MediaProber::new(ffprobe),
            transcoder: TranscodeSupervisor::new(ffmpeg, config.transcode.clone()),
            encoder,
            tools: Arc::new(tools),
            remote: Arc::new(remote),
            subtitle_cache: Arc::new(subtitle_cache),
            subtitle_provider: Arc::new(subtitle_provider),
            config: Arc::new(config),
            config_path,
            persist_lock: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    /// Locate `file` for the engine.
    ///
    /// Local files are passed by path. Plain remote sources are handed to
    /// the engine as an `ftp://` URL; secure ones are streamed into its
    /// stdin since ffmpeg cannot speak FTPS.
    pub async fn resolve_input(&self, file: &str, source_id: Option<&str>) -> Result<InputLocator> {
        if source_id.is_none() && is_local_file(file).await {
            return Ok(InputLocator::Local(PathBuf::from(file)));
        }

        let source = self.remote.resolve(source_id)?;
        if source.secure {
            let stream = self.remote.open_range_stream(Some(&source.id), file, 0).await?;
            Ok(InputLocator::Pipe(stream))
        } else {
            Ok(InputLocator::Url(source.locator_url(file)?))
        }
    }

    /// Terminate every transcode session, purge the subtitle cache and
    /// close remote control connections.
    pub async fn shutdown(&self) {
        let terminated = self.transcoder.terminate_all().await;
        let purged = self.subtitle_cache.cleanup().await;
        self.remote.disconnect_all().await;
        tracing::info!(terminated, purged, "Gateway state torn down");
    }
}

fn tool_path(resolved: Option<&Path>, name: &str) -> PathBuf {
    resolved.map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from(name))
}
