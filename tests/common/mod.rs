//! Shared test harness for integration tests.
//!
//! [`TestServer`] builds a full [`AppContext`] around an in-memory FTP
//! connector and shell-script stand-ins for ffmpeg and ffprobe, then starts
//! Axum on a random port for HTTP-level testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use mediagate::config::Config;
use mediagate::server::{create_router, AppContext};
use mediagate_av::{HwAccel, ToolRegistry};
use mediagate_remote::memory::MemoryConnector;
use mediagate_remote::{RemoteSourceConfig, TrustPolicy};
use tempfile::TempDir;

/// Subtitle track every fake extraction returns.
pub const FAKE_SRT: &str = "1\n00:00:05,000 --> 00:00:07,500\nHello there\n\n2\n00:01:00,000 --> 00:01:02,000\nGeneral Kenobi\n";

/// Default fake engine. Extractions print [`FAKE_SRT`] and count themselves
/// in `extractions.log`. Transcodes write a marker every 100ms until killed.
const DEFAULT_ENGINE: &str = r#"#!/bin/sh
DIR=$(dirname "$0")
echo "$@" >> "$DIR/ffmpeg-args.log"
case "$*" in
  "-version")
    echo "ffmpeg version 6.1-fake"
    ;;
  *"-f srt"*)
    echo x >> "$DIR/extractions.log"
    cat "$DIR/fake.srt"
    ;;
  *)
    while :; do
      printf 'FAKEMP4'
      sleep 0.1
    done
    ;;
esac
"#;

const FAKE_PROBE: &str = r#"#!/bin/sh
cat <<'JSON'
{"format":{"format_name":"matroska,webm","duration":"125.5","size":"1048576","bit_rate":"800000"},
 "streams":[
  {"index":0,"codec_type":"video","codec_name":"h264","width":1920,"height":1080,"avg_frame_rate":"24000/1001"},
  {"index":1,"codec_type":"audio","codec_name":"aac","channels":2,"tags":{"language":"eng"},"disposition":{"default":1}},
  {"index":2,"codec_type":"subtitle","codec_name":"subrip","tags":{"language":"fra"}}
 ]}
JSON
"#;

/// Builder for a [`TestServer`].
pub struct TestServerBuilder {
    dir: TempDir,
    config: Config,
    connector: MemoryConnector,
    /// `None` leaves ffmpeg unresolvable.
    engine: Option<String>,
    persist: bool,
}

impl TestServerBuilder {
    /// Replace the fake ffmpeg script.
    pub fn engine(mut self, script: &str) -> Self {
        self.engine = Some(script.to_string());
        self
    }

    /// Point ffmpeg at a path that does not exist.
    pub fn missing_engine(mut self) -> Self {
        self.engine = None;
        self
    }

    /// Register a plain remote source backed by the in-memory connector.
    pub fn source(mut self, id: &str) -> Self {
        self.config.remote_sources.push(RemoteSourceConfig {
            id: id.to_string(),
            host: "nas.local".to_string(),
            port: 21,
            username: "bob".to_string(),
            password: "secret".to_string(),
            secure: false,
            trust: TrustPolicy::Verify,
            root_path: "/".to_string(),
        });
        self
    }

    /// Write the config to `mediagate.toml` so source changes are persisted.
    pub fn persisted(mut self) -> Self {
        self.persist = true;
        self
    }

    pub fn configure(mut self, f: impl FnOnce(&mut Config)) -> Self {
        f(&mut self.config);
        self
    }

    pub async fn start(self) -> TestServer {
        let dir = self.dir;
        let ffmpeg = match self.engine {
            Some(ref script) => write_script(dir.path(), "ffmpeg", script),
            None => dir.path().join("missing").join("ffmpeg"),
        };
        let ffprobe = write_script(dir.path(), "ffprobe", FAKE_PROBE);
        std::fs::write(dir.path().join("fake.srt"), FAKE_SRT).expect("failed to write fake.srt");

        let config_path = if self.persist {
            let path = dir.path().join("mediagate.toml");
            let text = toml::to_string(&self.config).expect("failed to serialize config");
            std::fs::write(&path, text).expect("failed to write config");
            Some(path)
        } else {
            None
        };

        let ctx = AppContext::with_parts(
            self.config,
            config_path.clone(),
            ToolRegistry::with_paths(ffmpeg, ffprobe),
            Arc::new(self.connector.clone()),
        )
        .await;
        let app = create_router(ctx.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind random port");
        let addr = listener.local_addr().expect("failed to get local addr");

        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        TestServer {
            ctx,
            addr,
            connector: self.connector,
            client: reqwest::Client::new(),
            config_path,
            dir,
        }
    }
}

/// A running gateway bound to a random local port.
pub struct TestServer {
    pub ctx: AppContext,
    pub addr: SocketAddr,
    pub connector: MemoryConnector,
    pub client: reqwest::Client,
    pub config_path: Option<PathBuf>,
    dir: TempDir,
}

impl TestServer {
    pub fn builder() -> TestServerBuilder {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let mut config = Config::default();
        config.transcode.hw_accel = HwAccel::None;
        config.transcode.grace_period_ms = 500;
        config.subtitles.cache_dir = Some(dir.path().join("subtitle-cache"));
        config.remote.list_timeout_secs = 2;

        TestServerBuilder {
            dir,
            config,
            connector: MemoryConnector::new(),
            engine: Some(DEFAULT_ENGINE.to_string()),
            persist: false,
        }
    }

    pub async fn start() -> Self {
        Self::builder().start().await
    }

    pub fn url(&self, path_and_query: &str) -> String {
        format!("http://{}{}", self.addr, path_and_query)
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Write a file into the temp dir and return its absolute path.
    pub fn local_file(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, contents).expect("failed to write local file");
        path
    }

    pub async fn get(&self, path_and_query: &str) -> reqwest::Response {
        self.client
            .get(self.url(path_and_query))
            .send()
            .await
            .expect("request failed")
    }

    /// GET with percent-encoded query parameters.
    pub async fn get_query(&self, path: &str, query: &[(&str, &str)]) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .query(query)
            .send()
            .await
            .expect("request failed")
    }

    /// Number of subtitle extractions the fake engine has run.
    pub fn extraction_count(&self) -> usize {
        std::fs::read_to_string(self.dir.path().join("extractions.log"))
            .map(|s| s.lines().count())
            .unwrap_or(0)
    }

    /// Every command line the fake engine was started with.
    pub fn engine_invocations(&self) -> Vec<String> {
        std::fs::read_to_string(self.dir.path().join("ffmpeg-args.log"))
            .map(|s| s.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Poll until the transcoder has no live sessions.
    pub async fn wait_for_no_sessions(&self, limit: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + limit;
        while tokio::time::Instant::now() < deadline {
            if self.ctx.transcoder.active_count() == 0 {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        self.ctx.transcoder.active_count() == 0
    }
}

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, body).expect("failed to write script");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .expect("failed to chmod script");
    path
}
