//! The remote source registry and its control connections.
//!
//! Each source owns at most one control session, guarded by an async mutex
//! so that listings and size queries for one source are serialized while
//! other sources proceed independently. Byte transfers never touch the
//! control session: every ranged read opens a dedicated connection and
//! closes it when the consumer drops the stream.
//!
//! All FTP work is blocking and runs on the blocking pool.

use std::io::{self, Read};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use dashmap::DashMap;
use mediagate_common::paths::{is_video_name, join_remote};
use mediagate_common::{ByteStream, Error, Result};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::{mpsc, Mutex};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

use crate::config::{RemoteConfig, RemoteSourceConfig};
use crate::session::{Connector, FtpSession, RemoteEntry};

/// Chunk size for ranged reads.
const READ_CHUNK: usize = 64 * 1024;

/// Chunks buffered between the blocking reader and the HTTP body.
const READ_AHEAD: usize = 8;

/// A playable file discovered on a remote source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteMedia {
    pub name: String,
    pub path: String,
    pub size: u64,
    pub origin: &'static str,
    pub source_id: String,
}

#[derive(Default)]
struct ControlSlot {
    session: Option<Box<dyn FtpSession>>,
    /// Set once a session was ever established, so later failures are
    /// reported as reconnection failures.
    established: bool,
}

type Slot = Arc<Mutex<ControlSlot>>;

/// Registry of remote sources plus their control sessions.
pub struct RemoteChannel {
    sources: RwLock<Vec<RemoteSourceConfig>>,
    slots: DashMap<String, Slot>,
    connector: Arc<dyn Connector>,
    settings: RemoteConfig,
}

impl RemoteChannel {
    pub fn new(connector: Arc<dyn Connector>, settings: RemoteConfig) -> Self {
        Self {
            sources: RwLock::new(Vec::new()),
            slots: DashMap::new(),
            connector,
            settings,
        }
    }

    /// Add or replace a source without connecting. The control session is
    /// opened lazily on first use.
    pub fn register(&self, config: RemoteSourceConfig) {
        let mut sources = self.sources.write();
        match sources.iter_mut().find(|s| s.id == config.id) {
            Some(existing) => *existing = config,
            None => sources.push(config),
        }
    }

    /// Connect and log in to a source, then register it. Any previous
    /// session for the same id is closed.
    pub async fn connect(&self, config: RemoteSourceConfig) -> Result<()> {
        config.validate()?;

        let connector = self.connector.clone();
        let cfg = config.clone();
        let session = run_blocking(move || connector.connect(&cfg)).await?;

        self.register(config.clone());
        let slot = self.slot(&config.id);
        let previous = {
            let mut guard = slot.lock().await;
            guard.established = true;
            guard.session.replace(session)
        };
        if let Some(previous) = previous {
            tokio::task::spawn_blocking(move || previous.quit());
        }

        info!(source = %config.id, address = %config.address(), secure = config.secure, "Remote source connected");
        Ok(())
    }

    /// Close the control session of a source. The source stays registered.
    pub async fn disconnect(&self, source_id: &str) {
        let Some(slot) = self.slots.get(source_id).map(|s| s.clone()) else {
            return;
        };
        let session = slot.lock().await.session.take();
        if let Some(session) = session {
            tokio::task::spawn_blocking(move || session.quit());
            info!(source = %source_id, "Remote source disconnected");
        }
    }

    /// Close every control session.
    pub async fn disconnect_all(&self) {
        let ids: Vec<String> = self.slots.iter().map(|e| e.key().clone()).collect();
        for id in ids {
            self.disconnect(&id).await;
        }
    }

    /// Unregister a source and close its session. Returns whether it existed.
    pub async fn remove(&self, source_id: &str) -> bool {
        let existed = {
            let mut sources = self.sources.write();
            let before = sources.len();
            sources.retain(|s| s.id != source_id);
            sources.len() != before
        };
        self.disconnect(source_id).await;
        self.slots.remove(source_id);
        existed
    }

    /// Registered sources in registration order.
    pub fn sources(&self) -> Vec<RemoteSourceConfig> {
        self.sources.read().clone()
    }

    pub fn has_sources(&self) -> bool {
        !self.sources.read().is_empty()
    }

    /// Whether a control session is currently held for `source_id`.
    /// A slot busy with an operation counts as connected.
    pub fn is_connected(&self, source_id: &str) -> bool {
        match self.slots.get(source_id) {
            Some(slot) => slot.try_lock().map(|g| g.session.is_some()).unwrap_or(true),
            None => false,
        }
    }

    /// Pick the source a request refers to.
    ///
    /// With no sources this is a configuration error, raised before any
    /// network activity. An unknown id falls back to the first registered
    /// source.
    pub fn resolve(&self, source_id: Option<&str>) -> Result<RemoteSourceConfig> {
        let sources = self.sources.read();
        let Some(first) = sources.first() else {
            return Err(Error::configuration(
                "No remote sources are configured. Add an FTP source under [[remote_sources]] or POST /sources.",
            ));
        };
        match source_id {
            None => Ok(first.clone()),
            Some(id) => match sources.iter().find(|s| s.id == id) {
                Some(source) => Ok(source.clone()),
                None => {
                    warn!(requested = %id, fallback = %first.id, "Unknown remote source, using the first configured one");
                    Ok(first.clone())
                }
            },
        }
    }

    /// Recursively list playable files below `root` (the source's root path
    /// by default).
    ///
    /// Each directory listing is bounded by the configured timeout. A
    /// directory that times out or fails to list contributes nothing and the
    /// walk goes on. When the control connection cannot be (re)established
    /// the failure is logged and the result is empty.
    pub async fn list_media(&self, source_id: Option<&str>, root: Option<&str>) -> Result<Vec<RemoteMedia>> {
        let config = self.resolve(source_id)?;
        let root = root.map(str::to_string).unwrap_or_else(|| config.root_path.clone());
        let timeout = self.settings.list_timeout();
        let max_depth = self.settings.max_scan_depth;

        let mut pending = vec![(root, 0usize)];
        let mut media = Vec::new();

        while let Some((dir, depth)) = pending.pop() {
            let path = dir.clone();
            let entries: Vec<RemoteEntry> = match self
                .with_control(&config, timeout, move |s| s.list(&path))
                .await
            {
                Ok(ControlOutcome::Completed(Ok(entries))) => entries,
                Ok(ControlOutcome::Completed(Err(e))) => {
                    warn!(source = %config.id, dir = %dir, error = %e, "Skipping unreadable directory");
                    continue;
                }
                Ok(ControlOutcome::TimedOut) => {
                    warn!(source = %config.id, dir = %dir, timeout_secs = timeout.as_secs(), "Directory listing timed out");
                    continue;
                }
                Err(e) => {
                    warn!(source = %config.id, error = %e, "Remote listing aborted");
                    return Ok(Vec::new());
                }
            };

            for entry in entries {
                let full = join_remote(&dir, &entry.name);
                if entry.is_dir {
                    if depth < max_depth {
                        pending.push((full, depth + 1));
                    } else {
                        debug!(dir = %full, max_depth, "Not descending past depth limit");
                    }
                } else if is_video_name(&entry.name) {
                    media.push(RemoteMedia {
                        name: entry.name,
                        path: full,
                        size: entry.size,
                        origin: "remote",
                        source_id: config.id.clone(),
                    });
                }
            }
        }

        media.sort_by(|a, b| a.path.cmp(&b.path));
        debug!(source = %config.id, count = media.len(), "Remote listing complete");
        Ok(media)
    }

    /// Size of a remote file in bytes.
    pub async fn size(&self, source_id: Option<&str>, path: &str) -> Result<u64> {
        let config = self.resolve(source_id)?;
        let timeout = self.settings.list_timeout();
        let p = path.to_string();
        match self.with_control(&config, timeout, move |s| s.size(&p)).await? {
            ControlOutcome::Completed(result) => result,
            ControlOutcome::TimedOut => Err(Error::Connection(format!(
                "SIZE {path} timed out after {}s",
                timeout.as_secs()
            ))),
        }
    }

    /// Stream a remote file from byte `start` over a dedicated connection.
    ///
    /// The stream yields until the server closes the data connection; the
    /// caller truncates it to the requested range. Dropping the stream
    /// closes the connection after at most one more chunk is read.
    pub async fn open_range_stream(&self, source_id: Option<&str>, path: &str, start: u64) -> Result<ByteStream> {
        let config = self.resolve(source_id)?;
        let connector = self.connector.clone();
        let p = path.to_string();
        let reader = run_blocking(move || {
            let session = connector.connect(&config)?;
            session.open_read(&p, start)
        })
        .await?;

        let (tx, rx) = mpsc::channel(READ_AHEAD);
        let path = path.to_string();
        tokio::task::spawn_blocking(move || pump(reader, tx, &path));
        Ok(Box::pin(ReceiverStream::new(rx)))
    }

    fn slot(&self, source_id: &str) -> Slot {
        self.slots.entry(source_id.to_string()).or_default().clone()
    }

    /// Run `op` on the control session of `config`, (re)connecting first if
    /// the session is missing or fails its liveness check.
    ///
    /// The outer error is reserved for failing to establish the session.
    /// A failure of `op` itself comes back inside
    /// [`ControlOutcome::Completed`]; unless it is a plain not-found reply
    /// the session is discarded so the next call starts on a fresh one.
    /// When `op` exceeds `limit` the session is abandoned to the blocking
    /// pool and the slot stays empty.
    async fn with_control<T, F>(&self, config: &RemoteSourceConfig, limit: Duration, op: F) -> Result<ControlOutcome<T>>
    where
        T: Send + 'static,
        F: FnOnce(&mut dyn FtpSession) -> Result<T> + Send + 'static,
    {
        let slot = self.slot(&config.id);
        let mut guard = slot.lock().await;
        let existing = guard.session.take();
        let established = guard.established;
        let connector = self.connector.clone();
        let cfg = config.clone();

        let task = tokio::task::spawn_blocking(move || -> Result<(Box<dyn FtpSession>, Result<T>)> {
            let mut session = match existing {
                Some(mut session) => match session.ping() {
                    Ok(()) => session,
                    Err(e) => {
                        debug!(source = %cfg.id, error = %e, "Control session lost, reconnecting");
                        session.quit();
                        connector
                            .connect(&cfg)
                            .map_err(|e| Error::Reconnection(format!("{}: {e}", cfg.id)))?
                    }
                },
                None if established => connector
                    .connect(&cfg)
                    .map_err(|e| Error::Reconnection(format!("{}: {e}", cfg.id)))?,
                None => connector.connect(&cfg)?,
            };
            let result = op(session.as_mut());
            Ok((session, result))
        });

        match tokio::time::timeout(limit, task).await {
            Ok(Ok(Ok((session, result)))) => {
                guard.established = true;
                match &result {
                    Err(e) if !matches!(e, Error::NotFound { .. }) => {
                        debug!(source = %config.id, error = %e, "Discarding control session after failed command");
                        tokio::task::spawn_blocking(move || session.quit());
                    }
                    _ => guard.session = Some(session),
                }
                Ok(ControlOutcome::Completed(result))
            }
            Ok(Ok(Err(e))) => Err(e),
            Ok(Err(join)) => Err(Error::Internal(format!("remote task failed: {join}"))),
            Err(_) => Ok(ControlOutcome::TimedOut),
        }
    }
}

/// Result of one command on a control session that was established.
enum ControlOutcome<T> {
    Completed(Result<T>),
    TimedOut,
}

async fn run_blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::Internal(format!("remote task failed: {e}")))?
}

/// Copy a blocking reader into a bounded channel until EOF, error, or the
/// receiver going away.
///
/// The reader is expected to carry a read timeout. A timed-out read with
/// the receiver gone ends the transfer quietly; with the receiver still
/// waiting it is reported as a failed transfer.
fn pump(mut reader: Box<dyn Read + Send>, tx: mpsc::Sender<io::Result<Bytes>>, path: &str) {
    let mut buf = vec![0u8; READ_CHUNK];
    let mut total: u64 = 0;
    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                total += n as u64;
                if tx.blocking_send(Ok(Bytes::copy_from_slice(&buf[..n]))).is_err() {
                    debug!(path = %path, bytes = total, "Range consumer gone, closing transfer");
                    return;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) if is_timeout(&e) && tx.is_closed() => {
                debug!(path = %path, bytes = total, "Transfer stalled after consumer left, closing");
                return;
            }
            Err(e) => {
                warn!(path = %path, bytes = total, error = %e, "Remote transfer failed");
                let _ = tx.blocking_send(Err(e));
                return;
            }
        }
    }
    debug!(path = %path, bytes = total, "Remote transfer complete");
}

/// Socket read timeouts surface as `WouldBlock` on Unix and `TimedOut` on
/// Windows.
fn is_timeout(err: &io::Error) -> bool {
    matches!(err.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
}
