//! In-memory FTP server used by tests of the channel and the gateway.

use std::collections::{BTreeMap, BTreeSet};
use std::io::{Cursor, Read};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use mediagate_common::{Error, Result};
use parking_lot::RwLock;

use crate::config::RemoteSourceConfig;
use crate::session::{Connector, FtpSession, RemoteEntry};

#[derive(Default)]
struct State {
    files: BTreeMap<String, Vec<u8>>,
    dirs: BTreeSet<String>,
    /// Listings of these paths sleep for the given duration first.
    slow: BTreeMap<String, Duration>,
    /// Listings of these paths fail with the given server reply.
    broken: BTreeMap<String, String>,
    /// Transfers of these paths deliver this many bytes, then every read
    /// waits out the given read timeout.
    stalled: BTreeMap<String, (usize, Duration)>,
}

/// A fake FTP server holding a file tree in memory.
///
/// Cloning shares the tree and the counters.
#[derive(Clone, Default)]
pub struct MemoryConnector {
    state: Arc<RwLock<State>>,
    attempts: Arc<AtomicUsize>,
    refuse: Arc<AtomicBool>,
    /// Bumped to invalidate every session opened before.
    generation: Arc<AtomicUsize>,
    /// Transfer readers not yet dropped.
    open_transfers: Arc<AtomicUsize>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file; parent directories are created implicitly.
    pub fn add_file(&self, path: &str, contents: impl Into<Vec<u8>>) -> &Self {
        let mut state = self.state.write();
        let mut dir = parent_of(path);
        while dir != "/" {
            state.dirs.insert(dir.clone());
            dir = parent_of(&dir);
        }
        state.files.insert(path.to_string(), contents.into());
        self
    }

    pub fn add_dir(&self, path: &str) -> &Self {
        self.state.write().dirs.insert(path.trim_end_matches('/').to_string());
        self
    }

    /// Make listings of `path` stall.
    pub fn slow_listing(&self, path: &str, delay: Duration) -> &Self {
        self.state.write().slow.insert(path.to_string(), delay);
        self
    }

    /// Make listings of `path` fail with a transient server reply such as
    /// `450 Requested file action not taken`.
    pub fn fail_listing(&self, path: &str, reply: &str) -> &Self {
        self.state.write().broken.insert(path.to_string(), reply.to_string());
        self
    }

    /// Make transfers of `path` stop after `after` bytes, each further read
    /// timing out after `read_timeout` like a socket with `SO_RCVTIMEO`.
    pub fn stall_transfer(&self, path: &str, after: usize, read_timeout: Duration) -> &Self {
        self.state.write().stalled.insert(path.to_string(), (after, read_timeout));
        self
    }

    /// Transfer readers handed out and not yet dropped.
    pub fn open_transfers(&self) -> usize {
        self.open_transfers.load(Ordering::SeqCst)
    }

    /// Refuse (or accept again) new connections.
    pub fn set_refuse(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }

    /// Kill every open control session, as a server restart would.
    pub fn drop_sessions(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Number of connection attempts so far, successful or not.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl Connector for MemoryConnector {
    fn connect(&self, config: &RemoteSourceConfig) -> Result<Box<dyn FtpSession>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.refuse.load(Ordering::SeqCst) {
            return Err(Error::Connection(format!("{}: connection refused", config.address())));
        }
        Ok(Box::new(MemorySession {
            server: self.clone(),
            generation: self.generation.load(Ordering::SeqCst),
        }))
    }
}

struct MemorySession {
    server: MemoryConnector,
    generation: usize,
}

impl MemorySession {
    fn check_alive(&self) -> Result<()> {
        if self.generation != self.server.generation.load(Ordering::SeqCst) {
            return Err(Error::Connection("421 connection closed".into()));
        }
        Ok(())
    }
}

impl FtpSession for MemorySession {
    fn list(&mut self, path: &str) -> Result<Vec<RemoteEntry>> {
        self.check_alive()?;
        let delay = self.server.state.read().slow.get(path).copied();
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        if let Some(reply) = self.server.state.read().broken.get(path) {
            return Err(Error::Connection(reply.clone()));
        }

        let dir = path.trim_end_matches('/');
        let dir = if dir.is_empty() { "/" } else { dir };
        let state = self.server.state.read();
        if dir != "/" && !state.dirs.contains(dir) {
            return Err(Error::not_found("remote file", path));
        }

        let mut entries: Vec<RemoteEntry> = state
            .dirs
            .iter()
            .filter(|d| parent_of(d) == dir)
            .map(|d| RemoteEntry { name: name_of(d), is_dir: true, size: 0 })
            .collect();
        entries.extend(
            state
                .files
                .iter()
                .filter(|(f, _)| parent_of(f) == dir)
                .map(|(f, data)| RemoteEntry { name: name_of(f), is_dir: false, size: data.len() as u64 }),
        );
        Ok(entries)
    }

    fn size(&mut self, path: &str) -> Result<u64> {
        self.check_alive()?;
        self.server
            .state
            .read()
            .files
            .get(path)
            .map(|data| data.len() as u64)
            .ok_or_else(|| Error::not_found("remote file", path))
    }

    fn ping(&mut self) -> Result<()> {
        self.check_alive()
    }

    fn open_read(self: Box<Self>, path: &str, offset: u64) -> Result<Box<dyn Read + Send>> {
        self.check_alive()?;
        let state = self.server.state.read();
        let data = state
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| Error::not_found("remote file", path))?;
        let (limit, read_timeout) = match state.stalled.get(path) {
            Some(&(after, timeout)) => (after as u64, Some(timeout)),
            None => (u64::MAX, None),
        };
        let mut cursor = Cursor::new(data);
        cursor.set_position(offset);

        self.server.open_transfers.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryTransfer {
            cursor,
            limit,
            read_timeout,
            open: self.server.open_transfers.clone(),
        }))
    }

    fn quit(self: Box<Self>) {}
}

struct MemoryTransfer {
    cursor: Cursor<Vec<u8>>,
    /// Absolute position after which the transfer stalls.
    limit: u64,
    read_timeout: Option<Duration>,
    open: Arc<AtomicUsize>,
}

impl Read for MemoryTransfer {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let remaining = self.limit.saturating_sub(self.cursor.position());
        if remaining == 0 {
            if let Some(timeout) = self.read_timeout {
                std::thread::sleep(timeout);
                return Err(std::io::Error::new(std::io::ErrorKind::WouldBlock, "read timed out"));
            }
        }
        let n = buf.len().min(usize::try_from(remaining).unwrap_or(usize::MAX));
        self.cursor.read(&mut buf[..n])
    }
}

impl Drop for MemoryTransfer {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
    }
}

fn parent_of(path: &str) -> String {
    match path.trim_end_matches('/').rsplit_once('/') {
        Some(("", _)) | None => "/".to_string(),
        Some((parent, _)) => parent.to_string(),
    }
}

fn name_of(path: &str) -> String {
    path.rsplit('/').next().unwrap_or(path).to_string()
}
