//! Transcode session lifecycle.
//!
//! Each session is one ffmpeg child owned by a reaper task. The reaper waits
//! for either a natural exit or a stop request; on a stop request it sends
//! SIGTERM, waits out the grace period and then kills. Whatever the cause,
//! the reaper is the only place a session leaves the live set, so a
//! session can be stopped from any number of places without racing.

use std::io;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures::Stream;
use mediagate_common::{ByteStream, Error, Result};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio_util::io::{ReaderStream, StreamReader};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::args::{build_args, TranscodeArgs};
use super::TranscodeConfig;
use crate::encoder::EncoderProfile;
use crate::input::{redact_userinfo, InputLocator};

/// Read size for engine output.
const OUTPUT_CHUNK: usize = 64 * 1024;

/// What to transcode.
#[derive(Debug)]
pub struct TranscodeRequest {
    pub input: InputLocator,
    pub seek_secs: f64,
    pub audio_track: Option<u32>,
    pub profile: EncoderProfile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Running,
    Terminating,
    Exited,
}

/// Snapshot of a live session, for the admin API.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub id: Uuid,
    pub pid: Option<u32>,
    pub input: String,
    pub seek_secs: f64,
    pub audio_track: Option<u32>,
    pub encoder: EncoderProfile,
    pub state: SessionState,
    pub created_at: DateTime<Utc>,
}

/// Shared handle to one running engine process.
#[derive(Debug)]
pub struct SessionHandle {
    id: Uuid,
    pid: Option<u32>,
    input: String,
    seek_secs: f64,
    audio_track: Option<u32>,
    encoder: EncoderProfile,
    created_at: DateTime<Utc>,
    state: Mutex<SessionState>,
    stop: CancellationToken,
    exited: CancellationToken,
}

impl SessionHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// OS process id at spawn time.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    /// Ask the reaper to stop the process. Returns immediately.
    pub fn request_stop(&self) {
        self.stop.cancel();
    }

    /// Resolves once the process has been reaped.
    pub async fn wait_exited(&self) {
        self.exited.cancelled().await;
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            id: self.id,
            pid: self.pid,
            input: self.input.clone(),
            seek_secs: self.seek_secs,
            audio_track: self.audio_track,
            encoder: self.encoder,
            state: self.state(),
            created_at: self.created_at,
        }
    }

    fn set_state(&self, state: SessionState) {
        *self.state.lock() = state;
    }
}

/// Engine stdout as a byte stream.
///
/// The stream owns its session: dropping it (the HTTP body going away when
/// the client disconnects) stops the process without waiting for ffmpeg to
/// notice the closed pipe.
pub struct TranscodeOutput {
    inner: ReaderStream<ChildStdout>,
    handle: Arc<SessionHandle>,
}

impl Stream for TranscodeOutput {
    type Item = io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        Pin::new(&mut this.inner).poll_next(cx)
    }
}

impl Drop for TranscodeOutput {
    fn drop(&mut self) {
        if self.handle.state() == SessionState::Running {
            tracing::debug!(session_id = %self.handle.id, "Output dropped, stopping transcode session");
        }
        self.handle.request_stop();
    }
}

/// Spawns transcode sessions and tracks the live set.
#[derive(Debug, Clone)]
pub struct TranscodeSupervisor {
    ffmpeg: PathBuf,
    config: TranscodeConfig,
    sessions: Arc<DashMap<Uuid, Arc<SessionHandle>>>,
}

impl TranscodeSupervisor {
    pub fn new(ffmpeg: PathBuf, config: TranscodeConfig) -> Self {
        Self {
            ffmpeg,
            config,
            sessions: Arc::new(DashMap::new()),
        }
    }

    fn grace_period(&self) -> Duration {
        Duration::from_millis(self.config.grace_period_ms)
    }

    /// Spawn ffmpeg for `request` and register the session.
    ///
    /// Must be called from within a Tokio runtime. Fails with
    /// [`Error::TranscodeSetup`] when the process cannot be started, which
    /// is always before any response bytes exist.
    pub fn start(&self, request: TranscodeRequest) -> Result<(TranscodeOutput, Arc<SessionHandle>)> {
        let label = request.input.to_string();
        let (input, pipe) = request.input.take_pipe();
        let args = build_args(
            &TranscodeArgs {
                input,
                seek_secs: request.seek_secs,
                audio_track: request.audio_track,
                profile: request.profile,
            },
            &self.config,
        );
        tracing::debug!(
            args = ?args.iter().map(|a| redact_userinfo(a)).collect::<Vec<_>>(),
            "Spawning ffmpeg"
        );

        let mut child = Command::new(&self.ffmpeg)
            .args(&args)
            .stdin(if pipe.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                Error::TranscodeSetup(format!("failed to start {}: {e}", self.ffmpeg.display()))
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::TranscodeSetup("engine stdout was not captured".into()))?;

        let handle = Arc::new(SessionHandle {
            id: Uuid::new_v4(),
            pid: child.id(),
            input: label,
            seek_secs: request.seek_secs,
            audio_track: request.audio_track,
            encoder: request.profile,
            created_at: Utc::now(),
            state: Mutex::new(SessionState::Running),
            stop: CancellationToken::new(),
            exited: CancellationToken::new(),
        });
        self.sessions.insert(handle.id, handle.clone());

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(log_stderr(handle.id, stderr));
        }
        if let (Some(stream), Some(stdin)) = (pipe, child.stdin.take()) {
            tokio::spawn(pump_input(handle.clone(), stream, stdin));
        }
        tokio::spawn(reap(child, handle.clone(), self.sessions.clone(), self.grace_period()));

        tracing::info!(
            session_id = %handle.id,
            pid = ?handle.pid,
            input = %handle.input,
            seek_secs = request.seek_secs,
            audio_track = ?request.audio_track,
            encoder = %request.profile,
            "Started transcode session"
        );

        let output = TranscodeOutput {
            inner: ReaderStream::with_capacity(stdout, OUTPUT_CHUNK),
            handle: handle.clone(),
        };
        Ok((output, handle))
    }

    /// Stop a session and wait until its process is gone.
    ///
    /// Terminating an exited session is a no-op.
    pub async fn terminate(&self, handle: &SessionHandle) {
        if handle.state() == SessionState::Exited {
            return;
        }
        handle.request_stop();
        handle.wait_exited().await;
    }

    /// Stop every live session. Returns how many were stopped.
    pub async fn terminate_all(&self) -> usize {
        let handles: Vec<Arc<SessionHandle>> =
            self.sessions.iter().map(|e| e.value().clone()).collect();
        if handles.is_empty() {
            return 0;
        }

        tracing::info!(count = handles.len(), "Terminating all transcode sessions");
        futures::future::join_all(handles.iter().map(|h| self.terminate(h))).await;
        handles.len()
    }

    pub fn get(&self, id: Uuid) -> Option<Arc<SessionHandle>> {
        self.sessions.get(&id).map(|e| e.value().clone())
    }

    pub fn active_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn sessions(&self) -> Vec<SessionInfo> {
        let mut infos: Vec<SessionInfo> = self.sessions.iter().map(|e| e.value().info()).collect();
        infos.sort_by_key(|i| i.created_at);
        infos
    }
}

async fn reap(
    mut child: Child,
    handle: Arc<SessionHandle>,
    sessions: Arc<DashMap<Uuid, Arc<SessionHandle>>>,
    grace: Duration,
) {
    let mut stopped = false;
    let status = tokio::select! {
        biased;
        status = child.wait() => status,
        _ = handle.stop.cancelled() => {
            stopped = true;
            handle.set_state(SessionState::Terminating);
            stop_child(&mut child, grace, handle.id).await
        }
    };

    handle.set_state(SessionState::Exited);
    sessions.remove(&handle.id);

    let lifetime_secs = (Utc::now() - handle.created_at).num_seconds();
    match status {
        Ok(status) if status.success() || stopped => {
            tracing::info!(session_id = %handle.id, %status, lifetime_secs, stopped, "Transcode session ended");
        }
        Ok(status) => {
            tracing::warn!(session_id = %handle.id, %status, lifetime_secs, "Transcode engine failed mid-stream");
        }
        Err(e) => {
            tracing::warn!(session_id = %handle.id, error = %e, "Failed to reap transcode engine");
        }
    }

    handle.exited.cancel();
}

/// SIGTERM, grace period, then SIGKILL.
async fn stop_child(child: &mut Child, grace: Duration, id: Uuid) -> io::Result<ExitStatus> {
    #[cfg(unix)]
    {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        if let Some(pid) = child.id() {
            match kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
                Ok(()) => match tokio::time::timeout(grace, child.wait()).await {
                    Ok(status) => return status,
                    Err(_) => tracing::warn!(
                        session_id = %id,
                        pid,
                        grace_ms = grace.as_millis() as u64,
                        "Engine still running after SIGTERM, killing"
                    ),
                },
                Err(e) => tracing::debug!(session_id = %id, error = %e, "SIGTERM failed"),
            }
        }
    }
    #[cfg(not(unix))]
    let _ = (grace, id);

    child.kill().await?;
    child.wait().await
}

async fn log_stderr(id: Uuid, stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        tracing::warn!(session_id = %id, "ffmpeg: {line}");
    }
}

/// Copy a piped source into the engine until it ends or the session stops.
async fn pump_input(handle: Arc<SessionHandle>, input: ByteStream, mut stdin: ChildStdin) {
    let mut reader = StreamReader::new(input);
    tokio::select! {
        result = tokio::io::copy(&mut reader, &mut stdin) => match result {
            Ok(bytes) => tracing::debug!(session_id = %handle.id, bytes, "Piped input finished"),
            Err(e) => tracing::debug!(session_id = %handle.id, error = %e, "Piped input ended early"),
        },
        _ = handle.stop.cancelled() => {}
        _ = handle.exited.cancelled() => {}
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;

    fn fake_engine(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn request(input: InputLocator) -> TranscodeRequest {
        TranscodeRequest {
            input,
            seek_secs: 0.0,
            audio_track: None,
            profile: EncoderProfile::Software,
        }
    }

    fn local(path: &str) -> TranscodeRequest {
        request(InputLocator::Local(PathBuf::from(path)))
    }

    fn supervisor(ffmpeg: PathBuf, grace_ms: u64) -> TranscodeSupervisor {
        let config = TranscodeConfig {
            grace_period_ms: grace_ms,
            ..TranscodeConfig::default()
        };
        TranscodeSupervisor::new(ffmpeg, config)
    }

    async fn collect(output: TranscodeOutput) -> Vec<u8> {
        output.map(|c| c.unwrap().to_vec()).concat().await
    }

    fn process_alive(pid: u32) -> bool {
        nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid as i32), None).is_ok()
    }

    async fn wait_until_idle(sup: &TranscodeSupervisor) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while sup.active_count() > 0 {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .expect("sessions did not drain");
    }

    #[tokio::test]
    async fn streams_engine_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let engine = fake_engine(dir.path(), "ffmpeg", "printf 'fragmented-mp4'");
        let sup = supervisor(engine, 2000);

        let (output, handle) = sup.start(local("/movies/a.mkv")).unwrap();
        assert_eq!(collect(output).await, b"fragmented-mp4");

        handle.wait_exited().await;
        assert_eq!(handle.state(), SessionState::Exited);
        assert_eq!(sup.active_count(), 0);
    }

    #[tokio::test]
    async fn engine_receives_built_args() {
        let dir = tempfile::tempdir().unwrap();
        let engine = fake_engine(dir.path(), "ffmpeg", "echo \"$@\"");
        let sup = supervisor(engine, 2000);

        let mut req = local("/movies/a.mkv");
        req.seek_secs = 5.0;
        req.audio_track = Some(1);
        let (output, _) = sup.start(req).unwrap();
        let line = String::from_utf8(collect(output).await).unwrap();

        assert!(line.contains("-ss 5.000 -i /movies/a.mkv"), "{line}");
        assert!(line.contains("-map 0:v:0 -map 0:a:1"), "{line}");
        assert!(line.trim_end().ends_with("pipe:1"), "{line}");
    }

    #[tokio::test]
    async fn spawn_failure_is_setup_error() {
        let sup = supervisor(PathBuf::from("/nonexistent/ffmpeg"), 2000);
        let err = sup.start(local("/movies/a.mkv")).err().unwrap();
        assert!(matches!(err, Error::TranscodeSetup(_)), "{err:?}");
        assert_eq!(sup.active_count(), 0);
    }

    #[tokio::test]
    async fn terminate_all_leaves_no_processes() {
        let dir = tempfile::tempdir().unwrap();
        let engine = fake_engine(dir.path(), "ffmpeg", "exec sleep 30");
        let sup = supervisor(engine, 2000);

        let mut outputs = Vec::new();
        let mut pids = Vec::new();
        for _ in 0..3 {
            let (output, handle) = sup.start(local("/movies/a.mkv")).unwrap();
            pids.push(handle.pid().unwrap());
            outputs.push(output);
        }
        assert_eq!(sup.active_count(), 3);
        assert!(pids.iter().all(|&pid| process_alive(pid)));

        assert_eq!(sup.terminate_all().await, 3);
        assert_eq!(sup.active_count(), 0);
        assert!(pids.iter().all(|&pid| !process_alive(pid)));

        // Idempotent.
        assert_eq!(sup.terminate_all().await, 0);
    }

    #[tokio::test]
    async fn sigterm_ignoring_engine_is_killed_after_grace() {
        let dir = tempfile::tempdir().unwrap();
        let engine = fake_engine(dir.path(), "ffmpeg", "trap '' TERM\nwhile :; do sleep 1; done");
        let sup = supervisor(engine, 200);

        let (_output, handle) = sup.start(local("/movies/a.mkv")).unwrap();
        let pid = handle.pid().unwrap();
        // Give the shell time to install its trap.
        tokio::time::sleep(Duration::from_millis(100)).await;

        tokio::time::timeout(Duration::from_secs(5), sup.terminate(&handle))
            .await
            .expect("terminate hung");
        assert_eq!(handle.state(), SessionState::Exited);
        assert!(!process_alive(pid));
    }

    #[tokio::test]
    async fn dropping_output_terminates_session() {
        let dir = tempfile::tempdir().unwrap();
        let engine = fake_engine(dir.path(), "ffmpeg", "exec sleep 30");
        let sup = supervisor(engine, 2000);

        let (output, handle) = sup.start(local("/movies/a.mkv")).unwrap();
        let pid = handle.pid().unwrap();
        drop(output);

        wait_until_idle(&sup).await;
        assert!(!process_alive(pid));
    }

    #[tokio::test]
    async fn terminate_twice_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let engine = fake_engine(dir.path(), "ffmpeg", "exec sleep 30");
        let sup = supervisor(engine, 2000);

        let (_output, handle) = sup.start(local("/movies/a.mkv")).unwrap();
        sup.terminate(&handle).await;
        sup.terminate(&handle).await;
        assert_eq!(handle.state(), SessionState::Exited);
        assert!(sup.get(handle.id()).is_none());
    }

    #[tokio::test]
    async fn piped_input_feeds_stdin() {
        let dir = tempfile::tempdir().unwrap();
        let engine = fake_engine(dir.path(), "ffmpeg", "exec cat");
        let sup = supervisor(engine, 2000);

        let chunks: Vec<io::Result<Bytes>> = vec![
            Ok(Bytes::from_static(b"remote ")),
            Ok(Bytes::from_static(b"bytes")),
        ];
        let req = request(InputLocator::Pipe(Box::pin(futures::stream::iter(chunks))));
        let (output, _) = sup.start(req).unwrap();
        assert_eq!(collect(output).await, b"remote bytes");
    }

    #[tokio::test]
    async fn sessions_are_listed() {
        let dir = tempfile::tempdir().unwrap();
        let engine = fake_engine(dir.path(), "ffmpeg", "exec sleep 30");
        let sup = supervisor(engine, 2000);

        let (_output, handle) = sup
            .start(request(InputLocator::Url("ftp://bob:pw@nas/a.mkv".into())))
            .unwrap();
        let infos = sup.sessions();
        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].id, handle.id());
        assert_eq!(infos[0].state, SessionState::Running);
        assert_eq!(infos[0].input, "ftp://***@nas/a.mkv");

        sup.terminate_all().await;
    }
}
