//! FTP control sessions.
//!
//! [`FtpSession`] is the blocking surface the channel drives from
//! `spawn_blocking`; [`Connector`] opens new sessions. [`SuppaConnector`]
//! is the production implementation backed by suppaftp.

use std::io::Read;
use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;

use mediagate_common::{Error, Result};
use suppaftp::list::File as ListEntry;
use suppaftp::native_tls::TlsConnector;
use suppaftp::types::FileType;
use suppaftp::{FtpError, FtpStream, NativeTlsConnector, NativeTlsFtpStream, Status};
use tracing::debug;

use crate::config::{RemoteSourceConfig, TrustPolicy};

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub name: String,
    pub is_dir: bool,
    pub size: u64,
}

/// A logged-in FTP control connection.
///
/// Every method blocks; callers run them on the blocking pool.
pub trait FtpSession: Send {
    /// List the entries of `path`.
    fn list(&mut self, path: &str) -> Result<Vec<RemoteEntry>>;

    /// Size of the file at `path` in bytes.
    fn size(&mut self, path: &str) -> Result<u64>;

    /// Cheap liveness check (`NOOP`).
    fn ping(&mut self) -> Result<()>;

    /// Consume the session and start a binary transfer of `path` from
    /// `offset`. The returned reader owns the control connection; dropping
    /// it closes both.
    fn open_read(self: Box<Self>, path: &str, offset: u64) -> Result<Box<dyn Read + Send>>;

    /// Close the connection politely. Errors are ignored.
    fn quit(self: Box<Self>);
}

/// Opens logged-in sessions for a source.
pub trait Connector: Send + Sync {
    fn connect(&self, config: &RemoteSourceConfig) -> Result<Box<dyn FtpSession>>;
}

enum Control {
    Plain(FtpStream),
    Secure(NativeTlsFtpStream),
}

macro_rules! with_stream {
    ($control:expr, $s:ident => $body:expr) => {
        match $control {
            Control::Plain($s) => $body,
            Control::Secure($s) => $body,
        }
    };
}

/// Connector backed by suppaftp, plain or explicit TLS.
#[derive(Debug, Clone)]
pub struct SuppaConnector {
    connect_timeout: Duration,
}

impl SuppaConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }

    fn resolve(config: &RemoteSourceConfig) -> Result<SocketAddr> {
        (config.host.as_str(), config.port)
            .to_socket_addrs()
            .map_err(|e| Error::Connection(format!("cannot resolve {}: {e}", config.address())))?
            .next()
            .ok_or_else(|| Error::Connection(format!("no address for {}", config.address())))
    }

    fn tls_connector(trust: TrustPolicy) -> Result<NativeTlsConnector> {
        let accept_invalid = trust == TrustPolicy::AcceptInvalid;
        let connector = TlsConnector::builder()
            .danger_accept_invalid_certs(accept_invalid)
            .danger_accept_invalid_hostnames(accept_invalid)
            .build()
            .map_err(|e| Error::Connection(format!("TLS setup failed: {e}")))?;
        Ok(NativeTlsConnector::from(connector))
    }
}

impl Default for SuppaConnector {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

impl Connector for SuppaConnector {
    fn connect(&self, config: &RemoteSourceConfig) -> Result<Box<dyn FtpSession>> {
        let addr = Self::resolve(config)?;
        let fail = |e: FtpError| Error::Connection(format!("{}: {e}", config.address()));

        let mut control = if config.secure {
            let stream = NativeTlsFtpStream::connect_timeout(addr, self.connect_timeout).map_err(fail)?;
            let stream = stream
                .into_secure(Self::tls_connector(config.trust)?, &config.host)
                .map_err(fail)?;
            Control::Secure(stream)
        } else {
            Control::Plain(FtpStream::connect_timeout(addr, self.connect_timeout).map_err(fail)?)
        };

        let (user, password) = if config.username.is_empty() {
            ("anonymous", "anonymous@")
        } else {
            (config.username.as_str(), config.password.as_str())
        };
        with_stream!(&mut control, s => {
            s.login(user, password).map_err(fail)?;
            s.transfer_type(FileType::Binary).map_err(fail)?;
        });

        debug!(source = %config.id, address = %config.address(), secure = config.secure, "FTP session established");
        Ok(Box::new(SuppaSession {
            control,
            read_timeout: self.connect_timeout,
        }))
    }
}

struct SuppaSession {
    control: Control,
    /// Applied to data connections so a stalled transfer cannot block a
    /// reader forever.
    read_timeout: Duration,
}

/// 550 means the path does not exist (or is not readable).
fn map_error(err: FtpError, path: &str) -> Error {
    match &err {
        FtpError::UnexpectedResponse(resp) if matches!(resp.status, Status::FileUnavailable) => {
            Error::not_found("remote file", path)
        }
        _ => Error::Connection(err.to_string()),
    }
}

fn parse_listing(lines: Vec<String>) -> Vec<RemoteEntry> {
    lines
        .iter()
        .filter_map(|line| match line.parse::<ListEntry>() {
            Ok(entry) => Some(entry),
            Err(_) => {
                debug!(line = %line, "Skipping unparseable LIST line");
                None
            }
        })
        .filter(|entry| entry.name() != "." && entry.name() != "..")
        .map(|entry| RemoteEntry {
            name: entry.name().to_string(),
            is_dir: entry.is_directory(),
            size: entry.size() as u64,
        })
        .collect()
}

impl FtpSession for SuppaSession {
    fn list(&mut self, path: &str) -> Result<Vec<RemoteEntry>> {
        let lines = with_stream!(&mut self.control, s => s.list(Some(path)))
            .map_err(|e| map_error(e, path))?;
        Ok(parse_listing(lines))
    }

    fn size(&mut self, path: &str) -> Result<u64> {
        let size = with_stream!(&mut self.control, s => s.size(path)).map_err(|e| map_error(e, path))?;
        Ok(size as u64)
    }

    fn ping(&mut self) -> Result<()> {
        with_stream!(&mut self.control, s => s.noop()).map_err(|e| Error::Connection(e.to_string()))
    }

    fn open_read(self: Box<Self>, path: &str, offset: u64) -> Result<Box<dyn Read + Send>> {
        let SuppaSession { mut control, read_timeout } = *self;
        let data: Box<dyn Read + Send> = with_stream!(&mut control, s => {
            if offset > 0 {
                s.resume_transfer(offset as usize).map_err(|e| map_error(e, path))?;
            }
            let stream = s.retr_as_stream(path).map_err(|e| map_error(e, path))?;
            stream
                .get_ref()
                .set_read_timeout(Some(read_timeout))
                .map_err(|e| Error::Connection(format!("cannot set read timeout: {e}")))?;
            Box::new(stream) as Box<dyn Read + Send>
        });
        Ok(Box::new(Transfer { data, _control: control }))
    }

    fn quit(self: Box<Self>) {
        let mut control = self.control;
        let _ = with_stream!(&mut control, s => s.quit());
    }
}

/// Data connection plus the control connection it belongs to.
struct Transfer {
    data: Box<dyn Read + Send>,
    _control: Control,
}

impl Read for Transfer {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.data.read(buf)
    }
}
