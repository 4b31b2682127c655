//! Unified error type for the gateway.
//!
//! All crates funnel their failures into [`Error`], which carries enough
//! context for route handlers to derive an HTTP status code via
//! [`Error::http_status`]. Whether an error can still be reported to the
//! client depends on when it is discovered: once response headers are
//! committed the only remaining signal is closing the connection.

use std::fmt;

/// Error taxonomy covering every failure mode of the delivery gateway.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// User-fixable configuration problem (no remote sources, bad source
    /// reference). Surfaced as 503 with an actionable message.
    #[error("{0}")]
    Configuration(String),

    /// The requested entity could not be found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of entity (e.g. "file", "subtitle track").
        entity: String,
        /// The identifier that was looked up.
        id: String,
    },

    /// Request data failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A remote file server was unreachable or refused the credentials.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Re-establishing a dropped control connection failed.
    #[error("Reconnection error: {0}")]
    Reconnection(String),

    /// The transcoding engine could not be started.
    #[error("Transcode setup error: {0}")]
    TranscodeSetup(String),

    /// A transfer failed after response headers were sent.
    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    /// Caption or tool output could not be parsed.
    #[error("Parse error: {0}")]
    Parse(String),

    /// An external tool (ffmpeg, ffprobe) returned an error.
    #[error("Tool error [{tool}]: {message}")]
    Tool {
        /// Name of the tool that failed.
        tool: String,
        /// Human-readable error description.
        message: String,
    },

    /// A third-party HTTP service (subtitle index, caption URL) failed.
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Map this error to an appropriate HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::Configuration(_) => 503,
            Error::NotFound { .. } => 404,
            Error::Validation(_) => 400,
            Error::Connection(_) => 502,
            Error::Reconnection(_) => 502,
            Error::TranscodeSetup(_) => 500,
            Error::StreamInterrupted(_) => 500,
            Error::Parse(_) => 422,
            Error::Tool { .. } => 502,
            Error::Upstream(_) => 502,
            Error::Io { .. } => 500,
            Error::Internal(_) => 500,
        }
    }

    /// Stable name of the error kind, used in structured error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Configuration(_) => "ConfigurationError",
            Error::NotFound { .. } => "NotFoundError",
            Error::Validation(_) => "ValidationError",
            Error::Connection(_) => "ConnectionError",
            Error::Reconnection(_) => "ReconnectionError",
            Error::TranscodeSetup(_) => "TranscodeSetupError",
            Error::StreamInterrupted(_) => "StreamInterruptedError",
            Error::Parse(_) => "ParseError",
            Error::Tool { .. } => "ToolError",
            Error::Upstream(_) => "UpstreamError",
            Error::Io { .. } => "IoError",
            Error::Internal(_) => "InternalError",
        }
    }

    /// Convenience constructor for [`Error::Configuration`].
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration(message.into())
    }

    /// Convenience constructor for [`Error::NotFound`].
    pub fn not_found(entity: impl Into<String>, id: impl fmt::Display) -> Self {
        Error::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Convenience constructor for [`Error::Tool`].
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
