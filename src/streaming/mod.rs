//! Media streaming module.
//!
//! `GET /stream?file=&start=&audio=&sourceId=` picks one of three paths:
//!
//! - **Transcode**: containers browsers cannot play (`mkv avi wmv flv`) go
//!   through a live ffmpeg session, wherever the file lives.
//! - **Direct**: locally resident files are served with range support.
//! - **Remote**: everything else is read from a remote source over a
//!   dedicated connection, always as 206.
//!
//! Seeking or switching audio in a transcoded stream is a new request.

mod direct;
pub mod range;
mod remote;
mod transcode;

pub use direct::serve_local;
pub use remote::serve_remote;
pub use transcode::serve_transcode;

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap},
    response::Response,
    routing::get,
    Router,
};
use mediagate_common::{Container, Error};
use serde::Deserialize;
use std::path::Path;

use crate::server::{AppContext, AppError};

#[derive(Debug, Clone, Deserialize)]
pub struct StreamQuery {
    pub file: String,
    /// Seek position in seconds (transcode only).
    #[serde(default)]
    pub start: Option<f64>,
    /// Audio stream index among the file's audio streams (transcode only).
    #[serde(default)]
    pub audio: Option<u32>,
    #[serde(default, rename = "sourceId")]
    pub source_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamRoute {
    Transcode,
    Direct,
    Remote,
}

impl StreamRoute {
    pub fn choose(container: Container, has_source_id: bool, is_local: bool) -> Self {
        if container.needs_transcode() {
            StreamRoute::Transcode
        } else if !has_source_id && is_local {
            StreamRoute::Direct
        } else {
            StreamRoute::Remote
        }
    }
}

/// Whether `file` names a regular file on this machine.
pub async fn is_local_file(file: &str) -> bool {
    tokio::fs::metadata(Path::new(file))
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

/// Create streaming router.
pub fn stream_routes() -> Router<AppContext> {
    Router::new().route("/stream", get(stream))
}

async fn stream(
    State(ctx): State<AppContext>,
    Query(query): Query<StreamQuery>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    if query.file.is_empty() {
        return Err(Error::Validation("file parameter is required".into()).into());
    }

    let range = headers.get(header::RANGE).and_then(|h| h.to_str().ok());
    let container = Container::from_name(&query.file);
    let is_local = query.source_id.is_none() && is_local_file(&query.file).await;
    let route = StreamRoute::choose(container, query.source_id.is_some(), is_local);

    tracing::debug!(
        file = %query.file,
        container = %container,
        source = ?query.source_id,
        route = ?route,
        "Routing stream request"
    );

    let response = match route {
        StreamRoute::Direct => serve_local(Path::new(&query.file), range).await?,
        StreamRoute::Remote => {
            serve_remote(&ctx.remote, query.source_id.as_deref(), &query.file, range).await?
        }
        StreamRoute::Transcode => {
            let input = ctx.resolve_input(&query.file, query.source_id.as_deref()).await?;
            serve_transcode(&ctx.transcoder, input, query.start, query.audio, ctx.encoder)?
        }
    };
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incompatible_containers_always_transcode() {
        for name in ["a.mkv", "a.avi", "a.wmv", "a.flv"] {
            let c = Container::from_name(name);
            assert_eq!(StreamRoute::choose(c, false, true), StreamRoute::Transcode);
            assert_eq!(StreamRoute::choose(c, true, false), StreamRoute::Transcode);
        }
    }

    #[test]
    fn residency_decides_between_direct_and_remote() {
        let mp4 = Container::from_name("a.mp4");
        assert_eq!(StreamRoute::choose(mp4, false, true), StreamRoute::Direct);
        assert_eq!(StreamRoute::choose(mp4, false, false), StreamRoute::Remote);
        assert_eq!(StreamRoute::choose(mp4, true, true), StreamRoute::Remote);
    }

    #[tokio::test]
    async fn local_file_detection() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.mp4");
        std::fs::write(&file, b"x").unwrap();

        assert!(is_local_file(file.to_str().unwrap()).await);
        assert!(!is_local_file(dir.path().to_str().unwrap()).await);
        assert!(!is_local_file("/media/remote/a.mp4").await);
    }
}
