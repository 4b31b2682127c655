//! Ranged streaming of files on remote sources.

use axum::{
    body::Body,
    http::{header, StatusCode},
    response::Response,
};
use mediagate_common::stream::take_bytes;
use mediagate_common::{Container, Error, Result};
use mediagate_remote::RemoteChannel;

use super::range::{resolve_range, ByteRange};

/// Serve `path` from a remote source as a 206 response.
///
/// Source resolution happens first, so a gateway without sources answers
/// with a configuration error before any connection attempt.
pub async fn serve_remote(
    remote: &RemoteChannel,
    source_id: Option<&str>,
    path: &str,
    range_header: Option<&str>,
) -> Result<Response> {
    let source = remote.resolve(source_id)?;
    let size = remote.size(Some(&source.id), path).await?;
    let content_type = Container::from_name(path).content_type();

    let range = match range_header {
        Some(h) => resolve_range(h, size),
        None => ByteRange::full(size),
    };
    let Some(range) = range else {
        return Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, content_type)
            .header(header::CONTENT_LENGTH, "0")
            .header(header::ACCEPT_RANGES, "bytes")
            .body(Body::empty())
            .map_err(|e| Error::Internal(format!("failed to build response: {e}")));
    };

    let stream = remote.open_range_stream(Some(&source.id), path, range.start).await?;
    let body = Body::from_stream(take_bytes(stream, range.length()));

    tracing::debug!(source = %source.id, path = %path, start = range.start, end = range.end, size, "Serving remote range");

    Response::builder()
        .status(StatusCode::PARTIAL_CONTENT)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, range.length().to_string())
        .header(header::CONTENT_RANGE, range.content_range(size))
        .header(header::ACCEPT_RANGES, "bytes")
        .body(body)
        .map_err(|e| Error::Internal(format!("failed to build response: {e}")))
}
