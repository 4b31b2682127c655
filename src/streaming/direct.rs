//! Direct streaming with HTTP range requests.
//!
//! Serves locally resident files that browsers can play as they are.

use axum::{
    body::Body,
    http::{header, StatusCode},
    response::Response,
};
use mediagate_common::{Container, Error, Result};
use std::io::SeekFrom;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;

use super::range::resolve_range;

async fn open(path: &Path) -> Result<File> {
    File::open(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::not_found("file", path.display()),
        _ => Error::from(e),
    })
}

/// Serve a local file, honoring `Range` when present.
pub async fn serve_local(path: &Path, range_header: Option<&str>) -> Result<Response> {
    let mut file = open(path).await?;
    let file_size = file.metadata().await?.len();
    let content_type = Container::from_name(&path.to_string_lossy()).content_type();

    let range = range_header.and_then(|h| resolve_range(h, file_size));

    let response = match range {
        Some(range) => {
            // Partial content response
            let length = range.length();

            file.seek(SeekFrom::Start(range.start)).await?;

            let stream = ReaderStream::new(file.take(length));
            let body = Body::from_stream(stream);

            tracing::debug!(path = %path.display(), start = range.start, end = range.end, size = file_size, "Serving local range");

            Response::builder()
                .status(StatusCode::PARTIAL_CONTENT)
                .header(header::CONTENT_TYPE, content_type)
                .header(header::CONTENT_LENGTH, length.to_string())
                .header(header::CONTENT_RANGE, range.content_range(file_size))
                .header(header::ACCEPT_RANGES, "bytes")
                .body(body)
        }
        None => {
            // Full file response
            let stream = ReaderStream::new(file);
            let body = Body::from_stream(stream);

            Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, content_type)
                .header(header::CONTENT_LENGTH, file_size.to_string())
                .header(header::ACCEPT_RANGES, "bytes")
                .body(body)
        }
    };

    response.map_err(|e| Error::Internal(format!("failed to build response: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_bytes(response: Response) -> Vec<u8> {
        response.into_body().collect().await.unwrap().to_bytes().to_vec()
    }

    fn fixture() -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        std::fs::write(&path, (0u8..100).collect::<Vec<u8>>()).unwrap();
        (dir, path)
    }

    #[tokio::test]
    async fn full_file_without_range() {
        let (_dir, path) = fixture();
        let response = serve_local(&path, None).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "100");
        assert_eq!(response.headers()[header::ACCEPT_RANGES], "bytes");
        assert_eq!(response.headers()[header::CONTENT_TYPE], "video/mp4");
        assert_eq!(body_bytes(response).await.len(), 100);
    }

    #[tokio::test]
    async fn partial_content_for_range() {
        let (_dir, path) = fixture();
        let response = serve_local(&path, Some("bytes=10-19")).await.unwrap();

        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes 10-19/100");
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "10");
        assert_eq!(body_bytes(response).await, (10u8..20).collect::<Vec<u8>>());
    }

    #[tokio::test]
    async fn malformed_range_serves_everything_as_partial() {
        let (_dir, path) = fixture();
        let response = serve_local(&path, Some("bytes=500-")).await.unwrap();

        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes 0-99/100");
        assert_eq!(body_bytes(response).await.len(), 100);
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let err = serve_local(Path::new("/nonexistent/clip.mp4"), None).await.err().unwrap();
        assert_eq!(err.http_status(), 404);
    }
}
