//! Error-to-HTTP response conversion.
//!
//! Route handlers return `Result<T, AppError>` and use `?` on anything
//! producing a [`mediagate_common::Error`].

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use mediagate_common::Error;
use serde_json::json;

/// Wrapper so we can implement `IntoResponse` for an external type.
#[derive(Debug)]
pub struct AppError {
    inner: Error,
}

impl AppError {
    pub fn new(inner: Error) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &Error {
        &self.inner
    }
}

impl From<Error> for AppError {
    fn from(e: Error) -> Self {
        Self::new(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.inner.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        // Configuration problems are user-fixable; the UI shows the message.
        if let Error::Configuration(message) = &self.inner {
            tracing::warn!(error = %message, "Request rejected by configuration");
            let body = json!({
                "error": self.inner.kind(),
                "message": message,
            });
            return (status, axum::Json(body)).into_response();
        }

        if status.is_server_error() {
            tracing::error!(
                status = %status,
                kind = self.inner.kind(),
                error = %self.inner,
                "Server error in handler"
            );
        } else {
            tracing::debug!(status = %status, error = %self.inner, "Request failed");
        }

        (
            status,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            self.inner.to_string(),
        )
            .into_response()
    }
}
