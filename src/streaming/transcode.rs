//! Live transcoded streaming.
//!
//! The response body owns the engine session: when the client goes away
//! axum drops the body, which asks the supervisor to stop the engine.

use axum::{
    body::Body,
    http::{header, StatusCode},
    response::Response,
};
use mediagate_av::{EncoderProfile, InputLocator, TranscodeRequest, TranscodeSupervisor};
use mediagate_common::{Error, Result};

/// Start a session for `input` and stream its fragmented MP4 output.
pub fn serve_transcode(
    supervisor: &TranscodeSupervisor,
    input: InputLocator,
    start: Option<f64>,
    audio_track: Option<u32>,
    profile: EncoderProfile,
) -> Result<Response> {
    let seek_secs = start.filter(|s| s.is_finite() && *s > 0.0).unwrap_or(0.0);
    let (output, handle) = supervisor.start(TranscodeRequest {
        input,
        seek_secs,
        audio_track,
        profile,
    })?;

    tracing::info!(
        session = %handle.id(),
        seek_secs,
        audio_track = ?audio_track,
        encoder = %profile,
        "Transcode stream started"
    );

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "video/mp4")
        .header(header::CACHE_CONTROL, "no-store")
        .header("X-Transcode-Session", handle.id().to_string())
        .body(Body::from_stream(output))
        .map_err(|e| Error::Internal(format!("failed to build response: {e}")))
}
