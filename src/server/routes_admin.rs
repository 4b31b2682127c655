//! Admin API routes.
//!
//! - External tool availability
//! - Live transcode session monitoring

use axum::{extract::State, routing::get, Json, Router};
use mediagate_av::{EncoderProfile, SessionInfo, ToolInfo};
use serde::Serialize;

use super::{AppContext, AppError};

/// Create admin routes.
pub fn admin_routes() -> Router<AppContext> {
    Router::new()
        .route("/admin/tools", get(get_tools))
        .route("/admin/sessions", get(get_sessions))
}

#[derive(Debug, Serialize)]
pub struct ToolsResponse {
    pub tools: Vec<ToolInfo>,
    pub encoder: EncoderProfile,
}

async fn get_tools(State(ctx): State<AppContext>) -> Result<Json<ToolsResponse>, AppError> {
    let tools = ctx.tools.clone();
    // check_all runs each tool once
    let tools = tokio::task::spawn_blocking(move || tools.check_all())
        .await
        .map_err(|e| mediagate_common::Error::Internal(format!("tool check failed: {e}")))?;
    Ok(Json(ToolsResponse {
        tools,
        encoder: ctx.encoder,
    }))
}

#[derive(Debug, Serialize)]
pub struct SessionsResponse {
    pub active: usize,
    pub sessions: Vec<SessionInfo>,
}

async fn get_sessions(State(ctx): State<AppContext>) -> Json<SessionsResponse> {
    let sessions = ctx.transcoder.sessions();
    Json(SessionsResponse {
        active: sessions.len(),
        sessions,
    })
}
