//! Remote source management.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use mediagate_common::Error;
use mediagate_remote::{RemoteMedia, RemoteSourceConfig};
use serde::{Deserialize, Serialize};

use super::{AppContext, AppError};
use crate::config::persist;

pub fn source_routes() -> Router<AppContext> {
    Router::new()
        .route("/sources", get(list_sources).post(add_source))
        .route("/sources/:id", axum::routing::delete(remove_source))
        .route("/sources/:id/media", get(list_source_media))
}

#[derive(Debug, Serialize)]
pub struct SourceResponse {
    #[serde(flatten)]
    pub source: RemoteSourceConfig,
    pub connected: bool,
}

impl SourceResponse {
    fn new(ctx: &AppContext, source: &RemoteSourceConfig) -> Self {
        Self {
            source: source.redacted(),
            connected: ctx.remote.is_connected(&source.id),
        }
    }
}

async fn list_sources(State(ctx): State<AppContext>) -> Json<Vec<SourceResponse>> {
    let sources = ctx.remote.sources();
    Json(sources.iter().map(|s| SourceResponse::new(&ctx, s)).collect())
}

async fn add_source(
    State(ctx): State<AppContext>,
    Json(source): Json<RemoteSourceConfig>,
) -> Result<(StatusCode, Json<SourceResponse>), AppError> {
    ctx.remote.connect(source.clone()).await?;
    persist_sources(&ctx).await;
    Ok((StatusCode::CREATED, Json(SourceResponse::new(&ctx, &source))))
}

async fn remove_source(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    if !ctx.remote.remove(&id).await {
        return Err(Error::not_found("remote source", id).into());
    }
    tracing::info!(source = %id, "Remote source removed");
    persist_sources(&ctx).await;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct MediaQuery {
    pub path: Option<String>,
}

async fn list_source_media(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    Query(query): Query<MediaQuery>,
) -> Result<Json<Vec<RemoteMedia>>, AppError> {
    let media = ctx.remote.list_media(Some(&id), query.path.as_deref()).await?;
    Ok(Json(media))
}

async fn persist_sources(ctx: &AppContext) {
    let Some(ref path) = ctx.config_path else {
        return;
    };
    let _guard = ctx.persist_lock.lock().await;
    // Persist to file
    if let Err(e) = persist::update_remote_sources(path, &ctx.remote.sources()) {
        tracing::error!("Failed to persist remote sources: {}", e);
    }
}
