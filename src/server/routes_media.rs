//! Media inspection.

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use mediagate_av::MediaInfo;
use serde::Deserialize;

use super::{AppContext, AppError};

pub fn media_routes() -> Router<AppContext> {
    Router::new().route("/media-info", get(media_info))
}

#[derive(Debug, Deserialize)]
pub struct MediaInfoQuery {
    pub file: String,
    #[serde(default, rename = "sourceId")]
    pub source_id: Option<String>,
}

async fn media_info(
    State(ctx): State<AppContext>,
    Query(query): Query<MediaInfoQuery>,
) -> Result<Json<MediaInfo>, AppError> {
    let input = ctx.resolve_input(&query.file, query.source_id.as_deref()).await?;
    let info = ctx.prober.probe(input).await?;
    Ok(Json(info))
}
