//! Caption routes.
//!
//! Every caption response is WebVTT with timestamps rebased by the
//! optional `start` query parameter, because a transcoded stream always
//! starts its clock at zero whatever the seek position.

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::header,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use mediagate_av::extract_subtitle;
use mediagate_common::Error;
use mediagate_subtitle::to_canonical;
use serde::Deserialize;

use super::{AppContext, AppError};
use crate::subtitles::archive::{decode_payload, decode_text};
use crate::subtitles::{render_captions, SearchQuery, SearchResults, CAPTIONS_CONTENT_TYPE};

/// Create subtitle routes.
pub fn subtitle_routes() -> Router<AppContext> {
    Router::new()
        .route("/subtitle", get(embedded_subtitle))
        .route("/external-subtitle", get(external_subtitle))
        .route("/parse-subtitle", post(parse_subtitle))
        .route("/subtitles/search", get(search_subtitles))
        .route("/subtitles/download", get(download_subtitle))
}

fn captions(text: String) -> impl IntoResponse {
    ([(header::CONTENT_TYPE, CAPTIONS_CONTENT_TYPE)], text)
}

#[derive(Debug, Deserialize)]
pub struct EmbeddedQuery {
    pub file: String,
    #[serde(default)]
    pub track: u32,
    #[serde(default)]
    pub start: Option<f64>,
    #[serde(default, rename = "sourceId")]
    pub source_id: Option<String>,
}

async fn embedded_subtitle(
    State(ctx): State<AppContext>,
    Query(query): Query<EmbeddedQuery>,
) -> Result<impl IntoResponse, AppError> {
    let cache_key = match query.source_id {
        Some(ref id) => format!("{id}:{}", query.file),
        None => query.file.clone(),
    };

    let canonical = match ctx.subtitle_cache.get(&cache_key, query.track).await {
        Some(cached) => cached,
        None => {
            let input = ctx.resolve_input(&query.file, query.source_id.as_deref()).await?;
            let ffmpeg = ctx.tools.ffmpeg()?.to_path_buf();
            let raw = extract_subtitle(ffmpeg, input, query.track).await?;
            let canonical = to_canonical(&raw);
            ctx.subtitle_cache.insert(&cache_key, query.track, &canonical).await?;
            tracing::info!(file = %query.file, track = query.track, "Extracted subtitle track");
            canonical
        }
    };

    Ok(captions(render_captions(&canonical, query.start)))
}

#[derive(Debug, Deserialize)]
pub struct ExternalQuery {
    pub url: String,
    #[serde(default)]
    pub start: Option<f64>,
}

async fn external_subtitle(
    State(ctx): State<AppContext>,
    Query(query): Query<ExternalQuery>,
) -> Result<impl IntoResponse, AppError> {
    let payload = ctx.subtitle_provider.fetch(&query.url).await?;
    let text = decode_payload(&payload);
    Ok(captions(render_captions(&text, query.start)))
}

#[derive(Debug, Deserialize)]
pub struct StartQuery {
    #[serde(default)]
    pub start: Option<f64>,
}

async fn parse_subtitle(Query(query): Query<StartQuery>, body: Bytes) -> impl IntoResponse {
    captions(render_captions(&decode_text(&body), query.start))
}

async fn search_subtitles(
    State(ctx): State<AppContext>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<SearchResults>, AppError> {
    Ok(Json(ctx.subtitle_provider.search(&query).await?))
}

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    pub zip_url: Option<String>,
    pub subtitle_id: Option<String>,
    pub download_url: Option<String>,
    pub file_id: Option<u64>,
    #[serde(default)]
    pub start: Option<f64>,
}

async fn download_subtitle(
    State(ctx): State<AppContext>,
    Query(query): Query<DownloadQuery>,
) -> Result<impl IntoResponse, AppError> {
    let provider = &ctx.subtitle_provider;
    let url = if let Some(url) = query.zip_url.or(query.download_url) {
        url
    } else if let Some(id) = query.subtitle_id {
        provider.legacy_url(&id)
    } else if let Some(file_id) = query.file_id {
        provider.download_link(file_id).await?
    } else {
        return Err(Error::Validation(
            "one of zip_url, subtitle_id, download_url or file_id is required".into(),
        )
        .into());
    };

    let payload = provider.fetch(&url).await?;
    tracing::debug!(url = %url, bytes = payload.len(), "Downloaded subtitle payload");
    Ok(captions(render_captions(&decode_payload(&payload), query.start)))
}
