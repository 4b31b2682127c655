//! Client for an OpenSubtitles-compatible REST API.

use crate::config::ProviderConfig;
use mediagate_common::{Error, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timeout for index requests and caption downloads
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Search parameters accepted by `/subtitles/search`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchQuery {
    pub query: Option<String>,
    pub imdb_id: Option<String>,
    /// Comma-separated language codes, e.g. `en,fr`.
    pub languages: Option<String>,
    pub season: Option<u32>,
    pub episode: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResults {
    pub results: Vec<SubtitleResult>,
    pub total: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubtitleResult {
    pub id: String,
    pub file_id: Option<u64>,
    pub file_name: Option<String>,
    pub language: Option<String>,
    pub release: Option<String>,
    pub title: Option<String>,
    pub download_count: u64,
    pub hearing_impaired: bool,
    pub fps: Option<f64>,
    pub upload_date: Option<String>,
}

pub struct SubtitleProvider {
    client: Client,
    config: ProviderConfig,
}

impl SubtitleProvider {
    pub fn new(config: ProviderConfig) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(config.user_agent.clone())
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to build HTTP client with timeout: {}", e);
                Client::new()
            });

        Self { client, config }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn api_key(&self) -> Result<&str> {
        self.config.api_key.as_deref().ok_or_else(|| {
            Error::configuration(
                "No subtitle provider API key configured. Set [subtitles.provider] api_key to enable search and download.",
            )
        })
    }

    pub async fn search(&self, query: &SearchQuery) -> Result<SearchResults> {
        let api_key = self.api_key()?;

        let mut params: Vec<(&str, String)> = Vec::new();
        match (&query.imdb_id, &query.query) {
            (Some(imdb), _) => params.push(("imdb_id", imdb.trim_start_matches("tt").to_string())),
            (None, Some(q)) => params.push(("query", q.clone())),
            (None, None) => {
                return Err(Error::Validation("either query or imdb_id is required".into()));
            }
        }
        if let Some(ref languages) = query.languages {
            params.push(("languages", languages.clone()));
        }
        if let Some(season) = query.season {
            params.push(("season_number", season.to_string()));
        }
        if let Some(episode) = query.episode {
            params.push(("episode_number", episode.to_string()));
        }

        let response = self
            .client
            .get(self.url("/subtitles"))
            .header("Api-Key", api_key)
            .header("Accept", "application/json")
            .query(&params)
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("subtitle search failed: {e}")))?;
        let response = check_status(response, "subtitle search").await?;

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| Error::Upstream(format!("invalid subtitle search response: {e}")))?;

        let results: Vec<SubtitleResult> = body.data.into_iter().map(SubtitleResult::from).collect();
        tracing::debug!(count = results.len(), total = body.total_count, "Subtitle search complete");
        Ok(SearchResults {
            total: body.total_count.unwrap_or(results.len() as u64),
            results,
        })
    }

    /// Exchange a file id for a temporary download link.
    pub async fn download_link(&self, file_id: u64) -> Result<String> {
        let api_key = self.api_key()?;

        #[derive(Serialize)]
        struct DownloadRequest {
            file_id: u64,
        }

        let response = self
            .client
            .post(self.url("/download"))
            .header("Api-Key", api_key)
            .header("Accept", "application/json")
            .json(&DownloadRequest { file_id })
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("subtitle download request failed: {e}")))?;
        let response = check_status(response, "subtitle download").await?;

        let body: DownloadResponse = response
            .json()
            .await
            .map_err(|e| Error::Upstream(format!("invalid subtitle download response: {e}")))?;
        tracing::debug!(file_id, remaining = ?body.remaining, "Resolved subtitle download link");
        Ok(body.link)
    }

    /// Direct URL for a legacy numeric subtitle id.
    pub fn legacy_url(&self, subtitle_id: &str) -> String {
        format!("{}{}", self.config.legacy_download_base, subtitle_id)
    }

    /// Fetch the raw bytes behind a caption URL.
    pub async fn fetch(&self, url: &str) -> Result<bytes::Bytes> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|e| Error::Validation(format!("invalid subtitle URL '{url}': {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::Validation(format!("unsupported URL scheme '{}'", parsed.scheme())));
        }

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("failed to fetch {url}: {e}")))?;
        let response = check_status(response, "caption fetch").await?;
        response
            .bytes()
            .await
            .map_err(|e| Error::Upstream(format!("failed to read {url}: {e}")))
    }
}

async fn check_status(response: reqwest::Response, what: &str) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let error = response.text().await.unwrap_or_default();
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(Error::not_found(what, error));
    }
    Err(Error::Upstream(format!("{what} returned {status}: {error}")))
}

// Wire types

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    total_count: Option<u64>,
    #[serde(default)]
    data: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: String,
    #[serde(default)]
    attributes: SearchAttributes,
}

#[derive(Debug, Default, Deserialize)]
struct SearchAttributes {
    language: Option<String>,
    release: Option<String>,
    #[serde(default)]
    download_count: u64,
    #[serde(default)]
    hearing_impaired: bool,
    fps: Option<f64>,
    upload_date: Option<String>,
    #[serde(default)]
    files: Vec<SearchFile>,
    feature_details: Option<FeatureDetails>,
}

#[derive(Debug, Deserialize)]
struct SearchFile {
    file_id: u64,
    file_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FeatureDetails {
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DownloadResponse {
    link: String,
    remaining: Option<i64>,
}

impl From<SearchItem> for SubtitleResult {
    fn from(item: SearchItem) -> Self {
        let attrs = item.attributes;
        let file = attrs.files.into_iter().next();
        Self {
            id: item.id,
            file_id: file.as_ref().map(|f| f.file_id),
            file_name: file.and_then(|f| f.file_name),
            language: attrs.language,
            release: attrs.release,
            title: attrs.feature_details.and_then(|d| d.title),
            download_count: attrs.download_count,
            hearing_impaired: attrs.hearing_impaired,
            fps: attrs.fps,
            upload_date: attrs.upload_date,
        }
    }
}
