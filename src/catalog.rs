//! Catalog collaborator: resolves a URL to its variants and opens byte streams.

use std::pin::Pin;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use regex::Regex;
use serde::Deserialize;
use tokio::io::AsyncRead;
use tokio_util::io::StreamReader;

use crate::error::{Error, Result};
use crate::url::{extract_video_id, watch_url};
use crate::variant::EncodedVariant;

const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

static PLAYER_RESPONSE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)var ytInitialPlayerResponse\s*=\s*(\{.*?\});").expect("valid regex")
});

/// A readable byte stream for one variant.
pub type ByteReader = Pin<Box<dyn AsyncRead + Send>>;

/// Metadata for one video as resolved by a [`Catalog`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VideoInfo {
    /// Catalog identifier.
    pub id: String,
    /// Human-readable title; used to name the artifacts.
    pub title: String,
    /// Media duration in milliseconds, `0` when unknown.
    pub duration_ms: u64,
    /// All downloadable variants.
    pub variants: Vec<EncodedVariant>,
}

/// An opened variant stream.
pub struct VariantStream {
    /// Body bytes.
    pub reader: ByteReader,
    /// Length declared by the source, if any.
    pub length: Option<u64>,
}

/// Source of video metadata and variant byte streams.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Resolves a URL to its metadata and variants.
    async fn resolve(&self, url: &str) -> Result<VideoInfo>;

    /// Opens the byte stream of a variant.
    async fn open_stream(&self, variant: &EncodedVariant) -> Result<VariantStream>;
}

/// Catalog backed by the YouTube watch page.
///
/// Only variants that carry a direct URL are listed; signature-ciphered
/// entries are skipped.
#[derive(Debug, Clone)]
pub struct YouTubeCatalog {
    http: reqwest::Client,
}

impl YouTubeCatalog {
    /// Creates a catalog using the given HTTP client.
    #[must_use]
    pub const fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// Builds the HTTP client used for page and stream requests.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialised.
    pub fn build_http_client() -> reqwest::Result<reqwest::Client> {
        reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .pool_idle_timeout(Duration::from_secs(60))
            .tcp_keepalive(Duration::from_secs(30))
            .build()
    }
}

#[async_trait]
impl Catalog for YouTubeCatalog {
    async fn resolve(&self, url: &str) -> Result<VideoInfo> {
        let id = extract_video_id(url)
            .ok_or_else(|| Error::Catalog(format!("invalid YouTube URL: {url}")))?;

        let page = self
            .http
            .get(watch_url(&id))
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| Error::Catalog(format!("failed to fetch video page: {e}")))?
            .text()
            .await
            .map_err(|e| Error::Catalog(format!("failed to read video page: {e}")))?;

        parse_watch_page(&page)
    }

    async fn open_stream(&self, variant: &EncodedVariant) -> Result<VariantStream> {
        let response = self.http.get(&variant.url).send().await?.error_for_status()?;
        let length = response.content_length();
        let body = response.bytes_stream().map_err(std::io::Error::other);
        Ok(VariantStream {
            reader: Box::pin(StreamReader::new(body)),
            length,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlayerResponse {
    playability_status: Option<PlayabilityStatus>,
    video_details: Option<VideoDetails>,
    streaming_data: Option<StreamingData>,
}

#[derive(Debug, Deserialize)]
struct PlayabilityStatus {
    status: String,
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoDetails {
    video_id: String,
    title: String,
    length_seconds: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StreamingData {
    #[serde(default)]
    formats: Vec<RawFormat>,
    #[serde(default)]
    adaptive_formats: Vec<RawFormat>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFormat {
    itag: u32,
    url: Option<String>,
    mime_type: String,
    #[serde(default)]
    bitrate: u64,
    quality_label: Option<String>,
    content_length: Option<String>,
    audio_channels: Option<u32>,
}

impl RawFormat {
    fn into_variant(self) -> Option<EncodedVariant> {
        let Some(url) = self.url else {
            log::debug!("Skipping itag {} without a direct URL", self.itag);
            return None;
        };
        Some(EncodedVariant {
            itag: self.itag,
            mime_type: self.mime_type,
            quality_label: self.quality_label,
            bitrate: self.bitrate,
            content_length: self
                .content_length
                .and_then(|len| len.parse().ok())
                .unwrap_or(0),
            audio_channels: self.audio_channels.unwrap_or(0),
            url,
        })
    }
}

/// Extracts video metadata from a watch page's embedded player response.
///
/// # Errors
///
/// Returns [`Error::Catalog`] if the player response is missing, malformed,
/// or reports the video as unplayable.
pub fn parse_watch_page(page: &str) -> Result<VideoInfo> {
    let json = PLAYER_RESPONSE_RE
        .captures(page)
        .and_then(|caps| caps.get(1))
        .ok_or_else(|| Error::Catalog("failed to find ytInitialPlayerResponse in the page".into()))?;

    let response: PlayerResponse = serde_json::from_str(json.as_str())
        .map_err(|e| Error::Catalog(format!("failed to parse player response: {e}")))?;

    if let Some(status) = &response.playability_status
        && status.status != "OK"
    {
        return Err(Error::Catalog(format!(
            "video is not playable: {}",
            status.reason.as_deref().unwrap_or(&status.status)
        )));
    }

    let details = response
        .video_details
        .ok_or_else(|| Error::Catalog("player response has no videoDetails".into()))?;
    let streaming = response
        .streaming_data
        .ok_or_else(|| Error::Catalog("player response has no streamingData".into()))?;

    let duration_ms = details
        .length_seconds
        .and_then(|secs| secs.parse::<u64>().ok())
        .map_or(0, |secs| secs * 1000);

    let variants = streaming
        .formats
        .into_iter()
        .chain(streaming.adaptive_formats)
        .filter_map(RawFormat::into_variant)
        .collect();

    Ok(VideoInfo {
        id: details.video_id,
        title: details.title,
        duration_ms,
        variants,
    })
}
