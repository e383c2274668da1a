//! Bounded streaming download of the ringtone
//!
//! The response is checked before any byte reaches the sink (status, content
//! type, declared length) and then streamed chunk by chunk. The running total
//! is enforced independently of `Content-Length`, and the cancellation token
//! is polled once per chunk. On error the sink may hold a partial write; the
//! caller discards it.

pub mod transport;

pub use transport::{TransportConfig, build_client};

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::humanize::ByteSize;

/// Hard ceiling for a ringtone payload
pub const MAX_ASSET_BYTES: ByteSize = ByteSize::mib(10);

/// Assumed when the response does not declare a type
pub const DEFAULT_CONTENT_TYPE: &str = "audio/mpeg";

pub const ALLOWED_CONTENT_TYPES: &[&str] = &[
    "audio/mpeg",
    "audio/mp3",
    "audio/ogg",
    "audio/wav",
    "audio/aac",
    "audio/flac",
    "audio/x-wav",
    "audio/mp4",
    "application/ogg",
    "application/octet-stream",
];

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("download failed: HTTP {0}")]
    HttpStatus(u16),

    #[error("download failed: empty response body")]
    EmptyBody,

    #[error("unsupported content type: {0}")]
    UnsupportedContentType(String),

    #[error("ringtone too large: {declared_kb}KB exceeds {limit_kb}KB limit")]
    TooLarge { declared_kb: u64, limit_kb: u64 },

    #[error("ringtone too large: exceeded {limit_kb}KB limit during download")]
    LimitExceeded { limit_kb: u64 },

    #[error("download cancelled")]
    Cancelled,

    #[error("download failed: {0}")]
    Request(String),

    #[error("failed to write ringtone: {0}")]
    Write(#[from] std::io::Error),

    #[error("transport setup failed: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for DownloadError {
    fn from(e: reqwest::Error) -> Self {
        // Signed URLs must not leak through error text
        DownloadError::Request(e.without_url().to_string())
    }
}

pub type Result<T> = std::result::Result<T, DownloadError>;

/// Result of one successful download
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadOutcome {
    pub content_type: String,
    pub bytes_written: u64,
}

/// Fetches a remote asset into a caller-owned sink
#[async_trait]
pub trait AssetFetcher: Send + Sync {
    async fn fetch(
        &self,
        url: &str,
        sink: &mut (dyn AsyncWrite + Send + Unpin),
        cancel: &CancellationToken,
    ) -> Result<DownloadOutcome>;
}

/// Sequential source of body chunks
#[async_trait]
pub trait ChunkSource: Send {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>>;
}

#[async_trait]
impl ChunkSource for reqwest::Response {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        Ok(self.chunk().await?)
    }
}

/// Copy chunks into `sink` until the source ends
///
/// Returns the number of bytes written. The sink never receives more than
/// `max_bytes`.
pub async fn stream_into<S>(
    source: &mut S,
    sink: &mut (dyn AsyncWrite + Send + Unpin),
    max_bytes: ByteSize,
    cancel: &CancellationToken,
) -> Result<u64>
where
    S: ChunkSource + ?Sized,
{
    let mut total: u64 = 0;

    loop {
        if cancel.is_cancelled() {
            return Err(DownloadError::Cancelled);
        }

        let Some(chunk) = source.next_chunk().await? else {
            break;
        };

        total += chunk.len() as u64;
        if total > max_bytes.as_u64() {
            return Err(DownloadError::LimitExceeded {
                limit_kb: max_bytes.as_kib(),
            });
        }
        sink.write_all(&chunk).await?;
    }

    if total == 0 {
        return Err(DownloadError::EmptyBody);
    }

    sink.flush().await?;
    Ok(total)
}

/// Lower-case `type/subtype` of a header value, parameters dropped
pub fn content_type_essence(header: Option<&str>) -> String {
    let Some(raw) = header.map(str::trim).filter(|value| !value.is_empty()) else {
        return DEFAULT_CONTENT_TYPE.to_string();
    };

    match raw.parse::<mime::Mime>() {
        Ok(parsed) => parsed.essence_str().to_ascii_lowercase(),
        Err(_) => raw
            .split(';')
            .next()
            .unwrap_or(raw)
            .trim()
            .to_ascii_lowercase(),
    }
}

pub fn is_allowed_content_type(essence: &str) -> bool {
    ALLOWED_CONTENT_TYPES.contains(&essence)
}

/// Host part of a URL, the only piece of it that may be logged or shown
pub fn host_of(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|parsed| parsed.host_str().map(str::to_string))
        .unwrap_or_else(|| "<invalid>".to_string())
}

/// HTTPS downloader enforcing type and size limits
#[derive(Clone)]
pub struct AssetDownloader {
    client: Client,
    max_bytes: ByteSize,
}

impl AssetDownloader {
    pub fn new(client: Client, max_bytes: ByteSize) -> Self {
        Self { client, max_bytes }
    }

    pub fn from_config(config: &crate::config::DownloadConfig) -> Result<Self> {
        let client = build_client(&TransportConfig::from(config))?;
        Ok(Self::new(client, config.max_bytes))
    }

    pub fn max_bytes(&self) -> ByteSize {
        self.max_bytes
    }
}

#[async_trait]
impl AssetFetcher for AssetDownloader {
    async fn fetch(
        &self,
        url: &str,
        sink: &mut (dyn AsyncWrite + Send + Unpin),
        cancel: &CancellationToken,
    ) -> Result<DownloadOutcome> {
        let host = host_of(url);
        debug!(%host, "Requesting ringtone");

        let mut response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::HttpStatus(status.as_u16()));
        }

        let header = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok());
        let content_type = content_type_essence(header);
        if !is_allowed_content_type(&content_type) {
            return Err(DownloadError::UnsupportedContentType(content_type));
        }

        if let Some(declared) = response.content_length()
            && declared > self.max_bytes.as_u64()
        {
            return Err(DownloadError::TooLarge {
                declared_kb: declared / 1024,
                limit_kb: self.max_bytes.as_kib(),
            });
        }

        info!(%host, %content_type, declared = ?response.content_length(), "Downloading ringtone");
        let bytes_written = stream_into(&mut response, sink, self.max_bytes, cancel).await?;
        info!(%host, bytes = bytes_written, "Download complete");

        Ok(DownloadOutcome {
            content_type,
            bytes_written,
        })
    }
}
