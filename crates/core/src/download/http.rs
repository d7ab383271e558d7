//! reqwest-based downloader.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{header::LAST_MODIFIED, Client};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::config::DownloadConfig;

use super::{DownloadError, Downloader};

/// HTTP(S) downloader.
pub struct HttpDownloader {
    client: Client,
}

impl HttpDownloader {
    /// Create a new downloader with the given transfer settings.
    pub fn new(config: &DownloadConfig) -> Result<Self, DownloadError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .user_agent(concat!("pacyard/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DownloadError::Request(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

fn map_request_error(url: &str, e: reqwest::Error) -> DownloadError {
    if e.is_timeout() {
        DownloadError::Timeout(url.to_string())
    } else {
        DownloadError::Request(e.to_string())
    }
}

#[async_trait]
impl Downloader for HttpDownloader {
    async fn last_modified(&self, url: &str) -> Result<Option<String>, DownloadError> {
        let response = self
            .client
            .head(url)
            .send()
            .await
            .map_err(|e| map_request_error(url, e))?;

        if !response.status().is_success() {
            return Err(DownloadError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let value = response
            .headers()
            .get(LAST_MODIFIED)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        debug!(url, last_modified = ?value, "Read index Last-Modified");
        Ok(value)
    }

    async fn download(&self, url: &str, destination: &Path) -> Result<u64, DownloadError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| map_request_error(url, e))?;

        if !response.status().is_success() {
            return Err(DownloadError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let mut file = File::create(destination).await?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| map_request_error(url, e))?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        debug!(url, bytes = written, "Download complete");
        Ok(written)
    }
}
