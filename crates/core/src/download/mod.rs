//! Transfer of remote files to local paths.
//!
//! The `Downloader` trait is the seam to the network: one `Last-Modified`
//! request and one single-attempt transfer. `FileFetcher` layers the
//! idempotent artifact semantics on top of it.

mod fetcher;
mod http;

pub use fetcher::{signature_path, signature_url, ArtifactFetch, FileFetcher};
pub use http::HttpDownloader;

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur during a transfer.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Transfer timed out: {0}")]
    Timeout(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Trait for fetching files from a remote origin.
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Ask the origin for the last-modified value of `url` without
    /// transferring the body.
    ///
    /// Returns `Ok(None)` when the origin does not report one.
    async fn last_modified(&self, url: &str) -> Result<Option<String>, DownloadError>;

    /// Transfer `url` into `destination` in a single attempt.
    ///
    /// On error `destination` may be left partially written; callers own
    /// the cleanup. Returns the number of bytes written.
    async fn download(&self, url: &str, destination: &Path) -> Result<u64, DownloadError>;
}
