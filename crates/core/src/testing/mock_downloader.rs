//! Mock downloader for testing.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::download::{DownloadError, Downloader};

/// Kind of request made against the mock origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    LastModified,
    Download,
}

/// A recorded request for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub kind: RequestKind,
    pub url: String,
}

#[derive(Debug, Default)]
struct OriginState {
    files: HashMap<String, Vec<u8>>,
    last_modified: HashMap<String, String>,
    failing: HashSet<String>,
    offline: bool,
    requests: Vec<RecordedRequest>,
}

/// Mock implementation of the Downloader trait.
///
/// Provides controllable behavior for testing:
/// - Serve configured bytes per URL, 404 for anything else
/// - Report configurable last-modified values
/// - Fail specific URLs mid-transfer, leaving a partial file behind
/// - Simulate the whole network being down
/// - Record every request
#[derive(Debug, Default)]
pub struct MockDownloader {
    state: Mutex<OriginState>,
}

impl MockDownloader {
    /// Create a new mock origin with no files.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, OriginState> {
        // A panicking test poisons the lock; the state is still usable.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Serve `bytes` at `url`.
    pub fn add_file(&self, url: &str, bytes: Vec<u8>) {
        self.state().files.insert(url.to_string(), bytes);
    }

    /// Stop serving `url`.
    pub fn remove_file(&self, url: &str) {
        self.state().files.remove(url);
    }

    /// Report `value` as the last-modified value of `url`.
    pub fn set_last_modified(&self, url: &str, value: &str) {
        self.state()
            .last_modified
            .insert(url.to_string(), value.to_string());
    }

    /// Make transfers of `url` fail after writing half of the body.
    pub fn fail_url(&self, url: &str) {
        self.state().failing.insert(url.to_string());
    }

    /// Clear all per-URL failures.
    pub fn clear_failures(&self) {
        self.state().failing.clear();
    }

    /// Make every request fail as if the network were unreachable.
    pub fn set_offline(&self, offline: bool) {
        self.state().offline = offline;
    }

    /// Get all recorded requests.
    pub fn recorded_requests(&self) -> Vec<RecordedRequest> {
        self.state().requests.clone()
    }

    /// URLs of all recorded downloads, in order.
    pub fn downloaded_urls(&self) -> Vec<String> {
        self.state()
            .requests
            .iter()
            .filter(|r| r.kind == RequestKind::Download)
            .map(|r| r.url.clone())
            .collect()
    }

    /// Number of download requests made.
    pub fn download_count(&self) -> usize {
        self.downloaded_urls().len()
    }

    /// Number of `Last-Modified` requests made.
    pub fn last_modified_count(&self) -> usize {
        self.state()
            .requests
            .iter()
            .filter(|r| r.kind == RequestKind::LastModified)
            .count()
    }

    /// Forget recorded requests.
    pub fn clear_recorded(&self) {
        self.state().requests.clear();
    }
}

#[async_trait]
impl Downloader for MockDownloader {
    async fn last_modified(&self, url: &str) -> Result<Option<String>, DownloadError> {
        let mut state = self.state();
        state.requests.push(RecordedRequest {
            kind: RequestKind::LastModified,
            url: url.to_string(),
        });

        if state.offline {
            return Err(DownloadError::Request("network unreachable".to_string()));
        }
        if !state.files.contains_key(url) {
            return Err(DownloadError::Status {
                url: url.to_string(),
                status: 404,
            });
        }

        Ok(state.last_modified.get(url).cloned())
    }

    async fn download(&self, url: &str, destination: &Path) -> Result<u64, DownloadError> {
        let (body, failing) = {
            let mut state = self.state();
            state.requests.push(RecordedRequest {
                kind: RequestKind::Download,
                url: url.to_string(),
            });

            if state.offline {
                return Err(DownloadError::Request("network unreachable".to_string()));
            }
            let Some(body) = state.files.get(url).cloned() else {
                return Err(DownloadError::Status {
                    url: url.to_string(),
                    status: 404,
                });
            };
            (body, state.failing.contains(url))
        };

        if failing {
            tokio::fs::write(destination, &body[..body.len() / 2]).await?;
            return Err(DownloadError::Request("connection reset".to_string()));
        }

        tokio::fs::write(destination, &body).await?;
        Ok(body.len() as u64)
    }
}
