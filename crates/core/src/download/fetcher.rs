//! Idempotent fetch of one artifact and its detached signature.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use super::Downloader;

const SIGNATURE_SUFFIX: &str = ".sig";

/// URL of the detached signature published next to `url`.
pub fn signature_url(url: &str) -> String {
    format!("{}{}", url, SIGNATURE_SUFFIX)
}

/// Local path of the detached signature stored next to `path`.
pub fn signature_path(path: &Path) -> PathBuf {
    let mut raw = path.as_os_str().to_owned();
    raw.push(SIGNATURE_SUFFIX);
    PathBuf::from(raw)
}

/// Outcome of fetching an artifact together with its signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArtifactFetch {
    pub artifact: bool,
    pub signature: bool,
}

/// Fetches files that never change content under the same name.
#[derive(Clone)]
pub struct FileFetcher {
    downloader: Arc<dyn Downloader>,
}

impl FileFetcher {
    pub fn new(downloader: Arc<dyn Downloader>) -> Self {
        Self { downloader }
    }

    /// Fetch `url` into `destination`.
    ///
    /// An existing destination counts as success without any transfer. A
    /// failed transfer removes whatever was partially written.
    pub async fn fetch(&self, url: &str, destination: &Path) -> bool {
        if destination.exists() {
            debug!(path = %destination.display(), "Already present");
            return true;
        }

        debug!(url, path = %destination.display(), "Downloading");
        match self.downloader.download(url, destination).await {
            Ok(_) => true,
            Err(e) => {
                warn!(url, error = %e, "Download failed");
                if let Err(e) = tokio::fs::remove_file(destination).await {
                    if e.kind() != std::io::ErrorKind::NotFound {
                        warn!(
                            path = %destination.display(),
                            error = %e,
                            "Failed to remove partial download"
                        );
                    }
                }
                false
            }
        }
    }

    /// Fetch an artifact, then its `.sig` as an independent second transfer.
    ///
    /// The signature is only attempted when the artifact is present, and its
    /// failure does not affect the artifact.
    pub async fn fetch_with_signature(&self, url: &str, destination: &Path) -> ArtifactFetch {
        let artifact = self.fetch(url, destination).await;
        if !artifact {
            return ArtifactFetch {
                artifact,
                signature: false,
            };
        }

        let signature = self
            .fetch(&signature_url(url), &signature_path(destination))
            .await;

        ArtifactFetch {
            artifact,
            signature,
        }
    }
}
