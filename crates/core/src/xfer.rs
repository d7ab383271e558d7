//! Client-side transfer helper for package managers.
//!
//! Installed as the package manager's transfer command, it asks the local
//! mirror first for package files and falls back to the upstream URL.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::download::{DownloadError, Downloader};

const PACKAGE_MARKER: &str = ".pkg.tar.";

/// Where a transfer was finally served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum XferSource {
    LocalMirror,
    Upstream,
}

/// Local mirror URL for an upstream package URL.
///
/// The repo and file name are the last two path segments once `/os/` and
/// `/<arch>/` segments are collapsed. Only package files are redirected;
/// anything else (index archives, signatures of indexes) gets `None`.
pub fn local_mirror_url(local_mirror: &str, upstream: &str, arch: &str) -> Option<String> {
    let collapsed = upstream
        .replace("/os/", "/")
        .replace(&format!("/{}/", arch), "/");

    let mut segments = collapsed.rsplit('/');
    let file = segments.next().filter(|s| !s.is_empty())?;
    let repo = segments.next().filter(|s| !s.is_empty())?;

    if !file.contains(PACKAGE_MARKER) {
        return None;
    }

    Some(format!(
        "{}/{}/{}",
        local_mirror.trim_end_matches('/'),
        repo,
        file
    ))
}

/// Transfers single files, preferring the local mirror.
pub struct Xfer {
    downloader: Arc<dyn Downloader>,
    local_mirror: Option<String>,
    arch: String,
}

impl Xfer {
    pub fn new(
        downloader: Arc<dyn Downloader>,
        local_mirror: Option<String>,
        arch: impl Into<String>,
    ) -> Self {
        Self {
            downloader,
            local_mirror,
            arch: arch.into(),
        }
    }

    /// Transfer `url` into `output`.
    ///
    /// Any local mirror failure falls back to `url`. `output` is
    /// overwritten, and removed again if both sources fail.
    pub async fn transfer(&self, output: &Path, url: &str) -> Result<XferSource, DownloadError> {
        let local = self
            .local_mirror
            .as_deref()
            .and_then(|base| local_mirror_url(base, url, &self.arch));

        if let Some(local) = local {
            match self.downloader.download(&local, output).await {
                Ok(bytes) => {
                    info!(url = %local, bytes, "Served from local mirror");
                    return Ok(XferSource::LocalMirror);
                }
                Err(e) => {
                    debug!(url = %local, error = %e, "Local mirror miss, falling back");
                    discard(output);
                }
            }
        }

        match self.downloader.download(url, output).await {
            Ok(bytes) => {
                info!(url, bytes, "Served from upstream");
                Ok(XferSource::Upstream)
            }
            Err(e) => {
                warn!(url, error = %e, "Upstream transfer failed");
                discard(output);
                Err(e)
            }
        }
    }
}

fn discard(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "Failed to remove partial file");
        }
    }
}
