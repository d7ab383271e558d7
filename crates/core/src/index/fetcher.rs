//! Metadata fetcher: brings a repo's index archive into the scratch
//! directory, unless the origin reports it unchanged.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::catalog::MirrorCatalog;
use crate::config::expand_mirror;
use crate::download::Downloader;

use super::IndexError;

/// File name of a repo's index archive on mirrors and in the scratch dir.
pub fn index_file_name(repo: &str) -> String {
    format!("{}.db.tar.gz", repo)
}

/// URL of a repo's index archive for a mirror template.
pub fn index_url(mirror_template: &str, repo: &str, arch: &str) -> String {
    join_url(
        &expand_mirror(mirror_template, repo, arch),
        &index_file_name(repo),
    )
}

/// Append a file name to a base URL with exactly one separating slash.
pub(crate) fn join_url(base: &str, file: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), file)
}

/// A freshly downloaded index archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedIndex {
    pub url: String,
    pub path: PathBuf,
    /// Hex MD5 of the archive bytes.
    pub hash: String,
}

/// Result of a fetch attempt that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexFetch {
    /// The origin reports the same timestamp already recorded for this URL.
    Unchanged,
    Fetched(FetchedIndex),
}

/// Fetches repo index archives with timestamp-based dedup.
pub struct MetadataFetcher {
    catalog: Arc<dyn MirrorCatalog>,
    downloader: Arc<dyn Downloader>,
    scratch_dir: PathBuf,
}

impl MetadataFetcher {
    pub fn new(
        catalog: Arc<dyn MirrorCatalog>,
        downloader: Arc<dyn Downloader>,
        scratch_dir: PathBuf,
    ) -> Self {
        Self {
            catalog,
            downloader,
            scratch_dir,
        }
    }

    /// Fetch the index of `repo` from one mirror.
    ///
    /// `epoch_day` stamps the download marker recorded on success.
    pub async fn fetch(
        &self,
        mirror_template: &str,
        repo: &str,
        arch: &str,
        epoch_day: i64,
    ) -> Result<IndexFetch, IndexError> {
        let url = index_url(mirror_template, repo, arch);

        let timestamp = match self.downloader.last_modified(&url).await {
            Ok(ts) => ts,
            Err(e) => {
                debug!(url = %url, error = %e, "No index timestamp available");
                None
            }
        };

        if let Some(ts) = &timestamp {
            if self.catalog.has_index_download(&url, ts)? {
                debug!(url = %url, timestamp = %ts, "Index unchanged since last download");
                return Ok(IndexFetch::Unchanged);
            }
        }

        let path = self.scratch_dir.join(index_file_name(repo));
        remove_if_exists(&path)?;

        if let Err(e) = self.downloader.download(&url, &path).await {
            remove_if_exists(&path)?;
            return Err(e.into());
        }

        // An unknown timestamp can never match later, so it is not recorded.
        if let Some(ts) = &timestamp {
            self.catalog.record_index_download(&url, ts, epoch_day)?;
        }

        let hash = match md5_file(&path) {
            Ok(hash) => hash,
            Err(e) => {
                remove_if_exists(&path)?;
                return Err(e.into());
            }
        };
        debug!(url = %url, hash = %hash, "Index downloaded");

        Ok(IndexFetch::Fetched(FetchedIndex { url, path, hash }))
    }
}

fn remove_if_exists(path: &Path) -> std::io::Result<()> {
    match std::fs::remove_file(path) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// Hex MD5 digest of a file's full content.
fn md5_file(path: &Path) -> std::io::Result<String> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut context = md5::Context::new();
    let mut buffer = [0u8; 64 * 1024];

    loop {
        let read = reader.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        context.consume(&buffer[..read]);
    }

    Ok(format!("{:x}", context.compute()))
}
