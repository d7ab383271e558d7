use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::catalog::{CatalogError, MirrorCatalog};
use crate::config::PathsConfig;

const SIGNATURE_SUFFIX: &str = ".sig";

/// Brings the catalog and the repo directories back into agreement.
pub struct Reconciler {
    catalog: Arc<dyn MirrorCatalog>,
    paths: PathsConfig,
}

impl Reconciler {
    pub fn new(catalog: Arc<dyn MirrorCatalog>, paths: PathsConfig) -> Self {
        Self { catalog, paths }
    }

    /// Delete mirrored file rows whose artifact is missing on disk.
    pub fn prune_missing_files(&self) -> Result<usize, CatalogError> {
        let mut removed = 0;
        for file in self.catalog.list_mirrored_files()? {
            let path = self.paths.repo_dir(&file.repo).join(&file.filename);
            if path.is_file() {
                continue;
            }
            debug!(repo = %file.repo, filename = %file.filename, "Dropping row without file");
            if self.catalog.delete_mirrored_file(&file.filename)? {
                removed += 1;
            }
        }

        if removed > 0 {
            info!(removed, "Removed catalog rows without a backing file");
        }
        Ok(removed)
    }

    /// Delete files in the given repo directories that no catalog row names.
    ///
    /// A `.sig` file belongs to the artifact it is named after. Missing or
    /// unreadable directories are skipped. Returns the number of files
    /// deleted, signatures included.
    pub fn prune_orphan_files(&self, repos: &[String]) -> Result<usize, CatalogError> {
        let mut removed = 0;
        for repo in repos {
            removed += self.prune_orphans_in(repo, &self.paths.repo_dir(repo))?;
        }

        if removed > 0 {
            info!(removed, "Removed files without a catalog row");
        }
        Ok(removed)
    }

    fn prune_orphans_in(&self, repo: &str, dir: &Path) -> Result<usize, CatalogError> {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => {
                warn!(repo, path = %dir.display(), error = %e, "Cannot list repo directory");
                return Ok(0);
            }
        };

        let mut removed = 0;
        for entry in entries.flatten() {
            if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                continue;
            }
            let Some(file_name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };

            let artifact = file_name
                .strip_suffix(SIGNATURE_SUFFIX)
                .unwrap_or(&file_name);
            if self.catalog.has_mirrored_file(artifact)? {
                continue;
            }

            // An orphan's signature is listed on its own and removed the same way.
            debug!(repo, filename = %file_name, "Deleting orphan file");
            match std::fs::remove_file(entry.path()) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(repo, filename = %file_name, error = %e, "Failed to delete orphan file")
                }
            }
        }
        Ok(removed)
    }
}
