use std::sync::Arc;

use tracing::{debug, info};

use crate::catalog::{CatalogError, MirrorCatalog};
use crate::config::PathsConfig;

use super::remove_artifact;

/// Keeps only the newest builds of every package.
pub struct RetentionPruner {
    catalog: Arc<dyn MirrorCatalog>,
    paths: PathsConfig,
    num_versions_to_keep: u32,
}

impl RetentionPruner {
    pub fn new(
        catalog: Arc<dyn MirrorCatalog>,
        paths: PathsConfig,
        num_versions_to_keep: u32,
    ) -> Self {
        Self {
            catalog,
            paths,
            num_versions_to_keep,
        }
    }

    /// Delete every build beyond the newest `num_versions_to_keep` of its
    /// package, row first, then the artifact and its signature.
    ///
    /// Returns the number of builds removed.
    pub fn prune(&self) -> Result<usize, CatalogError> {
        let keep = self.num_versions_to_keep as usize;
        let files = self.catalog.list_mirrored_files()?;

        let mut removed = 0;
        let mut current: Option<&str> = None;
        let mut rank = 0usize;

        // Rows arrive grouped by name, newest first.
        for file in &files {
            if current != Some(file.name.as_str()) {
                current = Some(file.name.as_str());
                rank = 0;
            }
            rank += 1;
            if rank <= keep {
                continue;
            }

            debug!(
                name = %file.name,
                filename = %file.filename,
                build_date = file.build_date,
                "Pruning old build"
            );
            if self.catalog.delete_mirrored_file(&file.filename)? {
                removed += 1;
            }
            remove_artifact(&self.paths.repo_dir(&file.repo).join(&file.filename));
        }

        if removed > 0 {
            info!(removed, keep, "Pruned old builds");
        }
        Ok(removed)
    }
}
