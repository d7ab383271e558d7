use std::sync::Arc;

use tracing::debug;

use crate::catalog::{CatalogError, MarkerPruneCount, MirrorCatalog};

/// Days an index marker is kept after it was recorded.
pub const MARKER_RETENTION_DAYS: i64 = 60;

/// Expires index markers. Never touches installed packages or mirrored files.
pub struct Housekeeping {
    catalog: Arc<dyn MirrorCatalog>,
}

impl Housekeeping {
    pub fn new(catalog: Arc<dyn MirrorCatalog>) -> Self {
        Self { catalog }
    }

    /// Delete markers recorded before `today - MARKER_RETENTION_DAYS`.
    pub fn run(&self, today: i64) -> Result<MarkerPruneCount, CatalogError> {
        let pruned = self
            .catalog
            .prune_markers_older_than(today - MARKER_RETENTION_DAYS)?;
        debug!(
            index_hashes = pruned.index_hashes,
            index_downloads = pruned.index_downloads,
            "Expired index markers"
        );
        Ok(pruned)
    }
}
