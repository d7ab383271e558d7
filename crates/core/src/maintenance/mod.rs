//! Maintenance passes run around mirror synchronization.
//!
//! - [`RetentionPruner`] caps the number of kept builds per package.
//! - [`Reconciler`] restores agreement between catalog rows and repo directories.
//! - [`Housekeeping`] expires old index markers.
//!
//! Each pass is idempotent and only fails on catalog errors.

mod housekeeping;
mod reconcile;
mod retention;

pub use housekeeping::{Housekeeping, MARKER_RETENTION_DAYS};
pub use reconcile::Reconciler;
pub use retention::RetentionPruner;

use std::path::Path;

use tracing::warn;

use crate::download::signature_path;

/// Remove an artifact and its detached signature. Missing files are fine.
///
/// Returns true if the artifact itself is gone afterwards.
pub(crate) fn remove_artifact(path: &Path) -> bool {
    let removed = remove_file_quietly(path);
    remove_file_quietly(&signature_path(path));
    removed
}

fn remove_file_quietly(path: &Path) -> bool {
    match std::fs::remove_file(path) {
        Ok(()) => true,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to remove file");
            false
        }
    }
}
