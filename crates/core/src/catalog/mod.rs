//! Mirror catalog - the durable record of what should be and what is mirrored.
//!
//! The catalog owns four tables: installed packages (what to mirror),
//! mirrored files (what is on disk), and two kinds of index markers used
//! only to skip redundant network work. No other component writes them.

mod sqlite;
mod types;

pub use sqlite::SqliteMirrorCatalog;
pub use types::*;

/// Trait for mirror catalog storage.
///
/// Every mutating call commits before returning.
pub trait MirrorCatalog: Send + Sync {
    /// Replace the installed package list wholesale.
    ///
    /// Afterwards every mirrored file whose package name is no longer
    /// installed is deleted. Returns the number of mirrored rows removed
    /// by that cascade.
    fn replace_installed(&self, entries: &[InstalledPackage]) -> Result<usize, CatalogError>;

    /// All installed packages, ordered by name.
    fn list_installed(&self) -> Result<Vec<InstalledPackage>, CatalogError>;

    /// Distinct repos of the installed packages, ordered by name.
    fn list_repos(&self) -> Result<Vec<String>, CatalogError>;

    /// Check if a package name is installed.
    fn is_installed(&self, name: &str) -> Result<bool, CatalogError>;

    /// Check if a mirrored file row exists for `filename`.
    fn has_mirrored_file(&self, filename: &str) -> Result<bool, CatalogError>;

    /// Count mirrored builds of `name` with a build date at or after `build_date`.
    fn count_mirrored_at_or_after(&self, name: &str, build_date: i64) -> Result<u32, CatalogError>;

    /// Insert a mirrored file unless a row with the same filename exists.
    ///
    /// Existing rows are never overwritten. Returns true if a row was inserted.
    fn upsert_mirrored_file(&self, file: &MirroredFile) -> Result<bool, CatalogError>;

    /// All mirrored files, grouped by name with the newest build first.
    ///
    /// Equal build dates keep insertion order.
    fn list_mirrored_files(&self) -> Result<Vec<MirroredFile>, CatalogError>;

    /// Remove a mirrored file row. Returns true if a row existed.
    fn delete_mirrored_file(&self, filename: &str) -> Result<bool, CatalogError>;

    /// Remember that an index archive with this content hash was processed.
    fn record_index_hash(&self, hash: &str, epoch_day: i64) -> Result<(), CatalogError>;

    fn has_index_hash(&self, hash: &str) -> Result<bool, CatalogError>;

    /// Remember the origin timestamp under which an index URL was downloaded.
    ///
    /// A URL keeps a single marker; a newer timestamp replaces the old one.
    fn record_index_download(
        &self,
        url: &str,
        timestamp: &str,
        epoch_day: i64,
    ) -> Result<(), CatalogError>;

    fn has_index_download(&self, url: &str, timestamp: &str) -> Result<bool, CatalogError>;

    /// Delete markers of both kinds whose epoch day is below `cutoff`.
    fn prune_markers_older_than(&self, cutoff: i64) -> Result<MarkerPruneCount, CatalogError>;

    /// Get catalog statistics.
    fn stats(&self) -> Result<CatalogStats, CatalogError>;
}
