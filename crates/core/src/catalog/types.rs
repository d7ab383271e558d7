//! Types for the mirror catalog.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const SECONDS_PER_DAY: i64 = 24 * 3600;

/// A package installed on the reference machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledPackage {
    /// Package name (unique).
    pub name: String,
    /// Repository the package comes from.
    pub repo: String,
}

impl InstalledPackage {
    pub fn new(name: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            repo: repo.into(),
        }
    }
}

/// One retained package build present in a repo directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirroredFile {
    /// Package name. Several builds may share it.
    pub name: String,
    /// Artifact file name (unique).
    pub filename: String,
    /// Repository directory holding the artifact.
    pub repo: String,
    /// Build date from the index, unix epoch seconds.
    pub build_date: i64,
}

/// Number of marker rows removed by housekeeping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerPruneCount {
    pub index_hashes: usize,
    pub index_downloads: usize,
}

/// Catalog statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogStats {
    pub installed_packages: u64,
    pub mirrored_files: u64,
    pub index_hashes: u64,
    pub index_downloads: u64,
}

/// Days since the unix epoch, as stored in marker rows.
pub fn epoch_day(at: DateTime<Utc>) -> i64 {
    at.timestamp().div_euclid(SECONDS_PER_DAY)
}

/// Errors for catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
