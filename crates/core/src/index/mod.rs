//! Repository index handling: fetching `<repo>.db.tar.gz` from a mirror and
//! extracting `(filename, name, build date)` records from it.

mod archive;
mod fetcher;
mod parser;

pub use archive::read_desc_entries;
pub use fetcher::{index_file_name, index_url, FetchedIndex, IndexFetch, MetadataFetcher};
pub(crate) use fetcher::join_url;
pub use parser::{parse_desc, parse_index};

use std::collections::BTreeMap;

use thiserror::Error;

use crate::catalog::CatalogError;
use crate::download::DownloadError;

/// Package fields taken from one `desc` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexRecord {
    pub name: String,
    pub build_date: i64,
}

/// Parsed index: artifact filename to its package record.
pub type IndexContent = BTreeMap<String, IndexRecord>;

/// Errors while obtaining or reading an index archive.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Index download failed: {0}")]
    Download(#[from] DownloadError),

    #[error("Failed to read index archive {path}: {message}")]
    Archive { path: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}
