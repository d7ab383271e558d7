pub mod catalog;
pub mod config;
pub mod download;
pub mod import;
pub mod index;
pub mod maintenance;
pub mod runner;
pub mod sync;
pub mod testing;
pub mod xfer;

pub use catalog::{epoch_day, CatalogError, MirrorCatalog, SqliteMirrorCatalog};
pub use config::{load_config, load_config_from_str, validate_config, Config, ConfigError};
pub use download::{DownloadError, Downloader, HttpDownloader};
pub use import::{ImportError, ImportSummary};
pub use runner::{MirrorRunner, RunError, RunReport};
pub use sync::{FileDecision, MirrorOutcome, SyncPlanner};
pub use xfer::{Xfer, XferSource};
