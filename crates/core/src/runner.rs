//! Mirror runner: one complete, ordered mirror update.
//!
//! A run goes through these steps:
//!
//! 1. drop catalog rows whose artifact is missing on disk
//! 2. read the repos of the installed packages and create their directories
//! 3. synchronize every repo from each of its mirrors
//! 4. expire old index markers
//! 5. prune builds beyond the retention cap
//! 6. delete files that no catalog row names, in every repo directory that
//!    is installed, configured or still holds mirrored files
//!
//! Only a [`RunError`] stops a run; mirror and transfer problems are logged
//! and reported in the [`RunReport`].

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::catalog::{
    CatalogError, CatalogStats, MarkerPruneCount, MirrorCatalog, SqliteMirrorCatalog,
};
use crate::config::{validate_config, Config, ConfigError};
use crate::download::Downloader;
use crate::import::{import_installed, ImportError, ImportSummary};
use crate::maintenance::{Housekeeping, Reconciler, RetentionPruner};
use crate::sync::{MirrorOutcome, PlanSummary, SyncPlanner};

/// Errors that abort a run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("Catalog unavailable: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Failed to create directory {path}: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Import failed: {0}")]
    Import(#[from] ImportError),
}

/// Totals of one run, logged at the end.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub repos: usize,
    /// Repos with installed packages but no configured mirror.
    pub repos_without_mirrors: Vec<String>,
    pub mirrors: usize,
    pub mirrors_unchanged: usize,
    pub mirrors_known_index: usize,
    pub mirrors_failed: usize,
    pub files: PlanSummary,
    pub rows_without_file: usize,
    pub pruned_builds: usize,
    pub orphan_files: usize,
    pub expired_markers: MarkerPruneCount,
    pub catalog: CatalogStats,
}

impl RunReport {
    fn record(&mut self, outcome: &MirrorOutcome) {
        self.mirrors += 1;
        if outcome.is_failure() {
            self.mirrors_failed += 1;
            return;
        }
        match outcome {
            MirrorOutcome::Unchanged => self.mirrors_unchanged += 1,
            MirrorOutcome::KnownIndex => self.mirrors_known_index += 1,
            MirrorOutcome::Planned(summary) => self.files.merge(summary),
            MirrorOutcome::FetchFailed { .. } | MirrorOutcome::ParseFailed { .. } => {}
        }
    }
}

/// Runs mirror updates and imports against one catalog.
pub struct MirrorRunner {
    config: Config,
    catalog: Arc<dyn MirrorCatalog>,
    downloader: Arc<dyn Downloader>,
}

impl MirrorRunner {
    pub fn new(
        config: Config,
        catalog: Arc<dyn MirrorCatalog>,
        downloader: Arc<dyn Downloader>,
    ) -> Self {
        Self {
            config,
            catalog,
            downloader,
        }
    }

    /// Validate `config`, create the work directory and open the catalog
    /// file inside it.
    pub fn open(config: Config, downloader: Arc<dyn Downloader>) -> Result<Self, RunError> {
        validate_config(&config)?;
        create_dir(&config.paths.work_dir)?;

        let database = config.paths.database_path();
        let catalog = SqliteMirrorCatalog::new(&database)?;
        info!(database = %database.display(), "Catalog opened");

        Ok(Self::new(config, Arc::new(catalog), downloader))
    }

    pub fn catalog(&self) -> &Arc<dyn MirrorCatalog> {
        &self.catalog
    }

    /// Replace the installed package list from the work directory's import files.
    pub fn import(&self) -> Result<ImportSummary, RunError> {
        Ok(import_installed(self.catalog.as_ref(), &self.config.paths)?)
    }

    /// Perform one full mirror update. `today` is the current epoch day.
    pub async fn run(&self, today: i64) -> Result<RunReport, RunError> {
        let paths = &self.config.paths;
        let keep = self.config.options.num_versions_to_keep;
        let reconciler = Reconciler::new(Arc::clone(&self.catalog), paths.clone());
        let mut report = RunReport::default();

        report.rows_without_file = reconciler.prune_missing_files()?;

        let repos = self.catalog.list_repos()?;
        report.repos = repos.len();
        for repo in &repos {
            create_dir(&paths.repo_dir(repo))?;
        }
        create_dir(&paths.scratch_path())?;

        let planner = SyncPlanner::new(
            Arc::clone(&self.catalog),
            Arc::clone(&self.downloader),
            paths.clone(),
            self.config.options.arch.clone(),
            keep,
        );

        for repo in &repos {
            let mirrors = self.config.mirrors_for(repo);
            if mirrors.is_empty() {
                warn!(repo = %repo, "No mirrors configured, skipping repo");
                report.repos_without_mirrors.push(repo.clone());
                continue;
            }

            for mirror in &mirrors {
                debug!(repo = %repo, mirror = %mirror, "Synchronizing");
                let outcome = planner.sync_mirror(repo, mirror, today).await?;
                report.record(&outcome);
            }
        }

        report.expired_markers = Housekeeping::new(Arc::clone(&self.catalog)).run(today)?;
        report.pruned_builds =
            RetentionPruner::new(Arc::clone(&self.catalog), paths.clone(), keep).prune()?;
        report.orphan_files = reconciler.prune_orphan_files(&self.known_repos(&repos)?)?;
        report.catalog = self.catalog.stats()?;

        info!(
            installed = report.catalog.installed_packages,
            mirrored = report.catalog.mirrored_files,
            repos = report.repos,
            mirrors = report.mirrors,
            mirrors_failed = report.mirrors_failed,
            new_files = report.files.new_rows,
            failed_files = report.files.failed,
            pruned = report.pruned_builds,
            orphans = report.orphan_files,
            "Mirror run complete"
        );
        Ok(report)
    }

    /// Repos whose directory may hold artifacts: installed ones, configured
    /// ones and those still named by a mirrored file row.
    fn known_repos(&self, installed: &[String]) -> Result<Vec<String>, CatalogError> {
        let mut repos: BTreeSet<String> = installed.iter().cloned().collect();
        repos.extend(self.config.repos.keys().cloned());
        repos.extend(
            self.catalog
                .list_mirrored_files()?
                .into_iter()
                .map(|file| file.repo),
        );
        Ok(repos.into_iter().collect())
    }
}

fn create_dir(path: &Path) -> Result<(), RunError> {
    std::fs::create_dir_all(path).map_err(|source| RunError::Directory {
        path: path.to_path_buf(),
        source,
    })
}
