//! Sync planner: drives one repo/mirror pair from index fetch to artifact
//! downloads.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::catalog::{CatalogError, MirrorCatalog, MirroredFile};
use crate::config::{expand_mirror, PathsConfig};
use crate::download::{Downloader, FileFetcher};
use crate::index::{
    join_url, parse_index, FetchedIndex, IndexContent, IndexError, IndexFetch, IndexRecord,
    MetadataFetcher,
};

use super::{FileDecision, MirrorOutcome, PlanSummary};

/// Planner states for one repo/mirror pair.
enum State {
    FetchIndex,
    Parse(FetchedIndex),
    PlanFiles(IndexContent),
    Done(MirrorOutcome),
}

/// Decides, per index record, whether an artifact must be fetched.
pub struct SyncPlanner {
    catalog: Arc<dyn MirrorCatalog>,
    metadata: MetadataFetcher,
    files: FileFetcher,
    paths: PathsConfig,
    arch: String,
    num_versions_to_keep: u32,
}

impl SyncPlanner {
    pub fn new(
        catalog: Arc<dyn MirrorCatalog>,
        downloader: Arc<dyn Downloader>,
        paths: PathsConfig,
        arch: impl Into<String>,
        num_versions_to_keep: u32,
    ) -> Self {
        let metadata = MetadataFetcher::new(
            Arc::clone(&catalog),
            Arc::clone(&downloader),
            paths.scratch_path(),
        );

        Self {
            catalog,
            metadata,
            files: FileFetcher::new(downloader),
            paths,
            arch: arch.into(),
            num_versions_to_keep,
        }
    }

    /// Synchronize `repo` from one mirror template.
    ///
    /// Mirror and transfer problems end in an outcome, never an error; only
    /// a catalog failure is returned as `Err`.
    pub async fn sync_mirror(
        &self,
        repo: &str,
        mirror_template: &str,
        epoch_day: i64,
    ) -> Result<MirrorOutcome, CatalogError> {
        let mut state = State::FetchIndex;

        loop {
            state = match state {
                State::FetchIndex => {
                    match self
                        .metadata
                        .fetch(mirror_template, repo, &self.arch, epoch_day)
                        .await
                    {
                        Ok(IndexFetch::Unchanged) => State::Done(MirrorOutcome::Unchanged),
                        Ok(IndexFetch::Fetched(index)) => self.check_hash(index, epoch_day)?,
                        Err(IndexError::Catalog(e)) => return Err(e),
                        Err(e) => {
                            warn!(repo, mirror = mirror_template, error = %e, "Index fetch failed");
                            State::Done(MirrorOutcome::FetchFailed {
                                reason: e.to_string(),
                            })
                        }
                    }
                }
                State::Parse(index) => match parse_index(&index.path) {
                    Ok(content) => {
                        debug!(repo, entries = content.len(), "Index parsed");
                        State::PlanFiles(content)
                    }
                    Err(e) => {
                        warn!(repo, url = %index.url, error = %e, "Index parse failed");
                        State::Done(MirrorOutcome::ParseFailed {
                            reason: e.to_string(),
                        })
                    }
                },
                State::PlanFiles(content) => {
                    let mut summary = PlanSummary::default();
                    for (filename, record) in &content {
                        let decision = self
                            .plan_file(repo, mirror_template, filename, record)
                            .await?;
                        summary.record(decision);
                    }

                    info!(
                        repo,
                        mirror = mirror_template,
                        entries = summary.entries,
                        mirrored = summary.mirrored,
                        new = summary.new_rows,
                        failed = summary.failed,
                        "Mirror synchronized"
                    );
                    State::Done(MirrorOutcome::Planned(summary))
                }
                State::Done(outcome) => return Ok(outcome),
            };
        }
    }

    /// Content-hash dedup between fetch and parse.
    fn check_hash(&self, index: FetchedIndex, epoch_day: i64) -> Result<State, CatalogError> {
        if self.catalog.has_index_hash(&index.hash)? {
            debug!(url = %index.url, hash = %index.hash, "Skipping index with known content");
            if let Err(e) = std::fs::remove_file(&index.path) {
                debug!(path = %index.path.display(), error = %e, "Failed to remove index archive");
            }
            return Ok(State::Done(MirrorOutcome::KnownIndex));
        }

        self.catalog.record_index_hash(&index.hash, epoch_day)?;
        Ok(State::Parse(index))
    }

    /// Decide and, if needed, fetch one index record.
    async fn plan_file(
        &self,
        repo: &str,
        mirror_template: &str,
        filename: &str,
        record: &IndexRecord,
    ) -> Result<FileDecision, CatalogError> {
        if !self.catalog.is_installed(&record.name)? {
            debug!(filename, "Not installed");
            return Ok(FileDecision::NotInstalled);
        }

        let newer = self
            .catalog
            .count_mirrored_at_or_after(&record.name, record.build_date)?;
        if newer >= self.num_versions_to_keep {
            debug!(filename, newer, "Not a newer version");
            return Ok(FileDecision::NotNewEnough);
        }

        let Some(destination) = self.artifact_path(repo, filename) else {
            warn!(repo, filename, "Refusing index entry with unsafe filename");
            return Ok(FileDecision::InvalidFilename);
        };

        let url = join_url(&expand_mirror(mirror_template, repo, &self.arch), filename);

        let fetched = self.files.fetch_with_signature(&url, &destination).await;
        if !fetched.artifact {
            return Ok(FileDecision::FetchFailed);
        }

        let new_row = self.catalog.upsert_mirrored_file(&MirroredFile {
            name: record.name.clone(),
            filename: filename.to_string(),
            repo: repo.to_string(),
            build_date: record.build_date,
        })?;

        Ok(FileDecision::Mirrored {
            new_row,
            signature: fetched.signature,
        })
    }

    /// Destination of an artifact, or `None` if the name is not a plain file name.
    fn artifact_path(&self, repo: &str, filename: &str) -> Option<PathBuf> {
        let plain = !filename.is_empty()
            && filename != "."
            && filename != ".."
            && !filename.contains(['/', '\\']);
        plain.then(|| self.paths.repo_dir(repo).join(filename))
    }
}
