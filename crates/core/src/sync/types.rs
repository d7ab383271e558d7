//! Outcome types for mirror synchronization.

use serde::Serialize;

/// What happened to one index record during planning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FileDecision {
    /// The package is not installed on the reference machine.
    NotInstalled,
    /// Enough builds at least this new are already kept.
    NotNewEnough,
    /// The filename would escape the repo directory.
    InvalidFilename,
    /// The artifact is on disk and recorded in the catalog.
    Mirrored {
        /// False when a row for this filename already existed.
        new_row: bool,
        /// Whether the detached signature is on disk too.
        signature: bool,
    },
    /// The artifact transfer failed; nothing was recorded.
    FetchFailed,
}

/// Tally of file decisions for one index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PlanSummary {
    pub entries: usize,
    pub not_installed: usize,
    pub not_new_enough: usize,
    pub invalid: usize,
    pub mirrored: usize,
    pub new_rows: usize,
    pub missing_signatures: usize,
    pub failed: usize,
}

impl PlanSummary {
    pub fn record(&mut self, decision: FileDecision) {
        self.entries += 1;
        match decision {
            FileDecision::NotInstalled => self.not_installed += 1,
            FileDecision::NotNewEnough => self.not_new_enough += 1,
            FileDecision::InvalidFilename => self.invalid += 1,
            FileDecision::Mirrored { new_row, signature } => {
                self.mirrored += 1;
                if new_row {
                    self.new_rows += 1;
                }
                if !signature {
                    self.missing_signatures += 1;
                }
            }
            FileDecision::FetchFailed => self.failed += 1,
        }
    }

    /// Add another summary's counts to this one.
    pub fn merge(&mut self, other: &PlanSummary) {
        self.entries += other.entries;
        self.not_installed += other.not_installed;
        self.not_new_enough += other.not_new_enough;
        self.invalid += other.invalid;
        self.mirrored += other.mirrored;
        self.new_rows += other.new_rows;
        self.missing_signatures += other.missing_signatures;
        self.failed += other.failed;
    }
}

/// Final state of one repo/mirror pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MirrorOutcome {
    /// The origin timestamp matches the recorded download marker.
    Unchanged,
    /// An index with identical content was already processed.
    KnownIndex,
    /// The index could not be downloaded.
    FetchFailed { reason: String },
    /// The index archive could not be read.
    ParseFailed { reason: String },
    /// The index was planned file by file.
    Planned(PlanSummary),
}

impl MirrorOutcome {
    /// True for outcomes that indicate a mirror problem rather than "nothing new".
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::FetchFailed { .. } | Self::ParseFailed { .. })
    }
}
