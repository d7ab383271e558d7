//! Reading `desc` members out of a gzip-compressed tar archive.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use flate2::read::GzDecoder;
use tar::Archive;
use tracing::debug;

use super::IndexError;

const DESC_SUFFIX: &str = "/desc";

/// Collect the raw bytes of every `*/desc` member of the archive at `path`.
///
/// A member that cannot be read is skipped; a broken archive stream is an
/// error.
pub fn read_desc_entries(path: &Path) -> Result<Vec<(String, Vec<u8>)>, IndexError> {
    let archive_error = |message: String| IndexError::Archive {
        path: path.display().to_string(),
        message,
    };

    let file = File::open(path)?;
    let mut archive = Archive::new(GzDecoder::new(file));
    let entries = archive.entries().map_err(|e| archive_error(e.to_string()))?;

    let mut descs = Vec::new();
    for entry in entries {
        let mut entry = entry.map_err(|e| archive_error(e.to_string()))?;

        let member = match entry.path() {
            Ok(p) => p.to_string_lossy().into_owned(),
            Err(e) => {
                debug!(error = %e, "Skipping index member with unreadable path");
                continue;
            }
        };
        if !member.ends_with(DESC_SUFFIX) {
            continue;
        }

        let mut bytes = Vec::new();
        if let Err(e) = entry.read_to_end(&mut bytes) {
            debug!(member = %member, error = %e, "Skipping unreadable index member");
            continue;
        }
        descs.push((member, bytes));
    }

    Ok(descs)
}
