//! `desc` parsing.
//!
//! A `desc` file is a sequence of `%KEY%` lines, each followed by its value
//! line(s). Only three keys matter here; everything else is skipped.

use std::path::Path;

use tracing::{debug, warn};

use super::archive::read_desc_entries;
use super::{IndexContent, IndexError, IndexRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Filename,
    Name,
    BuildDate,
}

impl Field {
    fn from_key(line: &str) -> Option<Self> {
        match line {
            "%FILENAME%" => Some(Self::Filename),
            "%NAME%" => Some(Self::Name),
            "%BUILDDATE%" => Some(Self::BuildDate),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum State {
    /// Looking for a key line.
    Key,
    /// The previous line was the key of `Field`; this line is its value.
    Value(Field),
}

#[derive(Debug, Default)]
struct Partial {
    filename: Option<String>,
    name: Option<String>,
    build_date: Option<i64>,
}

impl Partial {
    fn set(&mut self, field: Field, value: &str) {
        if value.is_empty() {
            return;
        }
        match field {
            Field::Filename => self.filename = Some(value.to_string()),
            Field::Name => self.name = Some(value.to_string()),
            Field::BuildDate => {
                if let Ok(date) = value.parse::<i64>() {
                    self.build_date = Some(date);
                }
            }
        }
    }

    fn complete(self) -> Option<(String, IndexRecord)> {
        Some((
            self.filename?,
            IndexRecord {
                name: self.name?,
                build_date: self.build_date?,
            },
        ))
    }
}

/// Parse one `desc` file.
///
/// Returns the artifact filename and its record, or `None` unless all of
/// `%FILENAME%`, `%NAME%` and `%BUILDDATE%` carry a usable value.
pub fn parse_desc(bytes: &[u8]) -> Option<(String, IndexRecord)> {
    let text = String::from_utf8_lossy(bytes);
    let mut state = State::Key;
    let mut partial = Partial::default();

    for line in text.lines().map(str::trim) {
        state = match state {
            State::Key => Field::from_key(line).map_or(State::Key, State::Value),
            State::Value(field) => {
                partial.set(field, line);
                State::Key
            }
        };
    }

    partial.complete()
}

/// Parse the index archive at `path`, then delete it.
///
/// The archive is scratch state: it is removed whether or not parsing
/// succeeds. Incomplete entries are skipped.
pub fn parse_index(path: &Path) -> Result<IndexContent, IndexError> {
    let result = read_desc_entries(path).map(|entries| {
        let mut content = IndexContent::new();
        for (member, bytes) in entries {
            match parse_desc(&bytes) {
                Some((filename, record)) => {
                    content.insert(filename, record);
                }
                None => debug!(member = %member, "Skipping incomplete index entry"),
            }
        }
        content
    });

    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "Failed to remove index archive");
        }
    }

    result
}
