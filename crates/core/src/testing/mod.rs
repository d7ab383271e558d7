//! Testing utilities and mock implementations.
//!
//! This module provides a mock `Downloader` that serves an in-memory origin,
//! plus fixtures that build real sync-database archives, so whole mirror runs
//! can be tested without network access.
//!
//! # Example
//!
//! ```rust,ignore
//! use pacyard_core::testing::{fixtures, MockDownloader};
//!
//! let downloader = MockDownloader::new();
//! let archive = fixtures::index_archive(&[fixtures::entry("foo-1.pkg", "foo", 100)])?;
//! downloader.add_file("https://m.example/core/core.db.tar.gz", archive);
//! downloader.set_last_modified("https://m.example/core/core.db.tar.gz", "Mon, 01 Jan 2024");
//! ```

mod mock_downloader;

pub use mock_downloader::{MockDownloader, RecordedRequest, RequestKind};

/// Test fixtures and helper functions.
pub mod fixtures {
    use flate2::{write::GzEncoder, Compression};

    /// One package record of a sync database.
    #[derive(Debug, Clone)]
    pub struct IndexEntry {
        pub filename: String,
        pub name: String,
        pub build_date: i64,
    }

    /// Create an index entry.
    pub fn entry(filename: &str, name: &str, build_date: i64) -> IndexEntry {
        IndexEntry {
            filename: filename.to_string(),
            name: name.to_string(),
            build_date,
        }
    }

    /// Render the `desc` file of an entry, with the surrounding fields a
    /// real database carries.
    pub fn desc_text(entry: &IndexEntry) -> String {
        format!(
            "%FILENAME%\n{}\n\n%NAME%\n{}\n\n%BASE%\n{}\n\n%VERSION%\n1.0-1\n\n\
             %DESC%\nTest package\n\n%CSIZE%\n1024\n\n%ARCH%\nx86_64\n\n\
             %BUILDDATE%\n{}\n\n%PACKAGER%\nTest <test@example.com>\n\n",
            entry.filename, entry.name, entry.name, entry.build_date
        )
    }

    /// Build a gzip-compressed tar archive from `(path, content)` members.
    ///
    /// Paths ending in `/` become directory entries.
    pub fn archive(members: &[(&str, &str)]) -> std::io::Result<Vec<u8>> {
        let encoder = GzEncoder::new(Vec::new(), Compression::default());
        let mut builder = tar::Builder::new(encoder);

        for (path, content) in members {
            let mut header = tar::Header::new_gnu();
            if path.ends_with('/') {
                header.set_entry_type(tar::EntryType::Directory);
                header.set_mode(0o755);
                header.set_size(0);
                builder.append_data(&mut header, path, std::io::empty())?;
            } else {
                header.set_entry_type(tar::EntryType::Regular);
                header.set_mode(0o644);
                header.set_size(content.len() as u64);
                builder.append_data(&mut header, path, content.as_bytes())?;
            }
        }

        builder.into_inner()?.finish()
    }

    /// Build a sync-database archive (`<repo>.db.tar.gz`) holding `entries`.
    pub fn index_archive(entries: &[IndexEntry]) -> std::io::Result<Vec<u8>> {
        let rendered: Vec<(String, String)> = entries
            .iter()
            .enumerate()
            .flat_map(|(i, e)| {
                let dir = format!("{}-1.0-{}/", e.name, i + 1);
                [
                    (dir.clone(), String::new()),
                    (format!("{}desc", dir), desc_text(e)),
                ]
            })
            .collect();

        let members: Vec<(&str, &str)> = rendered
            .iter()
            .map(|(p, c)| (p.as_str(), c.as_str()))
            .collect();
        archive(&members)
    }
}
