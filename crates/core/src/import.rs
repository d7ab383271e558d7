//! Installed-package import.
//!
//! Reference machines publish their package lists as
//! `packages_<REPO>_<HOST>.txt` files in the work directory, one package
//! name per line. An import replaces the installed package list with the
//! union of all such files.

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex_lite::Regex;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::catalog::{CatalogError, InstalledPackage, MirrorCatalog};
use crate::config::PathsConfig;

static IMPORT_FILE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^packages_([^_.]+)(?:_.*)?\.txt$").expect("valid import file pattern")
});

/// Errors raised by an import. All of them abort the import.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create repo directory {path}: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// What an import did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    /// Import files read, in processing order.
    pub files: Vec<PathBuf>,
    /// Distinct installed package names after the import.
    pub packages: usize,
    /// Distinct repos named by the import files.
    pub repos: Vec<String>,
    /// Mirrored file rows dropped because their package is gone.
    pub cascaded: usize,
}

/// Repo encoded in an import file name, if the name is an import file.
pub fn import_file_repo(file_name: &str) -> Option<&str> {
    IMPORT_FILE
        .captures(file_name)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Import files in `dir` with their repo, sorted by file name.
pub fn find_import_files(dir: &Path) -> Result<Vec<(PathBuf, String)>, ImportError> {
    let read_err = |source| ImportError::Read {
        path: dir.to_path_buf(),
        source,
    };

    let mut found = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(read_err)? {
        let entry = entry.map_err(read_err)?;
        let file_name = entry.file_name();
        let Some(repo) = file_name.to_str().and_then(import_file_repo) else {
            continue;
        };
        found.push((entry.path(), repo.to_string()));
    }

    found.sort();
    Ok(found)
}

/// Package names listed in an import file: trimmed, blank lines dropped.
pub fn read_package_list(path: &Path) -> Result<Vec<String>, ImportError> {
    let text = std::fs::read_to_string(path).map_err(|source| ImportError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

/// Replace the installed package list from the import files in `work_dir`.
///
/// Each named repo gets its directory created. When a package appears in
/// several files, the first file in name order decides its repo.
pub fn import_installed(
    catalog: &dyn MirrorCatalog,
    paths: &PathsConfig,
) -> Result<ImportSummary, ImportError> {
    let files = find_import_files(&paths.work_dir)?;
    if files.is_empty() {
        warn!(dir = %paths.work_dir.display(), "No package list files found");
    }

    let mut summary = ImportSummary::default();
    let mut entries = Vec::new();

    for (path, repo) in files {
        let names = read_package_list(&path)?;
        debug!(file = %path.display(), repo = %repo, packages = names.len(), "Read package list");

        if !summary.repos.contains(&repo) {
            let dir = paths.repo_dir(&repo);
            std::fs::create_dir_all(&dir)
                .map_err(|source| ImportError::Directory { path: dir, source })?;
            summary.repos.push(repo.clone());
        }

        for name in names {
            entries.push(InstalledPackage::new(name, &repo));
        }
        summary.files.push(path);
    }

    summary.cascaded = catalog.replace_installed(&entries)?;
    summary.packages = catalog.list_installed()?.len();
    summary.repos.sort();

    info!(
        files = summary.files.len(),
        packages = summary.packages,
        repos = summary.repos.len(),
        cascaded = summary.cascaded,
        "Imported installed packages"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{MirroredFile, SqliteMirrorCatalog};
    use tempfile::TempDir;

    fn paths(work: &TempDir) -> PathsConfig {
        PathsConfig::default().with_work_dir(work.path())
    }

    #[test]
    fn test_import_file_repo() {
        assert_eq!(import_file_repo("packages_core_desktop.txt"), Some("core"));
        assert_eq!(
            import_file_repo("packages_extra_host_with_underscores.txt"),
            Some("extra")
        );
        assert_eq!(import_file_repo("packages_multilib.txt"), Some("multilib"));
        assert_eq!(import_file_repo("packages__host.txt"), None);
        assert_eq!(import_file_repo("packages_core_host.txt.bak"), None);
        assert_eq!(import_file_repo("pkglist_core_host.txt"), None);
    }

    #[test]
    fn test_read_package_list_trims_and_skips_blank_lines() {
        let work = TempDir::new().unwrap();
        let path = work.path().join("packages_core_a.txt");
        std::fs::write(&path, "bash\n  glibc \n\n\t\nlinux\r\n").unwrap();

        assert_eq!(
            read_package_list(&path).unwrap(),
            vec!["bash", "glibc", "linux"]
        );
    }

    #[test]
    fn test_import_replaces_installed_and_creates_repo_dirs() {
        let work = TempDir::new().unwrap();
        std::fs::write(work.path().join("packages_core_a.txt"), "bash\nglibc\n").unwrap();
        std::fs::write(work.path().join("packages_core_b.txt"), "bash\nlinux\n").unwrap();
        std::fs::write(work.path().join("packages_extra_a.txt"), "firefox\n").unwrap();
        std::fs::write(work.path().join("notes.txt"), "ignored\n").unwrap();
        let catalog = SqliteMirrorCatalog::in_memory().unwrap();
        catalog
            .replace_installed(&[InstalledPackage::new("stale", "core")])
            .unwrap();

        let summary = import_installed(&catalog, &paths(&work)).unwrap();

        assert_eq!(summary.files.len(), 3);
        assert_eq!(summary.packages, 4);
        assert_eq!(summary.repos, vec!["core", "extra"]);
        assert!(work.path().join("core").is_dir());
        assert!(work.path().join("extra").is_dir());
        assert!(!catalog.is_installed("stale").unwrap());
        assert_eq!(catalog.list_repos().unwrap(), vec!["core", "extra"]);
    }

    #[test]
    fn test_import_cascades_to_mirrored_files() {
        let work = TempDir::new().unwrap();
        std::fs::write(work.path().join("packages_core_a.txt"), "foo\n").unwrap();
        let catalog = SqliteMirrorCatalog::in_memory().unwrap();
        catalog
            .replace_installed(&[
                InstalledPackage::new("foo", "core"),
                InstalledPackage::new("bar", "core"),
            ])
            .unwrap();
        catalog
            .upsert_mirrored_file(&MirroredFile {
                name: "bar".to_string(),
                filename: "bar-1.pkg".to_string(),
                repo: "core".to_string(),
                build_date: 1,
            })
            .unwrap();

        let summary = import_installed(&catalog, &paths(&work)).unwrap();

        assert_eq!(summary.cascaded, 1);
        assert!(!catalog.has_mirrored_file("bar-1.pkg").unwrap());
    }

    #[test]
    fn test_import_fails_when_repo_dir_cannot_be_created() {
        let work = TempDir::new().unwrap();
        std::fs::write(work.path().join("packages_core_a.txt"), "foo\n").unwrap();
        std::fs::write(work.path().join("core"), "a file in the way").unwrap();
        let catalog = SqliteMirrorCatalog::in_memory().unwrap();

        let result = import_installed(&catalog, &paths(&work));

        assert!(matches!(result, Err(ImportError::Directory { .. })));
        assert!(catalog.list_installed().unwrap().is_empty());
    }
}
