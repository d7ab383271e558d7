use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Retention cap used when `num_versions_to_keep` is missing or unusable.
pub const DEFAULT_VERSIONS_TO_KEEP: u32 = 3;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub options: OptionsConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub download: DownloadConfig,
    /// Shared mirror templates, pulled in by repos with `include_mirrorlist`.
    #[serde(default)]
    pub mirrorlist: Vec<String>,
    #[serde(default)]
    pub repos: BTreeMap<String, RepoConfig>,
    #[serde(default)]
    pub xfer: Option<XferConfig>,
}

impl Config {
    /// Ordered, de-duplicated mirror templates for a repo.
    ///
    /// The repo's own servers come first, followed by the shared mirrorlist
    /// when the repo includes it. Unknown repos have no mirrors.
    pub fn mirrors_for(&self, repo: &str) -> Vec<String> {
        let Some(repo_config) = self.repos.get(repo) else {
            return Vec::new();
        };

        let shared: &[String] = if repo_config.include_mirrorlist {
            &self.mirrorlist
        } else {
            &[]
        };

        let mut mirrors: Vec<String> = Vec::new();
        for server in repo_config.servers.iter().chain(shared) {
            if !mirrors.contains(server) {
                mirrors.push(server.clone());
            }
        }
        mirrors
    }
}

/// Substitute the `$repo` and `$arch` placeholders of a mirror template.
pub fn expand_mirror(template: &str, repo: &str, arch: &str) -> String {
    template.replace("$repo", repo).replace("$arch", arch)
}

/// Global options
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OptionsConfig {
    /// Architecture substituted for `$arch` in mirror templates.
    pub arch: String,
    /// Maximum number of builds kept per package name.
    #[serde(
        default = "default_versions_to_keep",
        deserialize_with = "deserialize_versions_to_keep"
    )]
    pub num_versions_to_keep: u32,
}

fn default_versions_to_keep() -> u32 {
    DEFAULT_VERSIONS_TO_KEEP
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawVersionsToKeep {
    Count(i64),
    Text(String),
    Other(serde::de::IgnoredAny),
}

/// Accepts anything; falls back to the default instead of failing the load.
fn deserialize_versions_to_keep<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let count = match RawVersionsToKeep::deserialize(deserializer)? {
        RawVersionsToKeep::Count(n) => Some(n),
        RawVersionsToKeep::Text(s) => s.trim().parse::<i64>().ok(),
        RawVersionsToKeep::Other(_) => None,
    };

    Ok(count
        .filter(|n| *n >= 1)
        .and_then(|n| u32::try_from(n).ok())
        .unwrap_or(DEFAULT_VERSIONS_TO_KEEP))
}

/// Filesystem layout
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PathsConfig {
    /// Root of the mirror: repo subdirectories, scratch dir and import files.
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,
    /// Catalog database file, relative to `work_dir` unless absolute.
    #[serde(default = "default_database")]
    pub database: PathBuf,
    /// Scratch directory for index archives, relative to `work_dir` unless absolute.
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            work_dir: default_work_dir(),
            database: default_database(),
            scratch_dir: default_scratch_dir(),
        }
    }
}

impl PathsConfig {
    pub fn database_path(&self) -> PathBuf {
        self.work_dir.join(&self.database)
    }

    pub fn scratch_path(&self) -> PathBuf {
        self.work_dir.join(&self.scratch_dir)
    }

    /// Directory holding the artifacts of one repo.
    pub fn repo_dir(&self, repo: &str) -> PathBuf {
        self.work_dir.join(repo)
    }

    pub fn with_work_dir(mut self, work_dir: &Path) -> Self {
        self.work_dir = work_dir.to_path_buf();
        self
    }
}

fn default_work_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_database() -> PathBuf {
    PathBuf::from("pacyard.db")
}

fn default_scratch_dir() -> PathBuf {
    PathBuf::from("tmp")
}

/// Transfer settings for the HTTP downloader
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DownloadConfig {
    /// Whole-transfer timeout in seconds (default: 300)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Connection timeout in seconds (default: 5)
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

fn default_timeout() -> u64 {
    300
}

fn default_connect_timeout() -> u64 {
    5
}

/// Per-repo mirror configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RepoConfig {
    /// Mirror templates specific to this repo, tried in order.
    #[serde(default)]
    pub servers: Vec<String>,
    /// Append the shared `mirrorlist` after `servers`.
    #[serde(default)]
    pub include_mirrorlist: bool,
}

/// Settings for the `xfer` helper
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct XferConfig {
    /// Base URL under which the local mirror serves `<repo>/<file>`.
    pub local_mirror: String,
}
