//! Configuration loading.
//!
//! The TOML file is read first, then environment variables prefixed with
//! `PACYARD_` are layered on top. Nested keys are separated by a double
//! underscore so that keys containing single underscores stay reachable:
//! `PACYARD_OPTIONS__NUM_VERSIONS_TO_KEEP=5` sets `options.num_versions_to_keep`
//! and `PACYARD_PATHS__WORK_DIR=/srv/mirror` sets `paths.work_dir`.

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

const ENV_PREFIX: &str = "PACYARD_";
const ENV_NESTING: &str = "__";

/// Load `path` and apply `PACYARD_` environment overrides.
///
/// A missing file is reported as [`ConfigError::FileNotFound`] so callers
/// that can run without a configuration may fall back to defaults.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split(ENV_NESTING))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Parse a TOML document without environment overrides.
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}
