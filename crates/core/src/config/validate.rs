use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Arch is not empty
/// - Every repo server template is non-empty
/// - Download timeout is not 0
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.options.arch.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "options.arch cannot be empty".to_string(),
        ));
    }

    if config.mirrorlist.iter().any(|m| m.trim().is_empty()) {
        return Err(ConfigError::ValidationError(
            "mirrorlist contains an empty server".to_string(),
        ));
    }

    for (repo, repo_config) in &config.repos {
        if repo_config.servers.iter().any(|s| s.trim().is_empty()) {
            return Err(ConfigError::ValidationError(format!(
                "repos.{}.servers contains an empty server",
                repo
            )));
        }
    }

    if config.download.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "download.timeout_secs cannot be 0".to_string(),
        ));
    }

    Ok(())
}
