//! Configuration file loading, environment overrides and parsing.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use super::model::AppConfig;
use crate::error::ConfigError;
use crate::validation::{report, validate_config, SystemCapabilities};

/// Environment variables that override file settings.
pub const ENV_QUEUE_URL: &str = "SQS_QUEUE_URL";
pub const ENV_REGION: &str = "AWS_REGION";
pub const ENV_STATUS_BASE_URL: &str = "STATUS_API_BASE_URL";
pub const ENV_SCRATCH_DIR: &str = "SCRATCH_DIR";

/// Loads the configuration file from disk and parses it.
pub fn load_from_path(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
        path: path.to_path_buf(),
        source: e,
    })?;

    parse(&content, path)
}

/// Parses YAML configuration content.
pub fn parse(content: &str, path: &Path) -> Result<AppConfig, ConfigError> {
    serde_yaml::from_str(content).map_err(|e| ConfigError::ParseFailed {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Loads the configuration file if present, then applies environment overrides.
///
/// A missing file falls back to defaults so the worker can be configured
/// entirely from the environment.
pub fn load(path: &Path) -> Result<AppConfig, ConfigError> {
    let mut config = if path.exists() {
        load_from_path(path)?
    } else {
        tracing::debug!(path = %path.display(), "Config file not found, using defaults");
        AppConfig::default()
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

/// Applies overrides using the given variable lookup.
pub fn apply_env_overrides<F>(config: &mut AppConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(url) = non_empty(ENV_QUEUE_URL) {
        config.queue.url = url;
    }

    if let Some(region) = non_empty(ENV_REGION) {
        config.queue.region = region.clone();
        config.storage.region = region;
    }

    if let Some(base_url) = non_empty(ENV_STATUS_BASE_URL) {
        config.status.base_url = base_url;
    }

    if let Some(dir) = non_empty(ENV_SCRATCH_DIR) {
        config.global.scratch_dir = PathBuf::from(dir);
    }
}

/// Loads and fully validates the configuration.
pub fn load_and_validate(path: &Path, capabilities: &SystemCapabilities) -> Result<AppConfig> {
    let config = load(path).context("Failed to load configuration")?;

    let result = validate_config(&config, capabilities);

    for issue in result.warnings() {
        tracing::warn!(
            path = %issue.path,
            message = %issue.message,
            suggestion = ?issue.suggestion,
            "Config validation warning"
        );
    }

    if !result.is_valid() {
        tracing::error!("{}", report::format_report(&result));
        anyhow::bail!(ConfigError::ValidationFailed {
            error_count: result.error_count()
        });
    }

    Ok(config)
}
