//! Path validation for the scratch directory.

use std::path::Path;

use crate::config::model::AppConfig;

use super::{ValidationIssue, ValidationResult};

/// Validates that the scratch directory is usable.
pub fn validate(config: &AppConfig) -> ValidationResult {
    let mut result = ValidationResult::new();

    validate_directory_writable(&config.global.scratch_dir, "global.scratch_dir", &mut result);

    result
}

/// Validates that a directory exists (or can be created) and is writable.
fn validate_directory_writable(path: &Path, config_path: &str, result: &mut ValidationResult) {
    if !path.exists() {
        if let Err(e) = std::fs::create_dir_all(path) {
            result.add(
                ValidationIssue::error(
                    config_path,
                    format!("Cannot create directory '{}': {}", path.display(), e),
                )
                .with_suggestion("Create the directory or update the path"),
            );
        }
        return;
    }

    if !path.is_dir() {
        result.add(ValidationIssue::error(
            config_path,
            format!("Path is not a directory: '{}'", path.display()),
        ));
        return;
    }

    let probe = path.join(format!(".write_probe_{}", uuid::Uuid::new_v4()));
    match std::fs::write(&probe, b"") {
        Ok(()) => {
            let _ = std::fs::remove_file(&probe);
        }
        Err(e) => {
            result.add(
                ValidationIssue::error(
                    config_path,
                    format!("Directory is not writable: '{}': {}", path.display(), e),
                )
                .with_suggestion("Check permissions on the scratch directory"),
            );
        }
    }
}
