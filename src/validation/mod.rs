//! Configuration validation system.

pub mod codec;
pub mod paths;
pub mod report;
pub mod semantic;

use std::collections::HashSet;
use std::path::Path;

use crate::config::model::{AppConfig, EncoderConfig};
use crate::error::CapabilityError;

/// Severity level for validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationSeverity {
    /// Blocks configuration loading.
    Error,
    /// Logged but allows loading.
    Warning,
}

/// A validation issue found during configuration checking.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Severity of the issue.
    pub severity: ValidationSeverity,
    /// Path to the problematic config field (e.g., "storage.processed_prefix").
    pub path: String,
    /// Description of the issue.
    pub message: String,
    /// Optional suggestion for fixing the issue.
    pub suggestion: Option<String>,
}

impl ValidationIssue {
    /// Creates a new error-level validation issue.
    pub fn error(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: ValidationSeverity::Error,
            path: path.into(),
            message: message.into(),
            suggestion: None,
        }
    }

    /// Creates a new warning-level validation issue.
    pub fn warning(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: ValidationSeverity::Warning,
            path: path.into(),
            message: message.into(),
            suggestion: None,
        }
    }

    /// Adds a suggestion to this validation issue.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

/// Result of validating a configuration.
#[derive(Debug, Default)]
pub struct ValidationResult {
    issues: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// Creates an empty validation result.
    pub fn new() -> Self {
        Self { issues: Vec::new() }
    }

    /// Adds an issue to the result.
    pub fn add(&mut self, issue: ValidationIssue) {
        self.issues.push(issue);
    }

    /// Extends the result with issues from another result.
    pub fn extend(&mut self, other: ValidationResult) {
        self.issues.extend(other.issues);
    }

    /// Returns true if there are no errors (warnings are allowed).
    pub fn is_valid(&self) -> bool {
        !self.issues.iter().any(|i| i.severity == ValidationSeverity::Error)
    }

    /// Returns an iterator over error-level issues.
    pub fn errors(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues
            .iter()
            .filter(|i| i.severity == ValidationSeverity::Error)
    }

    /// Returns an iterator over warning-level issues.
    pub fn warnings(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues
            .iter()
            .filter(|i| i.severity == ValidationSeverity::Warning)
    }

    /// Returns the number of errors.
    pub fn error_count(&self) -> usize {
        self.errors().count()
    }
}

/// Encoder capabilities detected at startup.
#[derive(Debug, Clone, Default)]
pub struct SystemCapabilities {
    /// Available FFmpeg encoders.
    pub available_encoders: HashSet<String>,
    /// Available FFmpeg muxers.
    pub available_muxers: HashSet<String>,
    /// Whether ffprobe could be executed.
    pub ffprobe_available: bool,
}

impl SystemCapabilities {
    /// Detects capabilities by querying the configured ffmpeg and ffprobe.
    pub fn detect(encoder: &EncoderConfig) -> Result<Self, CapabilityError> {
        let available_encoders = query_ffmpeg_list(&encoder.ffmpeg_path, "-encoders")?;
        let available_muxers = query_ffmpeg_list(&encoder.ffmpeg_path, "-muxers")?;
        let ffprobe_available = std::process::Command::new(&encoder.ffprobe_path)
            .arg("-version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false);

        Ok(Self {
            available_encoders,
            available_muxers,
            ffprobe_available,
        })
    }
}

/// Runs `ffmpeg <flag> -hide_banner` and collects the listed names.
fn query_ffmpeg_list(ffmpeg: &Path, flag: &str) -> Result<HashSet<String>, CapabilityError> {
    let command = format!("{} {}", ffmpeg.display(), flag);

    let output = std::process::Command::new(ffmpeg)
        .args([flag, "-hide_banner"])
        .output()
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => CapabilityError::ToolNotFound {
                tool: ffmpeg.display().to_string(),
            },
            _ => CapabilityError::CommandFailed {
                command: command.clone(),
                message: e.to_string(),
            },
        })?;

    if !output.status.success() {
        return Err(CapabilityError::CommandFailed {
            command,
            message: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }

    Ok(parse_ffmpeg_list(&String::from_utf8_lossy(&output.stdout)))
}

/// Parses `ffmpeg -encoders` / `ffmpeg -muxers` output into a set of names.
fn parse_ffmpeg_list(output: &str) -> HashSet<String> {
    let mut names = HashSet::new();
    let mut in_table = false;

    for line in output.lines() {
        let trimmed = line.trim();

        // The legend ends with a dashed separator line
        if trimmed.starts_with("--") {
            in_table = true;
            continue;
        }
        if !in_table || trimmed.is_empty() {
            continue;
        }

        // " A....D aac   AAC (Advanced Audio Coding)" or " E ipod   iPod H.264 MP4"
        let mut parts = trimmed.split_whitespace();
        if let (Some(_flags), Some(name)) = (parts.next(), parts.next()) {
            for n in name.split(',') {
                names.insert(n.to_string());
            }
        }
    }

    names
}

/// Validates the configuration against system capabilities.
pub fn validate_config(config: &AppConfig, capabilities: &SystemCapabilities) -> ValidationResult {
    let mut result = ValidationResult::new();

    result.extend(semantic::validate(config));
    result.extend(codec::validate(capabilities));
    result.extend(paths::validate(config));

    result
}
