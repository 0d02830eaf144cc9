//! Encoder availability validation for the fixed output profile.

use crate::encoder::profile::BROWSER_PROFILE;

use super::{SystemCapabilities, ValidationIssue, ValidationResult};

/// Validates that ffmpeg can produce the browser rendition and ffprobe can run.
pub fn validate(capabilities: &SystemCapabilities) -> ValidationResult {
    let mut result = ValidationResult::new();

    if !capabilities
        .available_encoders
        .contains(BROWSER_PROFILE.codec)
    {
        result.add(
            ValidationIssue::error(
                "encoder.ffmpeg_path",
                format!("Audio encoder '{}' is not available", BROWSER_PROFILE.codec),
            )
            .with_suggestion(suggest_build(capabilities)),
        );
    }

    if !capabilities
        .available_muxers
        .contains(BROWSER_PROFILE.container)
    {
        result.add(
            ValidationIssue::error(
                "encoder.ffmpeg_path",
                format!("Muxer '{}' is not available", BROWSER_PROFILE.container),
            )
            .with_suggestion("Install an ffmpeg build with MP4/m4a muxing support"),
        );
    }

    if !capabilities.ffprobe_available {
        result.add(
            ValidationIssue::error("encoder.ffprobe_path", "ffprobe could not be executed")
                .with_suggestion("Install ffprobe or point encoder.ffprobe_path at it"),
        );
    }

    result
}

/// Suggests a fix when the AAC encoder is missing.
fn suggest_build(capabilities: &SystemCapabilities) -> String {
    if capabilities.available_encoders.is_empty() {
        "ffmpeg reported no encoders; check encoder.ffmpeg_path".to_string()
    } else {
        "Install an ffmpeg build that includes the native AAC encoder".to_string()
    }
}
