//! FFprobe wrapper for media analysis.

use std::path::Path;
use std::process::Stdio;

use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::debug;

use crate::error::EncoderError;

/// General media file information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaInfo {
    /// Container format.
    pub format: String,
    /// Duration in seconds.
    pub duration: f64,
    /// Overall bitrate in bits per second.
    pub bitrate: u64,
    /// Number of audio streams.
    pub audio_streams: usize,
}

/// Probes a media file using ffprobe.
pub async fn probe(ffprobe: &Path, path: &Path) -> Result<MediaInfo, EncoderError> {
    let output = Command::new(ffprobe)
        .args(["-v", "error", "-print_format", "json", "-show_format", "-show_streams"])
        .arg(path)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| EncoderError::ProbeFailed {
            path: path.to_path_buf(),
            message: format!("Failed to run ffprobe: {}", e),
        })?;

    if !output.status.success() {
        return Err(EncoderError::ProbeFailed {
            path: path.to_path_buf(),
            message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    let json: serde_json::Value =
        serde_json::from_slice(&output.stdout).map_err(|e| EncoderError::ProbeFailed {
            path: path.to_path_buf(),
            message: format!("Failed to parse ffprobe output: {}", e),
        })?;

    let info = parse_probe_output(&json).ok_or_else(|| EncoderError::ProbeFailed {
        path: path.to_path_buf(),
        message: "Missing format in ffprobe output".to_string(),
    })?;

    debug!(path = %path.display(), duration = info.duration, format = %info.format, "Probed input");
    Ok(info)
}

/// Returns the total duration of a media file in seconds.
pub async fn probe_duration(ffprobe: &Path, path: &Path) -> Result<f64, EncoderError> {
    let info = probe(ffprobe, path).await?;

    if info.audio_streams == 0 {
        return Err(EncoderError::ProbeFailed {
            path: path.to_path_buf(),
            message: "No audio stream found".to_string(),
        });
    }

    Ok(info.duration)
}

/// Parses ffprobe JSON output into structured data.
fn parse_probe_output(json: &serde_json::Value) -> Option<MediaInfo> {
    let format = json.get("format")?;
    let streams = json.get("streams").and_then(|s| s.as_array());

    // Container duration is missing for some raw streams; fall back to the longest audio stream
    let stream_duration = streams
        .into_iter()
        .flatten()
        .filter(|s| s.get("codec_type").and_then(|v| v.as_str()) == Some("audio"))
        .filter_map(|s| parse_seconds(s.get("duration")))
        .fold(None, |acc: Option<f64>, d| Some(acc.map_or(d, |a| a.max(d))));

    Some(MediaInfo {
        format: format
            .get("format_name")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
            .to_string(),
        duration: parse_seconds(format.get("duration"))
            .or(stream_duration)
            .unwrap_or(0.0),
        bitrate: format
            .get("bit_rate")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse().ok())
            .unwrap_or(0),
        audio_streams: streams
            .into_iter()
            .flatten()
            .filter(|s| s.get("codec_type").and_then(|v| v.as_str()) == Some("audio"))
            .count(),
    })
}

/// ffprobe emits durations as decimal strings.
fn parse_seconds(value: Option<&serde_json::Value>) -> Option<f64> {
    value
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d >= 0.0)
}
