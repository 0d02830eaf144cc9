//! Transcode job definitions.

use std::fmt;
use std::path::{Path, PathBuf};

use super::event::ObjectChangeEvent;
use crate::encoder::AudioProfile;
use crate::error::EventError;

/// Everything needed to transcode one inbound object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodeJob {
    /// Basename of the inbound key without its extension.
    pub file_id: String,

    /// Bucket holding both the input and the output.
    pub bucket: String,

    /// Key of the uploaded source object.
    pub input_key: String,

    /// Key the transcoded rendition is stored under.
    pub output_key: String,

    /// Scratch copy of the source object.
    pub local_input_path: PathBuf,

    /// Scratch path the encoder writes to.
    pub local_output_path: PathBuf,
}

impl TranscodeJob {
    /// Derives a job from an accepted event.
    ///
    /// Output and scratch names depend only on the key, so a redelivered
    /// event produces an identical job.
    pub fn from_event(
        event: &ObjectChangeEvent,
        scratch_dir: &Path,
        processed_prefix: &str,
        profile: &AudioProfile,
    ) -> Result<Self, EventError> {
        let basename = Path::new(&event.key)
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                EventError::InvalidEventStructure(format!(
                    "Object key '{}' has no file name",
                    event.key
                ))
            })?;

        let (file_id, extension) = split_extension(basename);
        if file_id.is_empty() {
            return Err(EventError::InvalidEventStructure(format!(
                "Object key '{}' does not yield a file id",
                event.key
            )));
        }

        let output_name = format!("{}_{}.{}", file_id, profile.version, profile.extension);
        let source_name = match extension {
            Some(ext) => format!("{}_source.{}", file_id, ext),
            None => format!("{}_source", file_id),
        };

        Ok(Self {
            file_id: file_id.to_string(),
            bucket: event.bucket.clone(),
            input_key: event.key.clone(),
            output_key: format!("{}/{}", processed_prefix.trim_matches('/'), output_name),
            local_input_path: scratch_dir.join(source_name),
            local_output_path: scratch_dir.join(output_name),
        })
    }

    /// Local files this job may leave behind.
    pub fn scratch_paths(&self) -> [&Path; 2] {
        [&self.local_input_path, &self.local_output_path]
    }
}

/// Splits `name.ext` at the last dot. A leading dot is part of the name.
fn split_extension(basename: &str) -> (&str, Option<&str>) {
    match basename.rfind('.') {
        Some(idx) if idx > 0 => (&basename[..idx], Some(&basename[idx + 1..])),
        _ => (basename, None),
    }
}

/// Status values reported to the status store.
///
/// The initial `queued` state is written by the uploading client, so the
/// worker's vocabulary starts at `starting-transcode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    StartingTranscode,
    /// Encoder progress, 0 to 99 in practice; 100 is reported as `Storing`.
    InProgress(u8),
    Storing,
    Completed,
    Errored,
}

impl JobStatus {
    /// Maps an encoder percentage to the status reported for it.
    pub fn for_percent(percent: u8) -> Self {
        if percent >= 100 {
            JobStatus::Storing
        } else {
            JobStatus::InProgress(percent)
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::StartingTranscode => write!(f, "starting-transcode"),
            JobStatus::InProgress(percent) => write!(f, "transcode in-progress: {}%", percent),
            JobStatus::Storing => write!(f, "transcode completed, storing file..."),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Errored => write!(f, "errored"),
        }
    }
}
