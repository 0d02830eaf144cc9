//! Audio encoding with the fixed browser profile.

pub mod ffmpeg;
pub mod profile;
pub mod progress;

use std::path::Path;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::EncoderError;

pub use ffmpeg::FfmpegEncoder;
pub use profile::{AudioProfile, BROWSER_PROFILE};
pub use progress::{EncodeProgress, ProgressTracker};

/// External media encoder used by the job runner.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AudioEncoder: Send + Sync {
    /// Returns the input's total duration in seconds.
    async fn probe_duration(&self, input: &Path) -> Result<f64, EncoderError>;

    /// Transcodes `input` into `output`, sending progress events in encoder order.
    ///
    /// The sender is dropped when the encoder exits, which ends the stream.
    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        progress_tx: mpsc::Sender<EncodeProgress>,
    ) -> Result<(), EncoderError>;
}
