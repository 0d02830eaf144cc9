//! Runs one transcode job from notification body to final status report.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::scratch::ScratchGuard;
use crate::config::AppConfig;
use crate::encoder::{AudioEncoder, AudioProfile, ProgressTracker, BROWSER_PROFILE};
use crate::error::{EventError, JobError, TransferError};
use crate::notify::{Metrics, ProgressUpdate, StatusSink};
use crate::queue::{parse_event, JobStatus, TranscodeJob};
use crate::storage::ObjectStore;

/// Buffered progress events between the encoder and the status relay.
const PROGRESS_CHANNEL_CAPACITY: usize = 32;

/// Key layout and scratch location used to derive jobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerSettings {
    pub inbound_prefix: String,
    pub processed_prefix: String,
    pub scratch_dir: PathBuf,
}

impl RunnerSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            inbound_prefix: config.storage.inbound_prefix.clone(),
            processed_prefix: config.storage.processed_prefix.clone(),
            scratch_dir: config.global.scratch_dir.clone(),
        }
    }
}

/// How a message's job ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// The key was outside the inbound prefix; nothing ran.
    Skipped,
    /// The rendition was uploaded and `completed` reported.
    Completed { file_id: String },
    /// A step failed and `errored` was reported with `error`.
    Errored { file_id: String, error: String },
}

impl JobOutcome {
    /// Label used for the `transcode_jobs_total` metric.
    pub fn label(&self) -> &'static str {
        match self {
            JobOutcome::Skipped => "skipped",
            JobOutcome::Completed { .. } => "completed",
            JobOutcome::Errored { .. } => "errored",
        }
    }
}

/// Downloads, transcodes, uploads and reports status for a single object.
pub struct JobRunner {
    store: Arc<dyn ObjectStore>,
    encoder: Arc<dyn AudioEncoder>,
    status: Arc<dyn StatusSink>,
    settings: RunnerSettings,
    profile: AudioProfile,
    metrics: Option<Arc<Metrics>>,
}

impl JobRunner {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        encoder: Arc<dyn AudioEncoder>,
        status: Arc<dyn StatusSink>,
        settings: RunnerSettings,
    ) -> Self {
        Self {
            store,
            encoder,
            status,
            settings,
            profile: BROWSER_PROFILE,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Parses a notification body and runs the job it describes.
    ///
    /// Parse failures are returned before any status is reported, since no
    /// file id is known yet. Every failure after that ends in `Errored`.
    pub async fn handle_message(&self, body: &str) -> Result<JobOutcome, EventError> {
        let Some(event) = parse_event(body, &self.settings.inbound_prefix)? else {
            return Ok(JobOutcome::Skipped);
        };

        let job = TranscodeJob::from_event(
            &event,
            &self.settings.scratch_dir,
            &self.settings.processed_prefix,
            &self.profile,
        )?;

        Ok(self.run_job(&job).await)
    }

    /// Runs a derived job to a terminal status. Scratch files are removed on return.
    pub async fn run_job(&self, job: &TranscodeJob) -> JobOutcome {
        let started = Instant::now();
        let _scratch = ScratchGuard::new(job.scratch_paths());

        if let Some(metrics) = &self.metrics {
            metrics.job_started();
        }

        info!(
            file_id = %job.file_id,
            bucket = %job.bucket,
            input_key = %job.input_key,
            output_key = %job.output_key,
            "Starting job"
        );

        self.report(&job.file_id, JobStatus::StartingTranscode, Vec::new()).await;

        let outcome = match self.execute(job).await {
            Ok(()) => {
                self.report(&job.file_id, JobStatus::Completed, Vec::new()).await;
                info!(
                    file_id = %job.file_id,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Job completed"
                );
                JobOutcome::Completed {
                    file_id: job.file_id.clone(),
                }
            }
            Err(e) => {
                let message = e.to_string();
                error!(file_id = %job.file_id, error = %message, "Job failed");
                self.report(&job.file_id, JobStatus::Errored, vec![message.clone()]).await;
                JobOutcome::Errored {
                    file_id: job.file_id.clone(),
                    error: message,
                }
            }
        };

        if let Some(metrics) = &self.metrics {
            metrics.job_finished(outcome.label(), started.elapsed());
        }

        outcome
    }

    async fn execute(&self, job: &TranscodeJob) -> Result<(), JobError> {
        tokio::fs::create_dir_all(&self.settings.scratch_dir)
            .await
            .map_err(|e| TransferError::DownloadFailed {
                bucket: job.bucket.clone(),
                key: job.input_key.clone(),
                message: format!("Failed to create scratch directory: {}", e),
            })?;

        self.store
            .download(&job.bucket, &job.input_key, &job.local_input_path)
            .await?;

        let duration = self.encoder.probe_duration(&job.local_input_path).await?;
        info!(file_id = %job.file_id, duration_secs = duration, "Probed input");

        let (progress_tx, mut progress_rx) = mpsc::channel(PROGRESS_CHANNEL_CAPACITY);
        let mut tracker = ProgressTracker::new(duration);

        let encode = self
            .encoder
            .transcode(&job.local_input_path, &job.local_output_path, progress_tx);

        let relay = async {
            let mut last_reported: Option<u8> = None;
            while let Some(progress) = progress_rx.recv().await {
                let percent = tracker.observe(&progress);
                if last_reported == Some(percent) {
                    continue;
                }
                last_reported = Some(percent);
                debug!(file_id = %job.file_id, percent, "Encoder progress");
                self.report(&job.file_id, JobStatus::for_percent(percent), Vec::new())
                    .await;
            }
        };

        let (encoded, ()) = tokio::join!(encode, relay);
        encoded?;

        self.store
            .upload(
                &job.bucket,
                &job.output_key,
                &job.local_output_path,
                self.profile.content_type,
            )
            .await?;

        Ok(())
    }

    /// Sends one status update. Failures are logged and counted, never returned.
    async fn report(&self, file_id: &str, status: JobStatus, errors: Vec<String>) {
        let update =
            ProgressUpdate::new(file_id, self.profile.version, status).with_errors(errors);

        if let Err(e) = self.status.report(&update).await {
            warn!(file_id, progress = %status, error = %e, "Failed to report status");
            if let Some(metrics) = &self.metrics {
                metrics.record_report_failure();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::Mutex;

    use crate::encoder::{EncodeProgress, MockAudioEncoder};
    use crate::error::{EncoderError, ReportError};
    use crate::notify::status::MockStatusSink;
    use crate::storage::MockObjectStore;

    const ABC_BODY: &str =
        r#"{"Records":[{"s3":{"bucket":{"name":"b"},"object":{"key":"uploads/abc123.wav"}}}]}"#;

    fn settings(dir: &Path) -> RunnerSettings {
        RunnerSettings {
            inbound_prefix: "uploads".to_string(),
            processed_prefix: "processed".to_string(),
            scratch_dir: dir.to_path_buf(),
        }
    }

    fn recording_sink(log: Arc<Mutex<Vec<ProgressUpdate>>>) -> MockStatusSink {
        let mut sink = MockStatusSink::new();
        sink.expect_report().returning(move |update| {
            log.lock().unwrap().push(update.clone());
            Ok(())
        });
        sink
    }

    fn statuses(log: &Arc<Mutex<Vec<ProgressUpdate>>>) -> Vec<String> {
        log.lock().unwrap().iter().map(|u| u.status.to_string()).collect()
    }

    fn assert_single_errored_report(log: &Arc<Mutex<Vec<ProgressUpdate>>>, text: &str) {
        let updates = log.lock().unwrap().clone();
        let errored: Vec<_> = updates.iter().filter(|u| u.status == JobStatus::Errored).collect();
        assert_eq!(errored.len(), 1);
        assert_eq!(errored[0].errors.len(), 1);
        assert!(errored[0].errors[0].contains(text), "errors: {:?}", errored[0].errors);
        assert_eq!(updates.last().unwrap().status, JobStatus::Errored);
    }

    fn encoder_emitting(elapsed: Vec<f64>) -> MockAudioEncoder {
        let mut encoder = MockAudioEncoder::new();
        encoder.expect_probe_duration().returning(|_| Ok(10.0));
        encoder.expect_transcode().returning(move |_, output, tx| {
            for seconds in &elapsed {
                tx.try_send(EncodeProgress {
                    elapsed_seconds: *seconds,
                    is_complete: false,
                })
                .unwrap();
            }
            std::fs::write(output, b"ftyp").unwrap();
            Ok(())
        });
        encoder
    }

    #[tokio::test]
    async fn test_successful_job_reports_in_order_and_uploads() {
        let dir = tempfile::tempdir().unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));

        let mut store = MockObjectStore::new();
        store
            .expect_download()
            .withf(|bucket, key, _| bucket == "b" && key == "uploads/abc123.wav")
            .times(1)
            .returning(|_, _, dest| {
                std::fs::write(dest, b"RIFF").unwrap();
                Ok(4)
            });
        store
            .expect_upload()
            .withf(|bucket, key, _, content_type| {
                bucket == "b" && key == "processed/abc123_browser.m4a" && content_type == "audio/mp4"
            })
            .times(1)
            .returning(|_, _, _, _| Ok(()));

        let runner = JobRunner::new(
            Arc::new(store),
            Arc::new(encoder_emitting(vec![2.5, 5.0, 5.0, 10.0])),
            Arc::new(recording_sink(log.clone())),
            settings(dir.path()),
        );

        let outcome = runner.handle_message(ABC_BODY).await.unwrap();
        assert_eq!(
            outcome,
            JobOutcome::Completed {
                file_id: "abc123".to_string()
            }
        );
        assert_eq!(
            statuses(&log),
            vec![
                "starting-transcode",
                "transcode in-progress: 25%",
                "transcode in-progress: 50%",
                "transcode completed, storing file...",
                "completed",
            ]
        );
        assert!(log.lock().unwrap().iter().all(|u| u.version == "browser" && u.file_id == "abc123"));
        assert!(!dir.path().join("abc123_source.wav").exists());
        assert!(!dir.path().join("abc123_browser.m4a").exists());
    }

    #[tokio::test]
    async fn test_percentages_never_decrease() {
        let dir = tempfile::tempdir().unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));

        let mut store = MockObjectStore::new();
        store.expect_download().returning(|_, _, _| Ok(0));
        store.expect_upload().returning(|_, _, _, _| Ok(()));

        let runner = JobRunner::new(
            Arc::new(store),
            Arc::new(encoder_emitting(vec![3.0, 1.0, 6.0, 4.0, 12.0])),
            Arc::new(recording_sink(log.clone())),
            settings(dir.path()),
        );
        runner.handle_message(ABC_BODY).await.unwrap();

        let percents: Vec<u8> = log
            .lock()
            .unwrap()
            .iter()
            .filter_map(|u| match u.status {
                JobStatus::InProgress(p) => Some(p),
                JobStatus::Storing => Some(100),
                _ => None,
            })
            .collect();
        assert_eq!(percents, vec![30, 60, 100]);
    }

    #[tokio::test]
    async fn test_download_failure_reports_single_errored_update() {
        let dir = tempfile::tempdir().unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));

        let mut store = MockObjectStore::new();
        store.expect_download().returning(|bucket, key, dest| {
            std::fs::write(dest, b"partial").unwrap();
            Err(TransferError::DownloadFailed {
                bucket: bucket.to_string(),
                key: key.to_string(),
                message: "NoSuchKey".to_string(),
            })
        });
        store.expect_upload().never();

        let mut encoder = MockAudioEncoder::new();
        encoder.expect_probe_duration().never();
        encoder.expect_transcode().never();

        let runner = JobRunner::new(
            Arc::new(store),
            Arc::new(encoder),
            Arc::new(recording_sink(log.clone())),
            settings(dir.path()),
        );

        let outcome = runner.handle_message(ABC_BODY).await.unwrap();
        assert!(matches!(outcome, JobOutcome::Errored { .. }));

        let updates = log.lock().unwrap().clone();
        let errored: Vec<_> = updates.iter().filter(|u| u.status == JobStatus::Errored).collect();
        assert_eq!(errored.len(), 1);
        assert_eq!(errored[0].errors.len(), 1);
        assert!(errored[0].errors[0].contains("NoSuchKey"));
        assert_eq!(updates.last().unwrap().status, JobStatus::Errored);
        assert!(!dir.path().join("abc123_source.wav").exists());
    }

    #[tokio::test]
    async fn test_transcode_failure_carries_encoder_text() {
        let dir = tempfile::tempdir().unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));

        let mut store = MockObjectStore::new();
        store.expect_download().returning(|_, _, _| Ok(1));
        store.expect_upload().never();

        let mut encoder = MockAudioEncoder::new();
        encoder.expect_probe_duration().returning(|_| Ok(10.0));
        encoder.expect_transcode().returning(|_, output, _| {
            std::fs::write(output, b"partial").unwrap();
            Err(EncoderError::TranscodeFailed {
                code: 1,
                stderr: "Invalid data found when processing input".to_string(),
            })
        });

        let runner = JobRunner::new(
            Arc::new(store),
            Arc::new(encoder),
            Arc::new(recording_sink(log.clone())),
            settings(dir.path()),
        );

        match runner.handle_message(ABC_BODY).await.unwrap() {
            JobOutcome::Errored { file_id, error } => {
                assert_eq!(file_id, "abc123");
                assert!(error.contains("Invalid data found"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_single_errored_report(&log, "Invalid data found");
        assert!(!dir.path().join("abc123_browser.m4a").exists());
    }

    #[tokio::test]
    async fn test_probe_failure_reports_errored_and_skips_encode() {
        let dir = tempfile::tempdir().unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));

        let mut store = MockObjectStore::new();
        store.expect_download().returning(|_, _, dest| {
            std::fs::write(dest, b"not audio").unwrap();
            Ok(9)
        });
        store.expect_upload().never();

        let mut encoder = MockAudioEncoder::new();
        encoder.expect_probe_duration().returning(|path| {
            Err(EncoderError::ProbeFailed {
                path: path.to_path_buf(),
                message: "no audio streams".to_string(),
            })
        });
        encoder.expect_transcode().never();

        let runner = JobRunner::new(
            Arc::new(store),
            Arc::new(encoder),
            Arc::new(recording_sink(log.clone())),
            settings(dir.path()),
        );

        let outcome = runner.handle_message(ABC_BODY).await.unwrap();
        assert!(matches!(outcome, JobOutcome::Errored { .. }));
        assert_eq!(statuses(&log), vec!["starting-transcode", "errored"]);
        assert_single_errored_report(&log, "no audio streams");
        assert!(!dir.path().join("abc123_source.wav").exists());
    }

    #[tokio::test]
    async fn test_upload_failure_reports_errored_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));

        let mut store = MockObjectStore::new();
        store.expect_download().returning(|_, _, dest| {
            std::fs::write(dest, b"RIFF").unwrap();
            Ok(4)
        });
        store.expect_upload().times(1).returning(|bucket, key, _, _| {
            Err(TransferError::UploadFailed {
                bucket: bucket.to_string(),
                key: key.to_string(),
                message: "AccessDenied".to_string(),
            })
        });

        let runner = JobRunner::new(
            Arc::new(store),
            Arc::new(encoder_emitting(vec![10.0])),
            Arc::new(recording_sink(log.clone())),
            settings(dir.path()),
        );

        match runner.handle_message(ABC_BODY).await.unwrap() {
            JobOutcome::Errored { error, .. } => assert!(error.contains("AccessDenied")),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(
            statuses(&log),
            vec!["starting-transcode", "transcode completed, storing file...", "errored"]
        );
        assert_single_errored_report(&log, "AccessDenied");
        assert!(!dir.path().join("abc123_source.wav").exists());
        assert!(!dir.path().join("abc123_browser.m4a").exists());
    }

    #[tokio::test]
    async fn test_report_failures_do_not_fail_the_job() {
        let dir = tempfile::tempdir().unwrap();
        let metrics = Arc::new(Metrics::new().unwrap());

        let mut store = MockObjectStore::new();
        store.expect_download().returning(|_, _, _| Ok(1));
        store.expect_upload().times(1).returning(|_, _, _, _| Ok(()));

        let mut sink = MockStatusSink::new();
        sink.expect_report().returning(|update| {
            Err(ReportError::ReportFailed {
                file_id: update.file_id.clone(),
                message: "HTTP 503".to_string(),
            })
        });

        let runner = JobRunner::new(
            Arc::new(store),
            Arc::new(encoder_emitting(vec![10.0])),
            Arc::new(sink),
            settings(dir.path()),
        )
        .with_metrics(metrics.clone());

        let outcome = runner.handle_message(ABC_BODY).await.unwrap();
        assert!(matches!(outcome, JobOutcome::Completed { .. }));
        // starting-transcode, storing, completed
        assert_eq!(metrics.status_report_failures_total.get(), 3);
        assert_eq!(metrics.jobs_in_progress.get(), 0);
    }

    #[tokio::test]
    async fn test_zero_duration_reports_zero_percent_and_completes() {
        let dir = tempfile::tempdir().unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));

        let mut store = MockObjectStore::new();
        store.expect_download().returning(|_, _, _| Ok(1));
        store.expect_upload().times(1).returning(|_, _, _, _| Ok(()));

        let mut encoder = MockAudioEncoder::new();
        encoder.expect_probe_duration().returning(|_| Ok(0.0));
        encoder.expect_transcode().returning(|_, _, tx| {
            for seconds in [1.0, 2.0] {
                tx.try_send(EncodeProgress {
                    elapsed_seconds: seconds,
                    is_complete: false,
                })
                .unwrap();
            }
            Ok(())
        });

        let runner = JobRunner::new(
            Arc::new(store),
            Arc::new(encoder),
            Arc::new(recording_sink(log.clone())),
            settings(dir.path()),
        );

        let outcome = runner.handle_message(ABC_BODY).await.unwrap();
        assert!(matches!(outcome, JobOutcome::Completed { .. }));
        assert_eq!(
            statuses(&log),
            vec!["starting-transcode", "transcode in-progress: 0%", "completed"]
        );
    }

    #[tokio::test]
    async fn test_malformed_body_sends_no_report() {
        let dir = tempfile::tempdir().unwrap();

        let mut store = MockObjectStore::new();
        store.expect_download().never();
        let mut sink = MockStatusSink::new();
        sink.expect_report().never();

        let runner = JobRunner::new(
            Arc::new(store),
            Arc::new(MockAudioEncoder::new()),
            Arc::new(sink),
            settings(dir.path()),
        );

        let err = runner.handle_message("{not json").await.unwrap_err();
        assert!(matches!(err, EventError::MalformedMessage(_)));
    }

    #[tokio::test]
    async fn test_processed_key_is_skipped_without_side_effects() {
        let dir = tempfile::tempdir().unwrap();

        let mut store = MockObjectStore::new();
        store.expect_download().never();
        let mut sink = MockStatusSink::new();
        sink.expect_report().never();

        let runner = JobRunner::new(
            Arc::new(store),
            Arc::new(MockAudioEncoder::new()),
            Arc::new(sink),
            settings(dir.path()),
        );

        let body = r#"{"Records":[{"s3":{"bucket":{"name":"b"},"object":{"key":"processed/abc123_browser.m4a"}}}]}"#;
        assert_eq!(runner.handle_message(body).await.unwrap(), JobOutcome::Skipped);
    }
}
