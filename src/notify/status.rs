//! Best-effort job status reporting to the external status store.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, error};

use crate::config::model::StatusConfig;
use crate::error::ReportError;
use crate::queue::JobStatus;

/// One status update for a file rendition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub file_id: String,
    pub version: String,
    pub status: JobStatus,
    pub errors: Vec<String>,
}

impl ProgressUpdate {
    pub fn new(file_id: impl Into<String>, version: impl Into<String>, status: JobStatus) -> Self {
        Self {
            file_id: file_id.into(),
            version: version.into(),
            status,
            errors: Vec::new(),
        }
    }

    /// Attaches error messages shown to the uploading client.
    pub fn with_errors(mut self, errors: Vec<String>) -> Self {
        self.errors = errors;
        self
    }
}

/// Destination for job status updates.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StatusSink: Send + Sync {
    /// Sends a single update. Callers treat failures as non-fatal.
    async fn report(&self, update: &ProgressUpdate) -> Result<(), ReportError>;
}

/// Body of the status PATCH request.
#[derive(Debug, Serialize)]
struct StatusPayload<'a> {
    version: &'a str,
    progress: String,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    errors: &'a [String],
}

/// Reports status with `PATCH {base_url}/{fileId}`.
pub struct HttpStatusReporter {
    base_url: String,
    client: reqwest::Client,
}

impl HttpStatusReporter {
    pub fn new(config: &StatusConfig) -> Result<Self, ReportError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn resource_url(&self, file_id: &str) -> String {
        format!("{}/{}", self.base_url, urlencoding::encode(file_id))
    }
}

#[async_trait]
impl StatusSink for HttpStatusReporter {
    async fn report(&self, update: &ProgressUpdate) -> Result<(), ReportError> {
        let payload = StatusPayload {
            version: &update.version,
            progress: update.status.to_string(),
            errors: &update.errors,
        };

        let response = self
            .client
            .patch(self.resource_url(&update.file_id))
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            error!(
                file_id = %update.file_id,
                status = %status,
                body = %text,
                "Status report rejected"
            );
            return Err(ReportError::ReportFailed {
                file_id: update.file_id.clone(),
                message: format!("HTTP {}: {}", status, text),
            });
        }

        debug!(file_id = %update.file_id, progress = %payload.progress, "Status reported");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn reporter_for(server: &MockServer) -> HttpStatusReporter {
        HttpStatusReporter::new(&StatusConfig {
            base_url: format!("{}/resource/", server.uri()),
            timeout_seconds: 5,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_patches_progress_without_errors_field() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/resource/abc123"))
            .and(body_json(serde_json::json!({
                "version": "browser",
                "progress": "transcode in-progress: 42%"
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let update = ProgressUpdate::new("abc123", "browser", JobStatus::InProgress(42));
        reporter_for(&server).report(&update).await.unwrap();
    }

    #[tokio::test]
    async fn test_errored_update_carries_errors() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/resource/abc123"))
            .and(body_json(serde_json::json!({
                "version": "browser",
                "progress": "errored",
                "errors": ["Failed to download b/uploads/abc123.wav: NoSuchKey"]
            })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let update = ProgressUpdate::new("abc123", "browser", JobStatus::Errored)
            .with_errors(vec!["Failed to download b/uploads/abc123.wav: NoSuchKey".to_string()]);
        reporter_for(&server).report(&update).await.unwrap();
    }

    #[tokio::test]
    async fn test_non_success_status_is_report_failure() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let update = ProgressUpdate::new("abc123", "browser", JobStatus::Completed);
        let err = reporter_for(&server).report(&update).await.unwrap_err();
        match err {
            ReportError::ReportFailed { file_id, message } => {
                assert_eq!(file_id, "abc123");
                assert!(message.contains("500"));
                assert!(message.contains("boom"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_file_id_is_path_encoded() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/resource/my%20voice"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let update = ProgressUpdate::new("my voice", "browser", JobStatus::StartingTranscode);
        reporter_for(&server).report(&update).await.unwrap();
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_http_failure() {
        let reporter = HttpStatusReporter::new(&StatusConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            timeout_seconds: 1,
        })
        .unwrap();

        let update = ProgressUpdate::new("abc123", "browser", JobStatus::StartingTranscode);
        let err = reporter.report(&update).await.unwrap_err();
        assert!(matches!(err, ReportError::HttpFailed(_)));
    }
}
