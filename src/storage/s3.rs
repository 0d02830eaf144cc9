//! S3 object store client.

use std::path::Path;

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use super::ObjectStore;
use crate::config::model::StorageConfig;
use crate::error::TransferError;

/// S3-backed object store.
#[derive(Clone)]
pub struct S3Store {
    client: Client,
}

impl S3Store {
    /// Wraps an already configured client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Builds a client from the shared AWS config plus storage settings.
    pub fn from_config(sdk_config: &aws_config::SdkConfig, config: &StorageConfig) -> Self {
        let mut builder = aws_sdk_s3::config::Builder::from(sdk_config)
            .region(aws_sdk_s3::config::Region::new(config.region.clone()))
            .force_path_style(config.force_path_style);

        if let Some(endpoint) = &config.endpoint_url {
            builder = builder.endpoint_url(endpoint);
        }

        Self::new(Client::from_conf(builder.build()))
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn download(&self, bucket: &str, key: &str, destination: &Path) -> Result<u64, TransferError> {
        let failed = |message: String| TransferError::DownloadFailed {
            bucket: bucket.to_string(),
            key: key.to_string(),
            message,
        };

        debug!(bucket, key, destination = %destination.display(), "Downloading object");

        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| failed(aws_sdk_s3::error::DisplayErrorContext(&e).to_string()))?;

        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| failed(format!("Failed to create directory: {}", e)))?;
        }

        let mut file = tokio::fs::File::create(destination)
            .await
            .map_err(|e| failed(format!("Failed to create file: {}", e)))?;

        let mut body = response.body;
        let mut written: u64 = 0;

        while let Some(chunk) = body
            .try_next()
            .await
            .map_err(|e| failed(format!("Failed to read object body: {}", e)))?
        {
            file.write_all(&chunk)
                .await
                .map_err(|e| failed(format!("Failed to write file: {}", e)))?;
            written += chunk.len() as u64;
        }

        file.flush()
            .await
            .map_err(|e| failed(format!("Failed to flush file: {}", e)))?;

        info!(bucket, key, bytes = written, "Downloaded object");
        Ok(written)
    }

    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        source: &Path,
        content_type: &str,
    ) -> Result<(), TransferError> {
        let failed = |message: String| TransferError::UploadFailed {
            bucket: bucket.to_string(),
            key: key.to_string(),
            message,
        };

        let data = tokio::fs::read(source)
            .await
            .map_err(|e| failed(format!("Failed to read '{}': {}", source.display(), e)))?;
        let size = data.len();

        debug!(bucket, key, bytes = size, "Uploading object");

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(data))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| failed(aws_sdk_s3::error::DisplayErrorContext(&e).to_string()))?;

        info!(bucket, key, bytes = size, "Uploaded object");
        Ok(())
    }
}
