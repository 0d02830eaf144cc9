//! Object store transfers between buckets and local scratch files.

pub mod s3;

use std::path::Path;

use async_trait::async_trait;

use crate::error::TransferError;

pub use s3::S3Store;

/// Streams objects to and from local scratch paths.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Downloads `bucket/key` to `destination`, returning the bytes written.
    async fn download(&self, bucket: &str, key: &str, destination: &Path) -> Result<u64, TransferError>;

    /// Uploads the file at `source` as `bucket/key`, replacing any existing object.
    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        source: &Path,
        content_type: &str,
    ) -> Result<(), TransferError>;
}
