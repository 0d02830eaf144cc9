//! Storage change notification parsing.

use serde::Deserialize;
use tracing::debug;

use crate::error::EventError;

/// The object a notification refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectChangeEvent {
    /// Bucket holding the object.
    pub bucket: String,
    /// Decoded object key.
    pub key: String,
}

/// Notification envelope; only the first record is consulted.
#[derive(Debug, Deserialize)]
struct Notification {
    #[serde(rename = "Records")]
    records: Vec<Record>,
}

#[derive(Debug, Deserialize)]
struct Record {
    s3: S3Entity,
}

#[derive(Debug, Deserialize)]
struct S3Entity {
    bucket: BucketEntity,
    object: ObjectEntity,
}

#[derive(Debug, Deserialize)]
struct BucketEntity {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ObjectEntity {
    key: String,
}

/// Parses a notification body into the event it describes.
///
/// Returns `Ok(None)` when the key is outside `inbound_prefix`, which covers
/// the worker's own outputs being announced on the same queue.
pub fn parse_event(body: &str, inbound_prefix: &str) -> Result<Option<ObjectChangeEvent>, EventError> {
    let value: serde_json::Value =
        serde_json::from_str(body).map_err(|e| EventError::MalformedMessage(e.to_string()))?;

    let notification: Notification = serde_json::from_value(value)
        .map_err(|e| EventError::InvalidEventStructure(e.to_string()))?;

    let record = notification
        .records
        .into_iter()
        .next()
        .ok_or_else(|| EventError::InvalidEventStructure("Records is empty".to_string()))?;

    let key = decode_key(&record.s3.object.key)?;

    if !is_under_prefix(&key, inbound_prefix) {
        debug!(key = %key, inbound_prefix, "Ignoring object outside inbound prefix");
        return Ok(None);
    }

    if key.ends_with('/') {
        debug!(key = %key, "Ignoring folder placeholder");
        return Ok(None);
    }

    Ok(Some(ObjectChangeEvent {
        bucket: record.s3.bucket.name,
        key,
    }))
}

/// Decodes a notification key: `+` means space, then percent-decoding.
pub fn decode_key(raw: &str) -> Result<String, EventError> {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|k| k.into_owned())
        .map_err(|e| EventError::InvalidEventStructure(format!("Undecodable object key '{}': {}", raw, e)))
}

/// Returns true if `key` lies inside the `prefix` folder.
pub fn is_under_prefix(key: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_matches('/');
    key.strip_prefix(prefix)
        .map_or(false, |rest| rest.starts_with('/'))
}
