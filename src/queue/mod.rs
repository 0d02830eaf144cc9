//! Storage notification queue, event parsing and job derivation.

pub mod event;
pub mod job;
pub mod sqs;

use async_trait::async_trait;

use crate::error::QueueError;

pub use event::{parse_event, ObjectChangeEvent};
pub use job::{JobStatus, TranscodeJob};
pub use sqs::SqsQueue;

/// A message received from the notification queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    /// Queue-assigned message identifier, used for logging.
    pub message_id: String,
    /// Serialized storage notification.
    pub body: String,
    /// Token that acknowledges (deletes) this delivery.
    pub receipt_handle: String,
}

/// At-least-once notification queue.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageQueue: Send + Sync {
    /// Long-polls for at most one message.
    async fn receive(&self) -> Result<Option<QueueMessage>, QueueError>;

    /// Deletes a delivered message so it is not redelivered.
    async fn acknowledge(&self, message: &QueueMessage) -> Result<(), QueueError>;
}
