//! SQS queue operations.

use async_trait::async_trait;
use aws_sdk_sqs::Client;
use tracing::debug;

use super::{MessageQueue, QueueMessage};
use crate::config::model::QueueConfig;
use crate::error::QueueError;

/// Receives storage notifications from an SQS queue.
#[derive(Clone)]
pub struct SqsQueue {
    client: Client,
    queue_url: String,
    wait_time_seconds: i32,
}

impl SqsQueue {
    /// Wraps an already configured client.
    pub fn new(client: Client, queue_url: impl Into<String>, wait_time_seconds: i32) -> Self {
        Self {
            client,
            queue_url: queue_url.into(),
            wait_time_seconds,
        }
    }

    /// Builds a client from the shared AWS config plus queue settings.
    pub fn from_config(sdk_config: &aws_config::SdkConfig, config: &QueueConfig) -> Self {
        let mut builder = aws_sdk_sqs::config::Builder::from(sdk_config)
            .region(aws_sdk_sqs::config::Region::new(config.region.clone()));

        if let Some(endpoint) = &config.endpoint_url {
            builder = builder.endpoint_url(endpoint);
        }

        Self::new(
            Client::from_conf(builder.build()),
            config.url.clone(),
            config.wait_time_seconds,
        )
    }
}

#[async_trait]
impl MessageQueue for SqsQueue {
    async fn receive(&self) -> Result<Option<QueueMessage>, QueueError> {
        let output = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(1)
            .wait_time_seconds(self.wait_time_seconds)
            .send()
            .await
            .map_err(|e| QueueError::ReceiveFailed {
                queue_url: self.queue_url.clone(),
                message: aws_sdk_sqs::error::DisplayErrorContext(&e).to_string(),
            })?;

        let Some(message) = output.messages.unwrap_or_default().into_iter().next() else {
            return Ok(None);
        };

        let message_id = message.message_id.unwrap_or_else(|| "unknown".to_string());
        let receipt_handle = message
            .receipt_handle
            .ok_or_else(|| QueueError::MissingReceipt {
                message_id: message_id.clone(),
            })?;

        debug!(message_id = %message_id, "Received message");

        Ok(Some(QueueMessage {
            message_id,
            body: message.body.unwrap_or_default(),
            receipt_handle,
        }))
    }

    async fn acknowledge(&self, message: &QueueMessage) -> Result<(), QueueError> {
        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(&message.receipt_handle)
            .send()
            .await
            .map_err(|e| QueueError::AcknowledgeFailed {
                message_id: message.message_id.clone(),
                message: aws_sdk_sqs::error::DisplayErrorContext(&e).to_string(),
            })?;

        Ok(())
    }
}
