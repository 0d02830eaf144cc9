//! Queue polling loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info, warn};

use super::runner::{JobOutcome, JobRunner};
use crate::notify::Metrics;
use crate::queue::MessageQueue;

/// What a single poll cycle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The receive wait elapsed without a message.
    Idle,
    /// A message was handled and deleted.
    Acknowledged(JobOutcome),
    /// The body could not be parsed; left on the queue for redelivery.
    Rejected,
    /// Receiving failed.
    ReceiveFailed,
    /// The job ran but the delete failed; the message will be redelivered.
    AcknowledgeFailed(JobOutcome),
}

/// Receives one message at a time and hands it to the job runner.
pub struct QueuePoller {
    queue: Arc<dyn MessageQueue>,
    runner: Arc<JobRunner>,
    poll_interval: Duration,
    metrics: Option<Arc<Metrics>>,
}

impl QueuePoller {
    pub fn new(queue: Arc<dyn MessageQueue>, runner: Arc<JobRunner>, poll_interval: Duration) -> Self {
        Self {
            queue,
            runner,
            poll_interval,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Runs cycles until `shutdown` turns true. A job in flight always finishes first.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(poll_interval_ms = self.poll_interval.as_millis() as u64, "Starting queue poller");

        loop {
            if *shutdown.borrow() {
                break;
            }

            self.poll_once().await;

            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                Ok(()) = shutdown.changed() => {}
            }
        }

        info!("Queue poller stopped");
    }

    /// Receives at most one message and processes it to completion.
    ///
    /// Errors never escape; they are logged and reflected in the outcome.
    pub async fn poll_once(&self) -> CycleOutcome {
        let message = match self.queue.receive().await {
            Ok(Some(message)) => message,
            Ok(None) => return CycleOutcome::Idle,
            Err(e) => {
                error!(error = %e, "Failed to receive message");
                return CycleOutcome::ReceiveFailed;
            }
        };

        info!(message_id = %message.message_id, "Processing message");

        let outcome = match self.runner.handle_message(&message.body).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(message_id = %message.message_id, error = %e, "Rejected message");
                self.record_message("rejected");
                return CycleOutcome::Rejected;
            }
        };

        match self.queue.acknowledge(&message).await {
            Ok(()) => {
                let result = if outcome == JobOutcome::Skipped {
                    "skipped"
                } else {
                    "acknowledged"
                };
                info!(message_id = %message.message_id, outcome = outcome.label(), "Message acknowledged");
                self.record_message(result);
                CycleOutcome::Acknowledged(outcome)
            }
            Err(e) => {
                error!(message_id = %message.message_id, error = %e, "Failed to acknowledge message");
                self.record_message("ack_failed");
                CycleOutcome::AcknowledgeFailed(outcome)
            }
        }
    }

    fn record_message(&self, result: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.record_message(result);
        }
    }
}
