//! Error types for the transcoding worker.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level application errors.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Event error: {0}")]
    Event(#[from] EventError),

    #[error("Status reporter error: {0}")]
    Report(#[from] ReportError),

    #[error("Metrics error: {0}")]
    Metrics(#[from] MetricsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration loading and parsing errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {message}")]
    ParseFailed { path: PathBuf, message: String },

    #[error("Config validation failed with {error_count} error(s)")]
    ValidationFailed { error_count: usize },
}

/// Message queue errors.
#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Failed to receive messages from '{queue_url}': {message}")]
    ReceiveFailed { queue_url: String, message: String },

    #[error("Failed to acknowledge message {message_id}: {message}")]
    AcknowledgeFailed { message_id: String, message: String },

    #[error("Message {message_id} has no receipt handle")]
    MissingReceipt { message_id: String },
}

/// Errors raised while turning a queue message into a job.
#[derive(Error, Debug)]
pub enum EventError {
    #[error("Malformed message body: {0}")]
    MalformedMessage(String),

    #[error("Invalid storage event structure: {0}")]
    InvalidEventStructure(String),
}

/// Object store transfer errors.
#[derive(Error, Debug)]
pub enum TransferError {
    #[error("Failed to download s3://{bucket}/{key}: {message}")]
    DownloadFailed {
        bucket: String,
        key: String,
        message: String,
    },

    #[error("Failed to upload s3://{bucket}/{key}: {message}")]
    UploadFailed {
        bucket: String,
        key: String,
        message: String,
    },
}

/// Encoder invocation errors.
#[derive(Error, Debug)]
pub enum EncoderError {
    #[error("Failed to probe '{path}': {message}")]
    ProbeFailed { path: PathBuf, message: String },

    #[error("FFmpeg failed with exit code {code}: {stderr}")]
    TranscodeFailed { code: i32, stderr: String },

    #[error("Process spawn failed: {0}")]
    SpawnFailed(String),

    #[error("Encoding timed out after {seconds} seconds")]
    Timeout { seconds: u64 },
}

/// Any failure that ends a job in the `errored` state.
#[derive(Error, Debug)]
pub enum JobError {
    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error(transparent)]
    Encoder(#[from] EncoderError),
}

/// Status report delivery errors.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Status report for {file_id} failed: {message}")]
    ReportFailed { file_id: String, message: String },

    #[error("HTTP request failed: {0}")]
    HttpFailed(#[from] reqwest::Error),
}

/// Prometheus registry and exporter errors.
#[derive(Error, Debug)]
pub enum MetricsError {
    #[error("Prometheus metrics export failed: {0}")]
    PrometheusFailed(String),
}

/// Capability detection errors.
#[derive(Error, Debug)]
pub enum CapabilityError {
    #[error("Failed to run '{command}': {message}")]
    CommandFailed { command: String, message: String },

    #[error("Required tool '{tool}' not found")]
    ToolNotFound { tool: String },
}
