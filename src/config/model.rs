//! Configuration data structures.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure containing all settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global application settings.
    #[serde(default)]
    pub global: GlobalConfig,

    /// Notification queue settings.
    #[serde(default)]
    pub queue: QueueConfig,

    /// Object store settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Status endpoint settings.
    #[serde(default)]
    pub status: StatusConfig,

    /// External encoder settings.
    #[serde(default)]
    pub encoder: EncoderConfig,
}

/// Global application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Directory for downloaded sources and encoded outputs.
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,

    /// Pause between poll cycles in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Prometheus metrics settings.
    #[serde(default)]
    pub prometheus: PrometheusConfig,
}

/// Notification queue configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Queue URL to receive storage notifications from.
    #[serde(default)]
    pub url: String,

    /// Queue region.
    #[serde(default = "default_region")]
    pub region: String,

    /// Long-poll wait per receive call, in seconds.
    #[serde(default = "default_wait_time_seconds")]
    pub wait_time_seconds: i32,

    /// Endpoint override for local emulators.
    #[serde(default)]
    pub endpoint_url: Option<String>,
}

/// Object store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Object store region.
    #[serde(default = "default_region")]
    pub region: String,

    /// Endpoint override (MinIO, localstack).
    #[serde(default)]
    pub endpoint_url: Option<String>,

    /// Use path-style addressing.
    #[serde(default)]
    pub force_path_style: bool,

    /// Key prefix holding user uploads. Only keys under it start a job.
    #[serde(default = "default_inbound_prefix")]
    pub inbound_prefix: String,

    /// Key prefix the worker writes encoded renditions to.
    #[serde(default = "default_processed_prefix")]
    pub processed_prefix: String,
}

/// Status endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusConfig {
    /// Base URL; reports go to `{base_url}/{fileId}`.
    #[serde(default)]
    pub base_url: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_status_timeout")]
    pub timeout_seconds: u64,
}

/// External encoder configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncoderConfig {
    /// ffmpeg binary.
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,

    /// ffprobe binary.
    #[serde(default = "default_ffprobe_path")]
    pub ffprobe_path: PathBuf,

    /// Upper bound on a single transcode, in seconds.
    #[serde(default = "default_encoder_timeout")]
    pub timeout_seconds: u64,
}

/// Prometheus metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrometheusConfig {
    /// Whether to enable Prometheus metrics endpoint.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Port for the Prometheus metrics HTTP server.
    #[serde(default = "default_prometheus_port")]
    pub port: u16,
}

// Default value functions

fn default_log_level() -> String {
    "info".to_string()
}

fn default_scratch_dir() -> PathBuf {
    std::env::temp_dir().join("audio_transcode")
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_region() -> String {
    "us-west-1".to_string()
}

fn default_wait_time_seconds() -> i32 {
    10
}

fn default_inbound_prefix() -> String {
    "uploads".to_string()
}

fn default_processed_prefix() -> String {
    "processed".to_string()
}

fn default_status_timeout() -> u64 {
    10
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_ffprobe_path() -> PathBuf {
    PathBuf::from("ffprobe")
}

fn default_encoder_timeout() -> u64 {
    3600
}

fn default_prometheus_port() -> u16 {
    9090
}

fn default_true() -> bool {
    true
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            scratch_dir: default_scratch_dir(),
            poll_interval_ms: default_poll_interval_ms(),
            prometheus: PrometheusConfig::default(),
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            region: default_region(),
            wait_time_seconds: default_wait_time_seconds(),
            endpoint_url: None,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            region: default_region(),
            endpoint_url: None,
            force_path_style: false,
            inbound_prefix: default_inbound_prefix(),
            processed_prefix: default_processed_prefix(),
        }
    }
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            timeout_seconds: default_status_timeout(),
        }
    }
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            ffprobe_path: default_ffprobe_path(),
            timeout_seconds: default_encoder_timeout(),
        }
    }
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: default_prometheus_port(),
        }
    }
}
