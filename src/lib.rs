//! Audio Transcode Worker - converts uploaded audio into a browser-quality rendition.
//!
//! The worker consumes object store change notifications from a queue,
//! transcodes each new upload with ffmpeg and reports progress to an
//! external status store.

pub mod cli;
pub mod config;
pub mod encoder;
pub mod error;
pub mod media;
pub mod notify;
pub mod queue;
pub mod storage;
pub mod validation;
pub mod worker;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::{error, info};

use crate::cli::{Cli, Commands};
use crate::config::AppConfig;
use crate::encoder::FfmpegEncoder;
use crate::error::AppError;
use crate::notify::{HttpStatusReporter, Metrics, MetricsServer};
use crate::queue::SqsQueue;
use crate::storage::S3Store;
use crate::validation::SystemCapabilities;
use crate::worker::{JobOutcome, JobRunner, QueuePoller, RunnerSettings};

/// Runs the worker with the provided CLI arguments.
pub async fn run(cli: Cli) -> Result<()> {
    let configured_level = config::loader::load(&cli.config)
        .map(|c| c.global.log_level)
        .unwrap_or_else(|_| "info".to_string());
    setup_logging(cli.log_level(&configured_level))?;

    match cli.command {
        Commands::Run => run_worker(&cli.config).await,
        Commands::ConfigValidate => validate_config(&cli.config).await,
        Commands::ConfigShow => show_config(&cli.config).await,
        Commands::ProcessMessage { ref file } => process_message_file(&cli.config, file).await,
    }
}

/// Initializes the tracing subscriber for structured logging.
fn setup_logging(level: &str) -> Result<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    fmt()
        .with_env_filter(filter)
        .json()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

/// Loads the config, detects ffmpeg capabilities and validates against them.
fn load_validated_config(config_path: &Path) -> Result<AppConfig> {
    let encoder = config::loader::load(config_path)
        .context("Failed to load configuration")?
        .encoder;
    let capabilities = SystemCapabilities::detect(&encoder)?;
    info!(
        encoders = capabilities.available_encoders.len(),
        muxers = capabilities.available_muxers.len(),
        ffprobe = capabilities.ffprobe_available,
        "Detected system capabilities"
    );

    config::loader::load_and_validate(config_path, &capabilities)
}

/// Shared AWS configuration for the queue and object store clients.
async fn load_sdk_config(config: &AppConfig) -> aws_config::SdkConfig {
    aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(aws_config::Region::new(config.queue.region.clone()))
        .load()
        .await
}

/// Wires the production collaborators into a job runner.
fn build_runner(config: &AppConfig, sdk_config: &aws_config::SdkConfig) -> Result<JobRunner, AppError> {
    let store = Arc::new(S3Store::from_config(sdk_config, &config.storage));
    let encoder = Arc::new(FfmpegEncoder::new(&config.encoder));
    let status = Arc::new(HttpStatusReporter::new(&config.status)?);

    Ok(JobRunner::new(
        store,
        encoder,
        status,
        RunnerSettings::from_config(config),
    ))
}

/// Runs the queue poller until Ctrl+C.
async fn run_worker(config_path: &Path) -> Result<()> {
    info!("Starting audio transcode worker");

    let config = load_validated_config(config_path)?;
    info!(
        queue_url = %config.queue.url,
        inbound_prefix = %config.storage.inbound_prefix,
        processed_prefix = %config.storage.processed_prefix,
        "Configuration loaded and validated"
    );

    let metrics = Arc::new(Metrics::new()?);

    if config.global.prometheus.enabled {
        let port = config.global.prometheus.port;
        let metrics_server = MetricsServer::new(metrics.clone(), port);
        tokio::spawn(async move {
            if let Err(e) = metrics_server.start().await {
                error!(error = %e, "Prometheus server failed");
            }
        });
        info!(port, "Prometheus metrics server started");
    }

    let sdk_config = load_sdk_config(&config).await;
    let queue = Arc::new(SqsQueue::from_config(&sdk_config, &config.queue));
    let runner = Arc::new(build_runner(&config, &sdk_config)?.with_metrics(metrics.clone()));

    let poller = QueuePoller::new(
        queue,
        runner,
        Duration::from_millis(config.global.poll_interval_ms),
    )
    .with_metrics(metrics);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown signal received, finishing current cycle");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => error!(error = %e, "Failed to listen for shutdown signal"),
        }
    });

    info!("Worker is running. Press Ctrl+C to stop.");
    poller.run(shutdown_rx).await;

    info!("Shutting down audio transcode worker");
    Ok(())
}

/// Validates the configuration file and prints the report.
async fn validate_config(config_path: &Path) -> Result<()> {
    let config = config::loader::load(config_path)?;
    let capabilities = SystemCapabilities::detect(&config.encoder)?;
    let result = validation::validate_config(&config, &capabilities);

    println!("{}", validation::report::format_report(&result));

    if !result.is_valid() {
        anyhow::bail!(error::ConfigError::ValidationFailed {
            error_count: result.error_count()
        });
    }

    println!("Queue: {}", config.queue.url);
    println!("Status endpoint: {}", config.status.base_url);
    println!(
        "Prefixes: {}/ -> {}/",
        config.storage.inbound_prefix, config.storage.processed_prefix
    );

    Ok(())
}

/// Displays the effective configuration.
async fn show_config(config_path: &Path) -> Result<()> {
    let config = load_validated_config(config_path)?;
    let yaml = serde_yaml::to_string(&config)?;
    println!("{}", yaml);
    Ok(())
}

/// Runs one notification body from `file` through the job runner.
async fn process_message_file(config_path: &Path, file: &Path) -> Result<()> {
    let config = load_validated_config(config_path)?;
    let sdk_config = load_sdk_config(&config).await;
    let runner = build_runner(&config, &sdk_config)?;

    let outcome = process_message(&runner, file).await?;
    println!("{}", outcome.label());

    match outcome {
        JobOutcome::Errored { error, .. } => anyhow::bail!(error),
        _ => Ok(()),
    }
}

/// Reads a notification body from disk and hands it to `runner`.
pub async fn process_message(runner: &JobRunner, file: &Path) -> Result<JobOutcome, AppError> {
    let body = tokio::fs::read_to_string(file).await?;
    Ok(runner.handle_message(&body).await?)
}
