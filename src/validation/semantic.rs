//! Semantic validation for configuration values.

use reqwest::Url;

use crate::config::loader::{ENV_QUEUE_URL, ENV_STATUS_BASE_URL};
use crate::config::model::AppConfig;

use super::{ValidationIssue, ValidationResult};

/// Maximum long-poll wait the queue service accepts.
const MAX_WAIT_TIME_SECONDS: i32 = 20;

/// Validates semantic correctness of configuration values.
pub fn validate(config: &AppConfig) -> ValidationResult {
    let mut result = ValidationResult::new();

    validate_url(&config.queue.url, "queue.url", ENV_QUEUE_URL, &mut result);
    validate_url(
        &config.status.base_url,
        "status.base_url",
        ENV_STATUS_BASE_URL,
        &mut result,
    );

    if !(0..=MAX_WAIT_TIME_SECONDS).contains(&config.queue.wait_time_seconds) {
        result.add(
            ValidationIssue::error(
                "queue.wait_time_seconds",
                format!(
                    "Wait time {} is out of range",
                    config.queue.wait_time_seconds
                ),
            )
            .with_suggestion(format!("Use a value between 0 and {}", MAX_WAIT_TIME_SECONDS)),
        );
    }

    if config.global.poll_interval_ms == 0 {
        result.add(
            ValidationIssue::warning(
                "global.poll_interval_ms",
                "Poll interval of 0 re-polls immediately after every cycle",
            )
            .with_suggestion("1000 matches the default pacing"),
        );
    }

    if config.encoder.timeout_seconds == 0 {
        result.add(ValidationIssue::error(
            "encoder.timeout_seconds",
            "Encoder timeout must be at least 1 second",
        ));
    }

    if config.status.timeout_seconds == 0 {
        result.add(ValidationIssue::error(
            "status.timeout_seconds",
            "Status timeout must be at least 1 second",
        ));
    }

    validate_prefixes(
        &config.storage.inbound_prefix,
        &config.storage.processed_prefix,
        &mut result,
    );

    result
}

/// Validates that a URL is present and uses http(s).
fn validate_url(value: &str, path: &str, env_key: &str, result: &mut ValidationResult) {
    if value.trim().is_empty() {
        result.add(
            ValidationIssue::error(path, "URL is not set")
                .with_suggestion(format!("Set it in the config file or via {}", env_key)),
        );
        return;
    }

    match Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        Ok(url) => result.add(ValidationIssue::error(
            path,
            format!("Unsupported URL scheme '{}'", url.scheme()),
        )),
        Err(e) => result.add(ValidationIssue::error(
            path,
            format!("Invalid URL '{}': {}", value, e),
        )),
    }
}

/// The worker writes into the processed prefix and may be notified about
/// those writes, so the two prefixes must never overlap.
fn validate_prefixes(inbound: &str, processed: &str, result: &mut ValidationResult) {
    let inbound = inbound.trim_matches('/');
    let processed = processed.trim_matches('/');

    if inbound.is_empty() {
        result.add(ValidationIssue::error(
            "storage.inbound_prefix",
            "Inbound prefix cannot be empty",
        ));
    }

    if processed.is_empty() {
        result.add(ValidationIssue::error(
            "storage.processed_prefix",
            "Processed prefix cannot be empty",
        ));
    }

    if inbound.is_empty() || processed.is_empty() {
        return;
    }

    let nested = |outer: &str, inner: &str| inner.starts_with(&format!("{}/", outer));

    if inbound == processed || nested(inbound, processed) || nested(processed, inbound) {
        result.add(
            ValidationIssue::error(
                "storage.processed_prefix",
                format!(
                    "Processed prefix '{}' overlaps inbound prefix '{}'",
                    processed, inbound
                ),
            )
            .with_suggestion("Encoded outputs would re-trigger the worker; use disjoint prefixes"),
        );
    }
}
