// Telemetry module for structured logging and metrics

use anyhow::Result;
use metrics::{counter, describe_counter};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::ObservabilityConfig;

pub const TOKEN_VERIFICATIONS_TOTAL: &str = "auth_token_verifications_total";
pub const TOKEN_REFRESH_TOTAL: &str = "auth_token_refresh_total";
pub const PAGE_WRITES_TOTAL: &str = "wiki_page_writes_total";

/// Initialize the tracing subscriber
///
/// `RUST_LOG` takes precedence over the configured level. JSON output carries
/// the current span and span list so request fields show up on every line.
pub fn init_logging(config: &ObservabilityConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .map_err(|e| anyhow::anyhow!("Failed to create env filter: {}", e))?;

    let registry = tracing_subscriber::registry();

    if config.json_logs {
        let json_layer = fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .with_thread_ids(true)
            .with_filter(env_filter);
        registry
            .with(json_layer)
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing subscriber: {}", e))?;
    } else {
        let human_layer = fmt::layer().with_target(false).with_filter(env_filter);
        registry
            .with(human_layer)
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing subscriber: {}", e))?;
    }

    tracing::info!(
        log_level = %config.log_level,
        json = config.json_logs,
        "Logging initialized"
    );

    Ok(())
}

/// Install the Prometheus recorder and describe all metrics
///
/// The returned handle renders the scrape output for the `/metrics` route.
pub fn init_metrics() -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus recorder: {}", e))?;

    describe_metrics();

    tracing::info!("Prometheus metrics recorder installed");
    Ok(handle)
}

pub fn describe_metrics() {
    describe_counter!(
        TOKEN_VERIFICATIONS_TOTAL,
        "Id token verifications by outcome (valid, expired, invalid)"
    );
    describe_counter!(
        TOKEN_REFRESH_TOTAL,
        "Silent token refresh attempts by outcome"
    );
    describe_counter!(
        PAGE_WRITES_TOTAL,
        "Wiki page writes by operation (create, update, delete, settings)"
    );
}

#[inline]
pub fn record_token_verification(outcome: &'static str) {
    counter!(TOKEN_VERIFICATIONS_TOTAL, "outcome" => outcome).increment(1);
}

#[inline]
pub fn record_token_refresh(success: bool) {
    let outcome = if success { "success" } else { "failure" };
    counter!(TOKEN_REFRESH_TOTAL, "outcome" => outcome).increment(1);
}

#[inline]
pub fn record_page_write(operation: &'static str) {
    counter!(PAGE_WRITES_TOTAL, "operation" => operation).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_recording_without_recorder() {
        // No recorder installed: calls are no-ops
        record_token_verification("valid");
        record_token_refresh(false);
        record_page_write("create");
    }

    #[test]
    fn test_init_logging_json() {
        let config = ObservabilityConfig {
            log_level: "info".to_string(),
            json_logs: true,
        };
        // Either succeeds or a subscriber is already installed
        let result = init_logging(&config);
        assert!(result.is_ok() || result.is_err());
    }
}
