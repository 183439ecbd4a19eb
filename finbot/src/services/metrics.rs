//! Metrics collection and Prometheus export.
//!
//! Initializes the metrics exporter and provides the helpers the advisor uses
//! to record provider calls.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Duration;

/// Global handle to the Prometheus recorder.
pub static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder.
///
/// Call once at startup, before any metrics are recorded. A second call is a
/// no-op; metrics recorded before installation are discarded.
pub fn init_metrics() -> anyhow::Result<()> {
    if METRICS_HANDLE.get().is_some() {
        return Ok(());
    }

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("failed to install Prometheus recorder: {}", e))?;

    let _ = METRICS_HANDLE.set(handle);
    Ok(())
}

/// Current metrics in Prometheus text format.
pub fn get_metrics() -> String {
    METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized\n".to_string())
}

/// Record the outcome and latency of one provider call.
pub fn record_provider_call(provider: &'static str, outcome: &'static str, elapsed: Duration) {
    counter!(
        "finbot_provider_requests_total",
        "provider" => provider,
        "outcome" => outcome
    )
    .increment(1);
    histogram!("finbot_provider_latency_seconds", "provider" => provider)
        .record(elapsed.as_secs_f64());
}

/// Record token usage reported by the provider.
pub fn record_tokens(provider: &'static str, input_tokens: i32, output_tokens: i32) {
    counter!("finbot_tokens_total", "provider" => provider, "type" => "input")
        .increment(input_tokens.max(0) as u64);
    counter!("finbot_tokens_total", "provider" => provider, "type" => "output")
        .increment(output_tokens.max(0) as u64);
}

/// Count a chat interaction by result.
pub fn record_chat(result: &'static str) {
    counter!("finbot_chat_interactions_total", "result" => result).increment(1);
}
