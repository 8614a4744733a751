use std::sync::OnceLock;

use metrics::{describe_counter, describe_histogram, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::core::config::Settings;

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub(crate) fn init(settings: &Settings) -> anyhow::Result<()> {
    if !settings.telemetry().prometheus_enabled {
        return Ok(());
    }
    if PROM_HANDLE.get().is_some() {
        return Ok(());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    let _ = PROM_HANDLE.set(handle);
    describe();
    Ok(())
}

pub(crate) fn render() -> Option<String> {
    PROM_HANDLE.get().map(|handle| handle.render())
}

fn describe() {
    describe_counter!("http_requests_total", "HTTP responses by status code");
    describe_histogram!(
        "http_request_duration_seconds",
        Unit::Seconds,
        "HTTP request latency by status code"
    );
    describe_counter!("evaluations_total", "Answer-sheet evaluations by outcome");
    describe_histogram!(
        "evaluation_duration_seconds",
        Unit::Seconds,
        "Wall time of one answer-sheet evaluation"
    );
    describe_counter!("feedback_requests_total", "Feedback service calls by outcome");
    describe_counter!(
        "similarity_signal_failures_total",
        "Similarity signals that failed and were scored as zero"
    );
    describe_counter!("evaluation_jobs_total", "Queued evaluation jobs processed by the worker");
}
