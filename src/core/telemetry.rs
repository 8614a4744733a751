use tracing_subscriber::{fmt, EnvFilter};

use crate::core::config::Settings;

/// Installs the global subscriber for the API server and the worker.
pub(crate) fn init_tracing(settings: &Settings) -> anyhow::Result<()> {
    let telemetry = settings.telemetry();
    let builder = fmt()
        .with_env_filter(env_filter(&telemetry.log_level))
        .with_target(false)
        .with_span_events(fmt::format::FmtSpan::CLOSE);

    let result = if telemetry.json { builder.json().try_init() } else { builder.try_init() };
    result.map_err(|err| anyhow::anyhow!(err.to_string()))
}

/// The offline evaluator prints its summary on stdout, so logs go to stderr.
pub(crate) fn init_cli_tracing(settings: &Settings) -> anyhow::Result<()> {
    fmt()
        .with_env_filter(env_filter(&settings.telemetry().log_level))
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow::anyhow!(err.to_string()))
}

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}
