pub(crate) mod api;
pub(crate) mod core;
pub(crate) mod db;
pub(crate) mod documents;
pub(crate) mod grading;
pub(crate) mod repositories;
pub(crate) mod schemas;
pub(crate) mod services;
pub(crate) mod tasks;

#[cfg(test)]
mod test_support;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;

use crate::core::{config::Settings, redis::RedisHandle, state::AppState, telemetry};
use crate::documents::Document;
use crate::services::storage::StorageService;

const EVALUATE_USAGE: &str = "usage: gradewise-evaluate <answer_sheet> <answer_key> <output.json>";

async fn build_state(settings: Settings) -> anyhow::Result<(AppState, RedisHandle)> {
    let db_pool = db::init_pool(&settings).await?;
    db::run_migrations(&db_pool).await?;

    let redis = RedisHandle::new(settings.redis().redis_url());
    redis.connect_or_warn().await;

    let storage = StorageService::from_settings(&settings).await?;
    if storage.is_none() {
        tracing::warn!("S3 storage is not configured; uploads and evaluations are unavailable");
    }

    let scorer = Arc::new(grading::build_scorer(&settings)?);
    Ok((AppState::new(settings, db_pool, redis.clone(), storage, scorer), redis))
}

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    telemetry::init_tracing(&settings)?;
    core::metrics::init(&settings)?;

    let (state, redis) = build_state(settings).await?;

    if let Err(err) = core::bootstrap::ensure_first_admin(&state).await {
        tracing::error!(error = %err, "Failed to ensure first admin account");
    }
    let app = api::router::router(state.clone());
    let listener = tokio::net::TcpListener::bind(state.settings().server_addr()).await?;

    tracing::info!(
        host = %state.settings().server_host(),
        port = state.settings().server_port(),
        environment = %state.settings().runtime().environment.as_str(),
        "Gradewise API listening"
    );

    let result =
        axum::serve(listener, app).with_graceful_shutdown(core::shutdown::shutdown_signal()).await;

    redis.disconnect().await;
    tracing::info!("Redis disconnected");

    result?;

    Ok(())
}

pub async fn run_worker() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    telemetry::init_tracing(&settings)?;
    core::metrics::init(&settings)?;

    let (state, redis) = build_state(settings).await?;
    let evaluator =
        Arc::new(grading::build_evaluator(state.settings(), state.scorer_handle())?);

    let result =
        tasks::scheduler::run(state, evaluator, core::shutdown::shutdown_channel()).await;

    redis.disconnect().await;
    tracing::info!("Redis disconnected");

    result
}

/// Grades one answer sheet from disk, writes the per-question results as JSON and prints the
/// total. Fails when the answer key cannot be read.
pub async fn run_evaluate_cli() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let [sheet_path, key_path, output_path] = args.as_slice() else {
        anyhow::bail!(EVALUATE_USAGE);
    };

    let settings = Settings::load()?;
    telemetry::init_cli_tracing(&settings)?;

    let scorer = Arc::new(grading::build_scorer(&settings)?);
    let evaluator = grading::build_evaluator(&settings, scorer)?;

    let sheet = Document::read(&PathBuf::from(sheet_path)).await?;
    let key = Document::read(&PathBuf::from(key_path)).await?;

    let report = evaluator.evaluate(&sheet, &key).await;
    if !report.is_completed() {
        anyhow::bail!(report.message.unwrap_or_else(|| "Evaluation failed".to_string()));
    }

    let body = serde_json::to_vec_pretty(&report.results)?;
    tokio::fs::write(output_path, body)
        .await
        .with_context(|| format!("failed to write {output_path}"))?;

    println!("Total score: {}", report.score_label());
    Ok(())
}
