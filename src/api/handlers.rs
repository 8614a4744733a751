use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use std::collections::HashMap;

use crate::core::metrics;
use crate::core::redis::RedisHealth;
use crate::core::state::AppState;
use crate::schemas::{HealthResponse, RootResponse};

pub(crate) async fn root(State(state): State<AppState>) -> Json<RootResponse> {
    Json(RootResponse {
        message: state.settings().api().project_name.clone(),
        version: state.settings().api().version.clone(),
    })
}

pub(crate) async fn healthz(State(state): State<AppState>) -> Json<HealthResponse> {
    let mut status = "healthy";
    let mut components = HashMap::new();

    let redis = match state.redis().health().await {
        RedisHealth::Healthy => "healthy".to_string(),
        RedisHealth::Disconnected => "disconnected".to_string(),
        RedisHealth::Unhealthy(error) => {
            status = "degraded";
            format!("unhealthy: {error}")
        }
    };
    components.insert("redis".to_string(), redis);

    let database = match sqlx::query("SELECT 1").execute(state.db()).await {
        Ok(_) => "healthy".to_string(),
        Err(err) => {
            status = "unhealthy";
            format!("unhealthy: {err}")
        }
    };
    components.insert("database".to_string(), database);

    let storage = if state.storage().is_some() { "configured" } else { "disabled" };
    components.insert("storage".to_string(), storage.to_string());

    Json(HealthResponse {
        service: "gradewise-api".to_string(),
        status: status.to_string(),
        components,
    })
}

pub(crate) async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    if !state.settings().telemetry().prometheus_enabled {
        return StatusCode::NOT_FOUND.into_response();
    }

    match metrics::render() {
        Some(body) => ([(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")], body)
            .into_response(),
        None => StatusCode::SERVICE_UNAVAILABLE.into_response(),
    }
}
