use axum::{
    body::Body,
    extract::DefaultBodyLimit,
    http::header::{HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE, ORIGIN},
    http::{HeaderName, Method, Request, Response},
    routing::get,
    Router,
};
use std::time::Duration;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    normalize_path::NormalizePathLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::Span;

use crate::api::{answers, auth, documents, evaluations, exams, handlers, student, users};
use crate::core::{config::Settings, state::AppState};

const REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Multipart framing on top of the per-file limit.
const MULTIPART_OVERHEAD_BYTES: usize = 1024 * 1024;
/// Answer sheets are uploaded in batches.
const MAX_FILES_PER_REQUEST: usize = 50;

pub(crate) fn router(state: AppState) -> Router {
    let settings = state.settings();

    let mut router: Router<AppState> = Router::new()
        .route("/", get(handlers::root))
        .route("/healthz", get(handlers::healthz).head(handlers::healthz))
        .nest(&settings.api().api_v1_str, api_v1(upload_body_limit(settings)))
        .layer(NormalizePathLayer::trim_trailing_slash())
        .layer(PropagateRequestIdLayer::new(REQUEST_ID))
        .layer(SetRequestIdLayer::new(REQUEST_ID, MakeRequestUuid))
        .layer(TraceLayer::new_for_http().make_span_with(request_span).on_response(record_response))
        .layer(build_cors_layer(settings));

    if settings.telemetry().prometheus_enabled {
        router = router.route("/metrics", get(handlers::metrics));
    }

    router.with_state(state)
}

fn api_v1(upload_limit: usize) -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/users", users::router())
        .nest("/exams", exams::router())
        .nest("/student", student::router())
        .nest("/answers", answers::router())
        .nest("/documents", documents::router().layer(DefaultBodyLimit::max(upload_limit)))
        .nest("/evaluations", evaluations::router())
}

fn request_span(request: &Request<Body>) -> Span {
    let request_id =
        request.headers().get(&REQUEST_ID).and_then(|value| value.to_str().ok()).unwrap_or("-");
    tracing::info_span!(
        "request",
        method = %request.method(),
        uri = %request.uri(),
        request_id = %request_id
    )
}

fn record_response(response: &Response<Body>, latency: Duration, _span: &Span) {
    let status = response.status().as_u16().to_string();
    metrics::counter!("http_requests_total", "status" => status.clone()).increment(1);
    metrics::histogram!("http_request_duration_seconds", "status" => status)
        .record(latency.as_secs_f64());
}

fn upload_body_limit(settings: &Settings) -> usize {
    let per_file = usize::try_from(settings.storage().max_upload_bytes()).unwrap_or(usize::MAX);
    per_file.saturating_mul(MAX_FILES_PER_REQUEST).saturating_add(MULTIPART_OVERHEAD_BYTES)
}

fn build_cors_layer(settings: &Settings) -> CorsLayer {
    let origins: Vec<HeaderValue> = settings
        .cors()
        .origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT, ORIGIN, REQUEST_ID])
        .expose_headers([REQUEST_ID])
        .max_age(Duration::from_secs(3600));

    // Wildcard origin cannot be combined with allow_credentials
    if origins.is_empty() {
        base.allow_origin(Any)
    } else {
        base.allow_credentials(true).allow_origin(AllowOrigin::list(origins))
    }
}
