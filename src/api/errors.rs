use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct ErrorResponse {
    status: u16,
    detail: String,
}

#[derive(Debug)]
pub(crate) enum ApiError {
    Unauthorized(&'static str),
    Forbidden(&'static str),
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    PayloadTooLarge(String),
    TooManyRequests(&'static str),
    ServiceUnavailable(String),
    Internal(String),
}

impl ApiError {
    /// Log the underlying error with context and return an `Internal` variant.
    pub(crate) fn internal(err: impl std::fmt::Display, context: &str) -> Self {
        tracing::error!(error = %err, "{context}");
        Self::Internal(context.to_string())
    }

    pub(crate) fn not_found(what: &str) -> Self {
        Self::NotFound(format!("{what} not found"))
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = match self {
            Self::Unauthorized(message)
            | Self::Forbidden(message)
            | Self::TooManyRequests(message) => message.to_string(),
            Self::ServiceUnavailable(message) => {
                tracing::warn!(error = %message, "Service unavailable");
                message
            }
            Self::Internal(message) => {
                tracing::error!(error = %message, "Internal server error");
                message
            }
            Self::BadRequest(message)
            | Self::NotFound(message)
            | Self::Conflict(message)
            | Self::PayloadTooLarge(message) => message,
        };

        let mut response =
            (status, Json(ErrorResponse { status: status.as_u16(), detail })).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn unauthorized_carries_bearer_challenge() {
        let response = ApiError::Unauthorized("Invalid authentication credentials").into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");

        let body = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let json: serde_json::Value = serde_json::from_slice(&body).expect("json");
        assert_eq!(json["status"], 401);
        assert_eq!(json["detail"], "Invalid authentication credentials");
    }

    #[tokio::test]
    async fn not_found_formats_detail() {
        let response = ApiError::not_found("Exam").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let json: serde_json::Value = serde_json::from_slice(&body).expect("json");
        assert_eq!(json["detail"], "Exam not found");
    }
}
