use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use jobsnare_core::error::AppError;

use crate::dto::ErrorResponse;

/// Errors a handler can return; rendered as JSON [`ErrorResponse`] bodies.
#[derive(Debug)]
pub enum ApiError {
    App(AppError),
    /// The request body or query is well-formed JSON but unacceptable.
    BadRequest(String),
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self::App(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = match self {
            ApiError::BadRequest(message) => {
                let body = ErrorResponse {
                    error: message,
                    message: None,
                    rate_limited: None,
                };
                return (StatusCode::BAD_REQUEST, axum::Json(body)).into_response();
            }
            ApiError::App(err) => err,
        };

        let (status, error, rate_limited) = match &err {
            AppError::InvalidUrl(_) => (StatusCode::BAD_REQUEST, "Invalid URL", None),
            AppError::SerializationError(_) => {
                (StatusCode::BAD_REQUEST, "Invalid request body", None)
            }
            AppError::RateLimitExceeded => (
                StatusCode::TOO_MANY_REQUESTS,
                "Rate limit exceeded. Please try again later.",
                Some(true),
            ),
            AppError::FetchTimeout(_) => (StatusCode::GATEWAY_TIMEOUT, "Upstream timeout", None),
            AppError::ConfigError(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Configuration error", None)
            }
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "Internal error", None),
        };

        if status.is_server_error() {
            tracing::error!(error = %err, kind = err.kind(), "Request failed");
        }

        let message = match err {
            AppError::RateLimitExceeded => None,
            other => Some(other.to_string()),
        };
        let body = ErrorResponse {
            error: error.to_string(),
            message,
            rate_limited,
        };

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn render(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_invalid_url_is_400() {
        let (status, body) = render(AppError::InvalidUrl("ftp://x".into()).into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid URL");
        assert_eq!(body["message"], "Invalid URL: ftp://x");
    }

    #[tokio::test]
    async fn test_rate_limited_body() {
        let (status, body) = render(AppError::RateLimitExceeded.into()).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["error"], "Rate limit exceeded. Please try again later.");
        assert_eq!(body["rateLimited"], true);
        assert!(body.get("message").is_none());
    }

    #[tokio::test]
    async fn test_bad_request_message() {
        let (status, body) = render(ApiError::BadRequest("Too many URLs".into())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Too many URLs");
        assert!(body.get("rateLimited").is_none());
    }
}
