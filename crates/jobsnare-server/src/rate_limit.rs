use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use moka::future::Cache;

use jobsnare_core::error::AppError;

use crate::error::ApiError;
use crate::state::AppState;

/// Upper bound on distinct clients tracked at once.
const MAX_TRACKED_CLIENTS: u64 = 100_000;

/// Fixed-window request counter keyed by client id.
///
/// A client's window opens on its first request and lasts `window`; the
/// cache entry expiring resets the count.
#[derive(Clone)]
pub struct RateLimiter {
    windows: Cache<String, Arc<AtomicU32>>,
    max_requests: u32,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        let windows = Cache::builder()
            .max_capacity(MAX_TRACKED_CLIENTS)
            .time_to_live(window)
            .build();
        Self {
            windows,
            max_requests,
        }
    }

    /// Count one request for `client`; false once the window's budget is spent.
    pub async fn check(&self, client: &str) -> bool {
        let hits = self
            .windows
            .get_with(client.to_string(), async { Arc::new(AtomicU32::new(0)) })
            .await;
        hits.fetch_add(1, Ordering::Relaxed) < self.max_requests
    }
}

/// Client id from `x-forwarded-for` (first hop), then `x-real-ip`, else `"unknown"`.
pub fn client_id(headers: &HeaderMap) -> String {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };
    header("x-forwarded-for")
        .or_else(|| header("x-real-ip"))
        .unwrap_or_else(|| "unknown".to_string())
}

/// Middleware that rejects clients over their request budget with 429.
pub async fn rate_limit(
    State(state): State<Arc<AppState>>,
    request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let client = client_id(request.headers());

    if !state.rate_limiter.check(&client).await {
        tracing::warn!(client = %client, path = %request.uri().path(), "Rate limit exceeded");
        return ApiError::from(AppError::RateLimitExceeded).into_response();
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[tokio::test]
    async fn test_budget_per_client() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));
        assert!(limiter.check("203.0.113.7").await);
        assert!(limiter.check("203.0.113.7").await);
        assert!(!limiter.check("203.0.113.7").await);
        assert!(!limiter.check("203.0.113.7").await);

        assert!(limiter.check("198.51.100.2").await);
    }

    #[tokio::test]
    async fn test_window_expiry_resets_budget() {
        let limiter = RateLimiter::new(1, Duration::from_millis(50));
        assert!(limiter.check("client").await);
        assert!(!limiter.check("client").await);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(limiter.check("client").await);
    }

    #[test]
    fn test_client_id_header_precedence() {
        let mut headers = HeaderMap::new();
        assert_eq!(client_id(&headers), "unknown");

        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.2"));
        assert_eq!(client_id(&headers), "198.51.100.2");

        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );
        assert_eq!(client_id(&headers), "203.0.113.7");
    }
}
