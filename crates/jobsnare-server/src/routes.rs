use std::sync::Arc;

use axum::Router;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use jobsnare_core::models::ScrapeOptions;
use jobsnare_core::util::{normalize_host, validate_job_url};

use crate::dto::{
    BatchItem, BatchRequest, BatchResponse, BatchSummary, FieldCoverage, HealthResponse,
    JobSummary, ParseDebug, ParseRequest, ParseResponse, ServiceStatus, TestQuery, TestResponse,
    TestUsageResponse,
};
use crate::error::ApiError;
use crate::openapi::ApiDoc;
use crate::rate_limit::{client_id, rate_limit};
use crate::state::AppState;

/// Most URLs accepted by the batch endpoint.
pub const MAX_BATCH_URLS: usize = 5;

const TEST_URLS: &[&str] = &[
    "https://www.linkedin.com/jobs/view/3912345678",
    "https://www.indeed.com/viewjob?jk=0123456789abcdef",
    "https://wellfound.com/jobs/2891234-founding-engineer",
    "https://grabjobs.co/singapore/job/full-time/food-beverage/barista-12345",
    "https://jobs.lever.co/example/8f1c2d3e-0000-4000-8000-123456789abc",
];

/// Build the full router with all routes and middleware.
pub fn router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/v1/jobs/parse", post(parse_job))
        .route("/v1/jobs/parse/test", get(test_parse))
        .route("/v1/jobs/parse/batch", post(batch_parse))
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit));

    let public = Router::new()
        .route("/health", get(health))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    public.merge(api).with_state(state)
}

// ---------------------------------------------------------------------------
// Parse
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/v1/jobs/parse",
    request_body = ParseRequest,
    responses(
        (status = 200, description = "Parsed job, degraded to apply URL and source on failure", body = ParseResponse),
        (status = 400, description = "Invalid URL", body = crate::dto::ErrorResponse),
        (status = 429, description = "Rate limited", body = crate::dto::ErrorResponse),
    ),
    tag = "jobs"
)]
pub async fn parse_job(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    axum::Json(body): axum::Json<ParseRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let started_at = Utc::now();
    let client = client_id(&headers);

    if let Err(err) = validate_job_url(&body.url) {
        tracing::warn!(url = %body.url, client = %client, "Rejected job URL");
        return Err(err.into());
    }
    let domain = normalize_host(&body.url).unwrap_or_else(|| "unknown".to_string());
    tracing::info!(domain = %domain, url = %body.url, "Starting parse");

    let result = state
        .scraper
        .scrape(&body.url, ScrapeOptions { debug: body.debug })
        .await;
    let coverage = FieldCoverage::of(&result.job);
    let total_time_ms = (Utc::now() - started_at).num_milliseconds().max(0) as u64;

    let service = result
        .debug
        .final_strategy
        .map_or_else(|| "unknown".to_string(), |c| c.service.to_string());
    tracing::info!(
        domain = %domain,
        score = %coverage.success_score,
        total_ms = total_time_ms,
        service = %service,
        success = result.debug.success,
        "Parse completed"
    );

    let debug = body.debug.then(|| ParseDebug {
        started_at,
        requested_url: body.url.clone(),
        domain,
        client_id: client,
        success: result.debug.success,
        success_score: coverage.success_score,
        filled_fields: coverage.filled,
        missing_fields: coverage.missing,
        total_time_ms,
        scraping: result.debug,
    });

    Ok(axum::Json(ParseResponse {
        job: result.job,
        debug,
    }))
}

// ---------------------------------------------------------------------------
// Diagnostics
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/v1/jobs/parse/test",
    params(TestQuery),
    responses(
        (status = 200, description = "Extraction metrics for `url`, or usage help when it is absent", body = TestResponse),
        (status = 400, description = "Invalid URL", body = crate::dto::ErrorResponse),
        (status = 429, description = "Rate limited", body = crate::dto::ErrorResponse),
    ),
    tag = "diagnostics"
)]
pub async fn test_parse(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TestQuery>,
) -> Result<Response, ApiError> {
    let Some(url) = query.url else {
        let usage = TestUsageResponse {
            message: "Job parsing test endpoint".to_string(),
            usage: "Add ?url=<job_url>&verbose=true".to_string(),
            test_urls: TEST_URLS.iter().map(|u| u.to_string()).collect(),
            services: ServiceStatus::current(),
            examples: vec![
                "/v1/jobs/parse/test?url=https://www.indeed.com/viewjob?jk=test&verbose=true"
                    .to_string(),
            ],
        };
        return Ok(axum::Json(usage).into_response());
    };

    validate_job_url(&url)?;
    tracing::info!(url = %url, verbose = query.verbose, "Testing job URL");

    let result = state.scraper.scrape(&url, ScrapeOptions { debug: true }).await;
    let coverage = FieldCoverage::of(&result.job);
    let domain_info = state.scraper.strategies().resolve(&url).clone();

    let response = TestResponse {
        success: result.debug.success,
        url,
        total_time_ms: result.debug.total_time_ms,
        success_score: coverage.success_score,
        filled_fields: coverage.filled,
        missing_fields: coverage.missing,
        domain_info,
        job: JobSummary::from(&result.job),
        debug: query.verbose.then_some(result.debug),
        full_job: query.verbose.then_some(result.job),
    };

    Ok(axum::Json(response).into_response())
}

#[utoipa::path(
    post,
    path = "/v1/jobs/parse/batch",
    request_body = BatchRequest,
    responses(
        (status = 200, description = "Per-URL results and a summary", body = BatchResponse),
        (status = 400, description = "Empty or oversized URL list", body = crate::dto::ErrorResponse),
        (status = 429, description = "Rate limited", body = crate::dto::ErrorResponse),
    ),
    tag = "diagnostics"
)]
pub async fn batch_parse(
    State(state): State<Arc<AppState>>,
    axum::Json(body): axum::Json<BatchRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if body.urls.is_empty() {
        return Err(ApiError::BadRequest(
            "Please provide an array of URLs to test".to_string(),
        ));
    }
    if body.urls.len() > MAX_BATCH_URLS {
        return Err(ApiError::BadRequest(format!(
            "Maximum {MAX_BATCH_URLS} URLs allowed for batch testing"
        )));
    }

    let checked: Vec<(String, Result<(), String>)> = body
        .urls
        .into_iter()
        .map(|url| {
            let check = validate_job_url(&url).map(|_| ()).map_err(|e| e.to_string());
            (url, check)
        })
        .collect();
    let valid: Vec<String> = checked
        .iter()
        .filter(|(_, check)| check.is_ok())
        .map(|(url, _)| url.clone())
        .collect();

    let options = ScrapeOptions {
        debug: body.verbose,
    };
    let mut scraped = state
        .scraper
        .scrape_batch(&valid, options, &CancellationToken::new())
        .await
        .into_iter();

    let results: Vec<BatchItem> = checked
        .into_iter()
        .filter_map(|(url, check)| match check {
            Ok(()) => scraped
                .next()
                .map(|result| BatchItem::scraped(&url, result, body.verbose)),
            Err(reason) => Some(BatchItem::rejected(&url, reason)),
        })
        .collect();

    let summary = BatchSummary::of(&results);
    tracing::info!(
        total = summary.total,
        successful = summary.successful,
        "Batch test completed"
    );

    Ok(axum::Json(BatchResponse { summary, results }))
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    ),
    tag = "system"
)]
pub async fn health() -> impl IntoResponse {
    axum::Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        services: ServiceStatus::current(),
    })
}
