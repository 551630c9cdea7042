use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "jobsnare API",
        version = "0.1.0",
        description = "Job-posting scraper with per-domain fallback strategies and site-specific extraction."
    ),
    paths(
        crate::routes::parse_job,
        crate::routes::test_parse,
        crate::routes::batch_parse,
        crate::routes::health,
    ),
    components(schemas(
        crate::dto::ParseRequest,
        crate::dto::ParseResponse,
        crate::dto::ParseDebug,
        crate::dto::TestUsageResponse,
        crate::dto::TestResponse,
        crate::dto::JobSummary,
        crate::dto::ServiceStatus,
        crate::dto::BatchRequest,
        crate::dto::BatchResponse,
        crate::dto::BatchSummary,
        crate::dto::BatchItem,
        crate::dto::HealthResponse,
        crate::dto::ErrorResponse,
    )),
    tags(
        (name = "jobs", description = "Job posting extraction"),
        (name = "diagnostics", description = "Extraction quality checks"),
        (name = "system", description = "Health and system status"),
    )
)]
pub struct ApiDoc;
