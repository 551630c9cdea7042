use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use jobsnare_core::models::{DomainProfile, ParsedJob, ScrapeDebug, ScrapeResult};

// ---------------------------------------------------------------------------
// Parse
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct ParseRequest {
    pub url: String,
    /// Include scrape telemetry in the response.
    #[serde(default)]
    pub debug: bool,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ParseResponse {
    #[schema(value_type = Object)]
    pub job: ParsedJob,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<ParseDebug>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ParseDebug {
    pub started_at: DateTime<Utc>,
    pub requested_url: String,
    pub domain: String,
    pub client_id: String,
    pub success: bool,
    pub success_score: String,
    pub filled_fields: Vec<String>,
    pub missing_fields: Vec<String>,
    pub total_time_ms: u64,
    #[schema(value_type = Object)]
    pub scraping: ScrapeDebug,
}

/// Which of the scored fields a job filled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldCoverage {
    pub success_score: String,
    pub filled: Vec<String>,
    pub missing: Vec<String>,
}

impl FieldCoverage {
    pub fn of(job: &ParsedJob) -> Self {
        let filled = job.filled_fields();
        let missing = jobsnare_core::models::SCORED_FIELDS
            .iter()
            .filter(|f| !filled.contains(f))
            .map(|f| f.to_string())
            .collect();
        Self {
            success_score: job.success_score(),
            filled: filled.into_iter().map(str::to_string).collect(),
            missing,
        }
    }
}

// ---------------------------------------------------------------------------
// Test endpoint
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TestQuery {
    /// Job URL to scrape. Omit to get usage help.
    pub url: Option<String>,
    /// Include the full job and scrape telemetry.
    #[serde(default)]
    pub verbose: bool,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TestUsageResponse {
    pub message: String,
    pub usage: String,
    pub test_urls: Vec<String>,
    pub services: ServiceStatus,
    pub examples: Vec<String>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ServiceStatus {
    pub http: bool,
    pub browser: bool,
}

impl ServiceStatus {
    pub fn current() -> Self {
        Self {
            http: true,
            browser: cfg!(feature = "browser"),
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TestResponse {
    pub success: bool,
    pub url: String,
    pub total_time_ms: u64,
    pub success_score: String,
    pub filled_fields: Vec<String>,
    pub missing_fields: Vec<String>,
    #[schema(value_type = Object)]
    pub domain_info: DomainProfile,
    pub job: JobSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub debug: Option<ScrapeDebug>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub full_job: Option<ParsedJob>,
}

/// Compact view of a job for diagnostics.
#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JobSummary {
    pub title: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub has_description: bool,
    pub description_length: usize,
    pub salary: Option<String>,
    pub source: String,
}

impl From<&ParsedJob> for JobSummary {
    fn from(job: &ParsedJob) -> Self {
        Self {
            title: job.title.clone(),
            company: job.company.clone(),
            location: job.location.clone(),
            has_description: job.description.is_some(),
            description_length: job.description.as_deref().map_or(0, |d| d.chars().count()),
            salary: job.salary.clone(),
            source: job.source.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Batch
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct BatchRequest {
    /// At most five job URLs, scraped one after another.
    pub urls: Vec<String>,
    #[serde(default)]
    pub verbose: bool,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct BatchResponse {
    pub summary: BatchSummary,
    pub results: Vec<BatchItem>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub total: usize,
    pub successful: usize,
    /// Rounded percentage, e.g. `"50%"`.
    pub success_rate: String,
    pub average_time_ms: u64,
    pub total_attempts: usize,
}

impl BatchSummary {
    pub fn of(results: &[BatchItem]) -> Self {
        let total = results.len();
        let successful = results.iter().filter(|r| r.success).count();
        let time: u64 = results.iter().filter_map(|r| r.total_time_ms).sum();
        let success_rate = if total == 0 {
            0
        } else {
            (successful as f64 / total as f64 * 100.0).round() as u64
        };
        Self {
            total,
            successful,
            success_rate: format!("{success_rate}%"),
            average_time_ms: time / total.max(1) as u64,
            total_attempts: results.iter().filter_map(|r| r.attempts).sum(),
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BatchItem {
    pub url: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success_score: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempts: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_time_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filled_fields: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub job: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub debug: Option<ScrapeDebug>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BatchItem {
    pub fn scraped(url: &str, result: ScrapeResult, verbose: bool) -> Self {
        let coverage = FieldCoverage::of(&result.job);
        let job = if verbose {
            serde_json::to_value(&result.job).ok()
        } else {
            Some(serde_json::json!({
                "title": result.job.title,
                "company": result.job.company,
                "hasDescription": result.job.description.is_some(),
            }))
        };
        Self {
            url: url.to_string(),
            success: result.debug.success,
            success_score: Some(coverage.success_score),
            service: Some(
                result
                    .debug
                    .final_strategy
                    .map_or_else(|| "unknown".to_string(), |c| c.service.to_string()),
            ),
            attempts: Some(result.debug.attempts.len()),
            total_time_ms: Some(result.debug.total_time_ms),
            filled_fields: Some(coverage.filled),
            job,
            debug: verbose.then_some(result.debug),
            error: None,
        }
    }

    pub fn rejected(url: &str, error: String) -> Self {
        Self {
            url: url.to_string(),
            success: false,
            success_score: None,
            service: None,
            attempts: None,
            total_time_ms: None,
            filled_fields: None,
            job: None,
            debug: None,
            error: Some(error),
        }
    }
}

// ---------------------------------------------------------------------------
// Health & errors
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub services: ServiceStatus,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_limited: Option<bool>,
}
