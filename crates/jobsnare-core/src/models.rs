use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which executor runs a strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchService {
    /// Lightweight reqwest-based fetcher.
    Http,
    /// Headless Chromium fetcher.
    Browser,
}

impl std::fmt::Display for FetchService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchService::Http => write!(f, "http"),
            FetchService::Browser => write!(f, "browser"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyProfile {
    Datacenter,
    Residential,
}

/// How aggressively a site is known to block automated traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockingLevel {
    Low,
    Medium,
    High,
    Extreme,
}

/// One strategy: a fetch method plus its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapingConfig {
    pub service: FetchService,
    pub js_rendering: bool,
    pub proxy_profile: ProxyProfile,
    /// Tries per call for the browser executor. The HTTP executor uses its
    /// own fixed retry count.
    pub retries: u32,
    /// Navigation budget for the browser executor.
    pub timeout_ms: u64,
    /// 1 = highest priority.
    pub priority: u32,
}

impl ScrapingConfig {
    pub const fn http(retries: u32, timeout_ms: u64, priority: u32) -> Self {
        Self {
            service: FetchService::Http,
            js_rendering: false,
            proxy_profile: ProxyProfile::Datacenter,
            retries,
            timeout_ms,
            priority,
        }
    }

    pub const fn browser(retries: u32, timeout_ms: u64, priority: u32) -> Self {
        Self {
            service: FetchService::Browser,
            js_rendering: true,
            proxy_profile: ProxyProfile::Datacenter,
            retries,
            timeout_ms,
            priority,
        }
    }

    pub const fn with_proxy(mut self, proxy_profile: ProxyProfile) -> Self {
        self.proxy_profile = proxy_profile;
        self
    }
}

/// Ordered strategies for hosts matching `domain_pattern`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainProfile {
    pub domain_pattern: String,
    /// Sorted by `priority` ascending; never empty.
    pub configs: Vec<ScrapingConfig>,
    pub blocking_level: BlockingLevel,
    pub requires_js: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// A normalized job posting. Every field except `apply_url` and `source`
/// may be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedJob {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub salary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub apply_url: String,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub posted_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qualifications: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub responsibilities: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub benefits: Option<Vec<String>>,
}

/// The four fields used to score how complete an extraction is.
pub const SCORED_FIELDS: [&str; 4] = ["title", "company", "location", "description"];

impl ParsedJob {
    /// The degraded job returned when nothing could be extracted.
    pub fn minimal(apply_url: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            apply_url: apply_url.into(),
            source: source.into(),
            ..Default::default()
        }
    }

    /// True when the job has neither a title nor a company/description.
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.company.is_none() && self.description.is_none()
    }

    /// Names of the scored fields that carry a value.
    pub fn filled_fields(&self) -> Vec<&'static str> {
        let values = [&self.title, &self.company, &self.location, &self.description];
        SCORED_FIELDS
            .iter()
            .zip(values)
            .filter(|(_, v)| v.as_deref().is_some_and(|s| !s.is_empty()))
            .map(|(name, _)| *name)
            .collect()
    }

    /// `"<filled>/<total>"` over [`SCORED_FIELDS`].
    pub fn success_score(&self) -> String {
        format!("{}/{}", self.filled_fields().len(), SCORED_FIELDS.len())
    }
}

/// Executor-level telemetry for one request.
///
/// Executors fill in what they know; everything is optional so the HTTP and
/// browser fetchers can share the type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchTrace {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executor: Option<FetchService>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header_profile: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pre_request_delay_ms: Option<u64>,
    pub retries: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetch_duration_ms: Option<u64>,
    pub possible_block: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub block_keywords: Vec<String>,
    pub possible_not_found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html_length: Option<usize>,
    pub truncated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reader_fallback_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reader_status: Option<u16>,
    pub reader_used: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reader_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub navigation_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub human_delay_ms: Option<u64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub readiness: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked_requests: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FetchTrace {
    pub fn new(url: impl Into<String>, executor: FetchService) -> Self {
        Self {
            url: url.into(),
            executor: Some(executor),
            ..Default::default()
        }
    }
}

/// One strategy attempt. Built completely before it is appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeAttempt {
    pub config: ScrapingConfig,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fetches: Vec<FetchTrace>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeDebug {
    pub success: bool,
    pub attempts: Vec<ScrapeAttempt>,
    pub total_time_ms: u64,
    /// Sum of the linear backoff sleeps between strategies.
    pub total_backoff_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_strategy: Option<ScrapingConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain_profile: Option<DomainProfile>,
}

/// Result of a scrape. Always populated, even on total failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeResult {
    pub job: ParsedJob,
    pub debug: ScrapeDebug,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ScrapeOptions {
    /// Emit per-attempt traces at `info` level instead of `debug`.
    pub debug: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_job_is_empty() {
        let job = ParsedJob::minimal("https://example.com/job", "example.com");
        assert!(job.is_empty());
        assert_eq!(job.apply_url, "https://example.com/job");
        assert_eq!(job.source, "example.com");
        assert_eq!(job.success_score(), "0/4");
    }

    #[test]
    fn filled_fields_ignores_blank_values() {
        let job = ParsedJob {
            title: Some("Engineer".into()),
            company: Some(String::new()),
            description: Some("Build things".into()),
            ..ParsedJob::minimal("u", "s")
        };
        assert_eq!(job.filled_fields(), vec!["title", "description"]);
        assert_eq!(job.success_score(), "2/4");
    }

    #[test]
    fn job_serializes_camel_case_without_missing_fields() {
        let job = ParsedJob {
            title: Some("Engineer".into()),
            posted_at: Some("2024-01-01".into()),
            ..ParsedJob::minimal("https://x.io", "x.io")
        };
        let json = serde_json::to_value(&job).unwrap();
        assert_eq!(json["applyUrl"], "https://x.io");
        assert_eq!(json["postedAt"], "2024-01-01");
        assert!(json.get("company").is_none());
    }

    #[test]
    fn config_constructors() {
        let c = ScrapingConfig::browser(2, 45_000, 1);
        assert_eq!(c.service, FetchService::Browser);
        assert!(c.js_rendering);
        let h = ScrapingConfig::http(1, 20_000, 2).with_proxy(ProxyProfile::Residential);
        assert_eq!(h.proxy_profile, ProxyProfile::Residential);
        assert_eq!(FetchService::Http.to_string(), "http");
    }
}
