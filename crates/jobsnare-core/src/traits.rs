use std::future::Future;

use crate::error::AppError;
use crate::models::{FetchTrace, ParsedJob, ScrapingConfig};

/// Fetches raw HTML for a URL using one scraping strategy.
///
/// Implementations bound their own retries and timeouts and record what
/// they did in `trace`, on success and failure.
pub trait Fetcher: Send + Sync + Clone {
    fn fetch(
        &self,
        url: &str,
        config: &ScrapingConfig,
        trace: &mut FetchTrace,
    ) -> impl Future<Output = Result<String, AppError>> + Send;
}

/// Turns fetched HTML into a [`ParsedJob`].
pub trait Extractor: Send + Sync + Clone {
    /// URLs to fetch for a job page, in order. The first entry is usually
    /// the job URL itself.
    fn candidate_urls(&self, url: &str) -> Vec<String>;

    /// Parse `html` fetched for the job at `url`.
    fn extract(&self, url: &str, html: &str) -> Result<ParsedJob, AppError>;
}

/// A fetcher that always fails, for builds without browser support.
#[derive(Debug, Clone)]
pub struct DisabledFetcher;

impl Fetcher for DisabledFetcher {
    async fn fetch(
        &self,
        _url: &str,
        _config: &ScrapingConfig,
        trace: &mut FetchTrace,
    ) -> Result<String, AppError> {
        let err = AppError::BrowserError("browser support is not enabled".into());
        trace.error_name = Some(err.kind().to_string());
        trace.error = Some(err.to_string());
        Err(err)
    }
}
