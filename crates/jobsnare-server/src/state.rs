use jobsnare_client::{BrowserExecutor, HttpFetcher, JobExtractor};
use jobsnare_core::ScrapeService;

use crate::rate_limit::RateLimiter;

/// The scrape pipeline wired with the production executors.
pub type JobScraper = ScrapeService<HttpFetcher, BrowserExecutor, JobExtractor>;

/// Shared application state, available to all route handlers via `State<Arc<AppState>>`.
pub struct AppState {
    pub scraper: JobScraper,
    /// Per-client request counter guarding the `/v1` routes.
    pub rate_limiter: RateLimiter,
}
