use std::time::Duration;

use chrono::Utc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::AppError;
use crate::models::{
    FetchService, FetchTrace, ParsedJob, ScrapeAttempt, ScrapeDebug, ScrapeOptions, ScrapeResult,
    ScrapingConfig,
};
use crate::strategy::StrategyTable;
use crate::traits::{Extractor, Fetcher};
use crate::util::normalize_host;

const DEFAULT_BACKOFF_BASE: Duration = Duration::from_millis(1000);
const DEFAULT_BATCH_DELAY: Duration = Duration::from_millis(1000);

/// Orchestrates a scrape: strategy lookup → fetch → extract, falling back
/// through the domain's strategies until one yields a usable job.
///
/// Generic over both fetch executors and the extractor layer so tests can
/// run without network or a browser.
pub struct ScrapeService<H, B, X>
where
    H: Fetcher,
    B: Fetcher,
    X: Extractor,
{
    http: H,
    browser: B,
    extractor: X,
    strategies: StrategyTable,
    backoff_base: Duration,
    batch_delay: Duration,
}

impl<H, B, X> ScrapeService<H, B, X>
where
    H: Fetcher,
    B: Fetcher,
    X: Extractor,
{
    /// Create a ScrapeService using the built-in strategy table.
    pub fn new(http: H, browser: B, extractor: X) -> Self {
        Self::with_strategies(http, browser, extractor, StrategyTable::builtin())
    }

    /// Create a ScrapeService with a custom strategy table.
    pub fn with_strategies(http: H, browser: B, extractor: X, strategies: StrategyTable) -> Self {
        Self {
            http,
            browser,
            extractor,
            strategies,
            backoff_base: DEFAULT_BACKOFF_BASE,
            batch_delay: DEFAULT_BATCH_DELAY,
        }
    }

    /// Base of the linear backoff between strategies (`base * (attempt + 1)`).
    pub fn with_backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    /// Pause between URLs in [`scrape_batch`](Self::scrape_batch).
    pub fn with_batch_delay(mut self, delay: Duration) -> Self {
        self.batch_delay = delay;
        self
    }

    pub fn strategies(&self) -> &StrategyTable {
        &self.strategies
    }

    /// Scrape a single job URL.
    ///
    /// Never fails: when every strategy fails the result carries a minimal
    /// job (`apply_url` + `source`) and `debug.success == false`.
    pub async fn scrape(&self, url: &str, options: ScrapeOptions) -> ScrapeResult {
        let started = Instant::now();

        let Some(host) = normalize_host(url) else {
            tracing::warn!(url, "Unparseable URL, returning minimal job");
            return ScrapeResult {
                job: ParsedJob::minimal(url, "unknown"),
                debug: ScrapeDebug::default(),
            };
        };

        let profile = self.strategies.resolve(url);
        let max_attempts = profile.configs.len();
        let mut debug = ScrapeDebug {
            domain_profile: Some(profile.clone()),
            ..Default::default()
        };

        for attempt in 0..max_attempts {
            let config = self.strategies.strategy_for(url, attempt);
            tracing::info!(
                url,
                attempt = attempt + 1,
                max_attempts,
                service = %config.service,
                "Starting scrape attempt"
            );

            let started_at = Utc::now();
            let attempt_start = Instant::now();
            let mut fetches = Vec::new();
            let outcome = self.run_attempt(url, &config, &mut fetches).await;
            let duration_ms = elapsed_ms(attempt_start);

            if options.debug {
                for trace in &fetches {
                    tracing::info!(trace = ?trace, "Fetch trace");
                }
            }

            match outcome {
                Ok(job) => {
                    debug.attempts.push(ScrapeAttempt {
                        config,
                        started_at,
                        duration_ms,
                        success: true,
                        error_kind: None,
                        error_message: None,
                        fetches,
                    });
                    debug.success = true;
                    debug.final_strategy = Some(config);
                    debug.total_time_ms = elapsed_ms(started);

                    tracing::info!(
                        url,
                        attempt = attempt + 1,
                        service = %config.service,
                        score = %job.success_score(),
                        "Scrape succeeded"
                    );
                    return ScrapeResult { job, debug };
                }
                Err(err) => {
                    tracing::warn!(
                        url,
                        attempt = attempt + 1,
                        service = %config.service,
                        error = %err,
                        "Scrape attempt failed"
                    );
                    debug.attempts.push(ScrapeAttempt {
                        config,
                        started_at,
                        duration_ms,
                        success: false,
                        error_kind: Some(err.kind().to_string()),
                        error_message: Some(err.to_string()),
                        fetches,
                    });

                    if attempt + 1 < max_attempts {
                        let backoff = self.backoff_base * (attempt as u32 + 1);
                        tokio::time::sleep(backoff).await;
                        debug.total_backoff_ms += backoff.as_millis() as u64;
                    }
                }
            }
        }

        let exhausted = AppError::StrategyExhausted {
            attempts: max_attempts,
        };
        tracing::error!(url, error = %exhausted, "Returning minimal job");

        debug.total_time_ms = elapsed_ms(started);
        ScrapeResult {
            job: ParsedJob::minimal(url, host),
            debug,
        }
    }

    /// Scrape URLs one after another with a polite pause in between.
    ///
    /// Stops early (returning what was scraped so far) once `cancel` fires.
    pub async fn scrape_batch(
        &self,
        urls: &[String],
        options: ScrapeOptions,
        cancel: &CancellationToken,
    ) -> Vec<ScrapeResult> {
        let mut results = Vec::with_capacity(urls.len());

        for (i, url) in urls.iter().enumerate() {
            if i > 0 {
                tokio::select! {
                    _ = cancel.cancelled() => {}
                    _ = tokio::time::sleep(self.batch_delay) => {}
                }
            }
            if cancel.is_cancelled() {
                tracing::warn!(
                    done = results.len(),
                    total = urls.len(),
                    "Batch cancelled"
                );
                break;
            }

            tracing::info!(url = %url, index = i + 1, total = urls.len(), "Batch scrape");
            results.push(self.scrape(url, options).await);
        }

        results
    }

    /// One strategy attempt: fetch each candidate URL with the chosen
    /// executor until one parses into a non-empty job.
    async fn run_attempt(
        &self,
        url: &str,
        config: &ScrapingConfig,
        fetches: &mut Vec<FetchTrace>,
    ) -> Result<ParsedJob, AppError> {
        let mut candidates = self.extractor.candidate_urls(url);
        if candidates.is_empty() {
            candidates.push(url.to_string());
        }

        let mut last_err = None;
        for candidate in &candidates {
            let mut trace = FetchTrace::new(candidate.as_str(), config.service);
            let fetched = match config.service {
                FetchService::Http => self.http.fetch(candidate, config, &mut trace).await,
                FetchService::Browser => self.browser.fetch(candidate, config, &mut trace).await,
            };
            fetches.push(trace);

            let html = match fetched {
                Ok(html) => html,
                Err(e) => {
                    tracing::debug!(candidate = %candidate, error = %e, "Candidate fetch failed");
                    last_err = Some(e);
                    continue;
                }
            };

            match self.extractor.extract(url, &html) {
                Ok(job) if !job.is_empty() => return Ok(job),
                Ok(_) => {
                    last_err = Some(AppError::ExtractionIncomplete(format!(
                        "no title, company or description at {candidate}"
                    )));
                }
                Err(e) => {
                    tracing::debug!(candidate = %candidate, error = %e, "Candidate parse failed");
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            AppError::ExtractionIncomplete(format!("nothing fetched for {url}"))
        }))
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}
