use std::time::{Duration, Instant};

use jobsnare_core::error::AppError;
use jobsnare_core::models::{FetchTrace, ProxyProfile, ScrapingConfig};
use jobsnare_core::traits::Fetcher;
use jobsnare_core::util::{ensure_public_host, env_var};
use rand::Rng;
use rand::seq::SliceRandom;
use reqwest::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use url::Url;

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:120.0) Gecko/20100101 Firefox/120.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:120.0) Gecko/20100101 Firefox/120.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1.2 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 Edg/120.0.0.0",
];

const ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.9";

const DIRECT_BLOCK_MARKERS: &[&str] = &["blocked", "captcha", "robot", "forbidden"];
const READER_BLOCK_MARKERS: &[&str] = &["blocked", "captcha", "robot"];
const NOT_FOUND_MARKERS: &[&str] = &["404", "not found", "page does not exist"];

/// Pick a user agent from the rotation pool.
pub fn random_user_agent() -> &'static str {
    USER_AGENTS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(USER_AGENTS[0])
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Tunables for [`HttpFetcher`].
#[derive(Debug, Clone)]
pub struct HttpSettings {
    /// Hard cap on a single request.
    pub request_timeout: Duration,
    /// Retries on timeouts, network errors, 429 and 5xx.
    pub max_retries: u32,
    /// Retry `n` waits `retry_backoff_base * (n + 1)`.
    pub retry_backoff_base: Duration,
    /// Random delay before the first request, inclusive range in ms.
    pub jitter_ms: (u64, u64),
    /// Bodies longer than this many chars are truncated.
    pub max_body_chars: usize,
    /// Read-through proxy prefix used once on 403.
    pub reader_base: String,
    /// Proxy URL for strategies with `proxy_profile = residential`.
    pub residential_proxy: Option<String>,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(25),
            max_retries: 2,
            retry_backoff_base: Duration::from_millis(2000),
            jitter_ms: (500, 1500),
            max_body_chars: 2_000_000,
            reader_base: "https://r.jina.ai/".to_string(),
            residential_proxy: None,
        }
    }
}

impl HttpSettings {
    /// Defaults overridden by `JOBSNARE_HTTP_*`, `JOBSNARE_READER_BASE` and
    /// `JOBSNARE_RESIDENTIAL_PROXY`.
    pub fn from_env() -> Result<Self, AppError> {
        let mut settings = Self::default();

        if let Some(ms) = env_var::<u64>("JOBSNARE_HTTP_TIMEOUT_MS")? {
            settings.request_timeout = Duration::from_millis(ms);
        }
        if let Some(n) = env_var::<u32>("JOBSNARE_HTTP_MAX_RETRIES")? {
            settings.max_retries = n;
        }
        if let Some(ms) = env_var::<u64>("JOBSNARE_HTTP_BACKOFF_MS")? {
            settings.retry_backoff_base = Duration::from_millis(ms);
        }
        if let Some(ms) = env_var::<u64>("JOBSNARE_HTTP_JITTER_MIN_MS")? {
            settings.jitter_ms.0 = ms;
        }
        if let Some(ms) = env_var::<u64>("JOBSNARE_HTTP_JITTER_MAX_MS")? {
            settings.jitter_ms.1 = ms;
        }
        if let Some(n) = env_var::<usize>("JOBSNARE_HTTP_MAX_BODY_CHARS")? {
            settings.max_body_chars = n;
        }
        if let Some(base) = env_var::<String>("JOBSNARE_READER_BASE")? {
            settings.reader_base = base;
        }
        settings.residential_proxy = env_var::<String>("JOBSNARE_RESIDENTIAL_PROXY")?;

        if settings.jitter_ms.0 > settings.jitter_ms.1 {
            return Err(AppError::ConfigError(format!(
                "jitter range {}..{} ms is inverted",
                settings.jitter_ms.0, settings.jitter_ms.1
            )));
        }

        Ok(settings)
    }

    /// No jitter, no backoff. Handy for tests against local mock servers.
    pub fn fast() -> Self {
        Self {
            retry_backoff_base: Duration::ZERO,
            jitter_ms: (0, 0),
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// HttpFetcher
// ---------------------------------------------------------------------------

/// Lightweight HTTP executor built on reqwest.
///
/// Rotates user agents, sends site-specific header profiles, retries
/// transient failures with linear backoff and falls back to a read-through
/// proxy once when the target answers 403.
///
/// By default, SSRF protection is **enabled**: requests to private/reserved
/// IP ranges are blocked. Use [`allow_private_urls`](Self::allow_private_urls)
/// to disable this (e.g. for CLI usage or local mock servers).
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
    residential: Option<Client>,
    settings: HttpSettings,
    ssrf_protection: bool,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, AppError> {
        Self::with_settings(HttpSettings::default())
    }

    pub fn with_settings(settings: HttpSettings) -> Result<Self, AppError> {
        let client = Client::builder()
            .build()
            .map_err(|e| AppError::ConfigError(format!("HTTP client: {e}")))?;
        Self::from_client(client, settings)
    }

    /// Use a pre-built client (custom DNS overrides, TLS roots, ...).
    ///
    /// The residential proxy client, if configured, is still built here.
    pub fn from_client(client: Client, settings: HttpSettings) -> Result<Self, AppError> {
        let residential = match &settings.residential_proxy {
            Some(proxy_url) => {
                let proxy = reqwest::Proxy::all(proxy_url)
                    .map_err(|e| AppError::ConfigError(format!("residential proxy: {e}")))?;
                let client = Client::builder()
                    .proxy(proxy)
                    .build()
                    .map_err(|e| AppError::ConfigError(format!("HTTP client: {e}")))?;
                Some(client)
            }
            None => None,
        };

        Ok(Self {
            client,
            residential,
            settings,
            ssrf_protection: true,
        })
    }

    /// Disable SSRF protection, allowing requests to private/reserved IPs.
    pub fn allow_private_urls(mut self) -> Self {
        self.ssrf_protection = false;
        self
    }

    pub fn settings(&self) -> &HttpSettings {
        &self.settings
    }

    fn client_for(&self, config: &ScrapingConfig, trace: &mut FetchTrace) -> &Client {
        match (config.proxy_profile, &self.residential) {
            (ProxyProfile::Residential, Some(client)) => {
                trace.proxy = Some("residential".to_string());
                client
            }
            (ProxyProfile::Residential, None) => {
                trace.proxy = Some("residential-unconfigured-direct".to_string());
                &self.client
            }
            (ProxyProfile::Datacenter, _) => &self.client,
        }
    }

    fn jitter(&self) -> u64 {
        let (min, max) = self.settings.jitter_ms;
        if max == 0 {
            return 0;
        }
        rand::thread_rng().gen_range(min..=max)
    }

    /// Single 403 fallback through the read-through proxy. Returns `None`
    /// when the reader also fails; the reason is recorded on the trace.
    async fn reader_fallback(
        &self,
        target: &Url,
        timeout: Duration,
        trace: &mut FetchTrace,
    ) -> Option<String> {
        let reader_url = reader_url(&self.settings.reader_base, target);
        trace.reader_fallback_url = Some(reader_url.clone());
        tracing::info!(reader_url = %reader_url, "403 received, trying reader fallback");

        let response = match self.client.get(&reader_url).timeout(timeout).send().await {
            Ok(r) => r,
            Err(e) => {
                trace.reader_error = Some(e.to_string());
                return None;
            }
        };

        let status = response.status();
        trace.reader_status = Some(status.as_u16());
        if !status.is_success() {
            trace.reader_error = Some(format!("HTTP {}", status.as_u16()));
            return None;
        }

        match response.text().await {
            Ok(body) => {
                trace.reader_used = true;
                Some(self.finish_body(body, READER_BLOCK_MARKERS, false, trace))
            }
            Err(e) => {
                trace.reader_error = Some(e.to_string());
                None
            }
        }
    }

    /// Record block/not-found markers, then cap the body.
    fn finish_body(
        &self,
        mut body: String,
        block_markers: &[&str],
        check_not_found: bool,
        trace: &mut FetchTrace,
    ) -> String {
        let lower = body.to_lowercase();
        let keywords: Vec<String> = block_markers
            .iter()
            .filter(|k| lower.contains(*k))
            .map(|k| k.to_string())
            .collect();
        if !keywords.is_empty() {
            trace.possible_block = true;
            trace.block_keywords = keywords;
        }
        if check_not_found && NOT_FOUND_MARKERS.iter().any(|m| lower.contains(m)) {
            trace.possible_not_found = true;
        }

        let original_len = body.chars().count();
        if let Some((cut, _)) = body.char_indices().nth(self.settings.max_body_chars) {
            body.truncate(cut);
            trace.truncated = true;
            trace.original_length = Some(original_len);
        }
        trace.html_length = Some(body.chars().count());
        body
    }
}

impl Fetcher for HttpFetcher {
    async fn fetch(
        &self,
        url: &str,
        config: &ScrapingConfig,
        trace: &mut FetchTrace,
    ) -> Result<String, AppError> {
        let result = self.fetch_inner(url, config, trace).await;
        if let Err(e) = &result {
            trace.error_name = Some(e.kind().to_string());
            trace.error = Some(e.to_string());
        }
        result
    }
}

impl HttpFetcher {
    async fn fetch_inner(
        &self,
        url: &str,
        config: &ScrapingConfig,
        trace: &mut FetchTrace,
    ) -> Result<String, AppError> {
        let target = Url::parse(url).map_err(|e| AppError::InvalidUrl(format!("{url}: {e}")))?;
        if self.ssrf_protection {
            ensure_public_host(&target).await?;
        }

        let host = target.host_str().unwrap_or_default().to_ascii_lowercase();
        let client = self.client_for(config, trace);
        // The HTTP executor has fixed bounds; `config.retries` and
        // `config.timeout_ms` only steer the browser executor.
        let max_retries = self.settings.max_retries;
        let timeout = self.settings.request_timeout;

        let delay = self.jitter();
        if delay > 0 {
            trace.pre_request_delay_ms = Some(delay);
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        let mut retry = 0;
        loop {
            trace.retries = retry;
            let user_agent = random_user_agent();
            let (headers, profile) = build_headers(&host, user_agent);
            trace.user_agent = Some(user_agent.to_string());
            trace.header_profile = profile.map(str::to_string);

            let started = Instant::now();
            let sent = client.get(url).headers(headers).timeout(timeout).send().await;
            trace.fetch_duration_ms = Some(started.elapsed().as_millis() as u64);

            let err = match sent {
                Ok(response) => {
                    let status = response.status();
                    trace.status = Some(status.as_u16());
                    trace.final_url = Some(response.url().to_string());

                    if status.is_success() {
                        let body = response
                            .text()
                            .await
                            .map_err(|e| AppError::NetworkError(format!("reading body: {e}")))?;
                        tracing::debug!(url, bytes = body.len(), "HTTP fetch ok");
                        return Ok(self.finish_body(body, DIRECT_BLOCK_MARKERS, true, trace));
                    }

                    if status.as_u16() == 403 {
                        if let Some(body) = self.reader_fallback(&target, timeout, trace).await {
                            return Ok(body);
                        }
                    }

                    AppError::FetchHttpError {
                        status: status.as_u16(),
                        url: url.to_string(),
                    }
                }
                Err(e) => map_reqwest_error(e, timeout),
            };

            if err.is_retryable() && retry < max_retries {
                let backoff = self.settings.retry_backoff_base * (retry + 1);
                tracing::warn!(
                    url,
                    retry = retry + 1,
                    max_retries,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %err,
                    "Retrying HTTP fetch"
                );
                tokio::time::sleep(backoff).await;
                retry += 1;
                continue;
            }

            return Err(err);
        }
    }
}

fn map_reqwest_error(e: reqwest::Error, timeout: Duration) -> AppError {
    if e.is_timeout() {
        AppError::FetchTimeout(timeout.as_millis() as u64)
    } else if e.is_connect() {
        AppError::NetworkError(format!("Connection failed: {e}"))
    } else {
        AppError::NetworkError(e.to_string())
    }
}

/// `{base}http://{host}{path}{?query}`
fn reader_url(base: &str, target: &Url) -> String {
    let mut url = format!(
        "{base}http://{}{}",
        target.host_str().unwrap_or_default(),
        target.path()
    );
    if let Some(query) = target.query() {
        url.push('?');
        url.push_str(query);
    }
    url
}

// ---------------------------------------------------------------------------
// Header profiles
// ---------------------------------------------------------------------------

/// Baseline browser headers plus a per-site profile. Returns the profile
/// name when one was applied.
fn build_headers(host: &str, user_agent: &'static str) -> (HeaderMap, Option<&'static str>) {
    let mut headers = HeaderMap::new();
    let mut set = |name: &'static str, value: &'static str| {
        headers.insert(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        );
    };

    set("user-agent", user_agent);
    set("accept", ACCEPT);
    set("accept-language", "en-US,en;q=0.9");
    set("cache-control", "no-cache");
    set("pragma", "no-cache");

    let profile = if host.contains("linkedin.com") {
        set("referer", "https://www.google.com/");
        set_navigation_headers(&mut set);
        Some("LinkedIn")
    } else if host.contains("indeed.com") {
        let mut rng = rand::thread_rng();
        let referer = if rng.gen_bool(0.5) {
            "https://www.google.com/"
        } else {
            "https://www.indeed.com/"
        };
        let platform = if rng.gen_bool(0.5) {
            "\"macOS\""
        } else {
            "\"Windows\""
        };
        set("referer", referer);
        set_navigation_headers(&mut set);
        set("dnt", "1");
        set("connection", "keep-alive");
        set(
            "sec-ch-ua",
            "\"Not_A Brand\";v=\"8\", \"Chromium\";v=\"120\", \"Google Chrome\";v=\"120\"",
        );
        set("sec-ch-ua-mobile", "?0");
        set("sec-ch-ua-platform", platform);
        Some("Indeed Enhanced")
    } else if host.contains("wellfound.com") || host.contains("angel.co") {
        set("referer", "https://www.google.com/");
        Some("Wellfound")
    } else {
        None
    };

    (headers, profile)
}

fn set_navigation_headers(set: &mut impl FnMut(&'static str, &'static str)) {
    set("sec-fetch-site", "cross-site");
    set("sec-fetch-mode", "navigate");
    set("sec-fetch-dest", "document");
    set("sec-fetch-user", "?1");
    set("upgrade-insecure-requests", "1");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_url_keeps_path_and_query() {
        let target = Url::parse("https://www.indeed.com/viewjob?jk=abc123&from=serp").unwrap();
        assert_eq!(
            reader_url("https://r.jina.ai/", &target),
            "https://r.jina.ai/http://www.indeed.com/viewjob?jk=abc123&from=serp"
        );
        let bare = Url::parse("https://jobs.lever.co/acme/1").unwrap();
        assert_eq!(
            reader_url("https://r.jina.ai/", &bare),
            "https://r.jina.ai/http://jobs.lever.co/acme/1"
        );
    }

    #[test]
    fn test_header_profiles() {
        let ua = random_user_agent();
        assert!(USER_AGENTS.contains(&ua));

        let (headers, profile) = build_headers("www.linkedin.com", ua);
        assert_eq!(profile, Some("LinkedIn"));
        assert_eq!(headers["referer"], "https://www.google.com/");
        assert_eq!(headers["sec-fetch-mode"], "navigate");

        let (headers, profile) = build_headers("www.indeed.com", ua);
        assert_eq!(profile, Some("Indeed Enhanced"));
        assert_eq!(headers["dnt"], "1");
        let platform = headers["sec-ch-ua-platform"].to_str().unwrap();
        assert!(platform == "\"macOS\"" || platform == "\"Windows\"");

        let (headers, profile) = build_headers("angel.co", ua);
        assert_eq!(profile, Some("Wellfound"));
        assert!(headers.get("sec-fetch-mode").is_none());

        let (headers, profile) = build_headers("example.com", ua);
        assert_eq!(profile, None);
        assert_eq!(headers["accept-language"], "en-US,en;q=0.9");
        assert!(headers.get("referer").is_none());
    }

    #[test]
    fn test_finish_body_flags_and_caps() {
        let settings = HttpSettings {
            max_body_chars: 10,
            ..HttpSettings::fast()
        };
        let fetcher = HttpFetcher::with_settings(settings).unwrap();
        let mut trace = FetchTrace::default();

        let body = fetcher.finish_body(
            "Please solve the CAPTCHA, page not found".to_string(),
            DIRECT_BLOCK_MARKERS,
            true,
            &mut trace,
        );

        assert_eq!(body, "Please sol");
        assert!(trace.truncated);
        assert_eq!(trace.original_length, Some(40));
        assert_eq!(trace.html_length, Some(10));
        assert!(trace.possible_block);
        assert_eq!(trace.block_keywords, vec!["captcha"]);
        assert!(trace.possible_not_found);
    }
}
