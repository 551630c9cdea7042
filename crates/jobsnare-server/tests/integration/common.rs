use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use wiremock::MockServer;

use jobsnare_client::{HttpFetcher, HttpSettings, JobExtractor};
use jobsnare_core::models::{BlockingLevel, DomainProfile, ScrapingConfig};
use jobsnare_core::{ScrapeService, StrategyTable};
use jobsnare_server::rate_limit::RateLimiter;
use jobsnare_server::routes;
use jobsnare_server::state::AppState;

/// Hostname the mock job board answers on.
pub const BOARD_HOST: &str = "careers.acme.test";

pub const JOB_PAGE: &str = r#"<html><head>
<meta property="og:title" content="Site Reliability Engineer at Acme">
<meta property="og:description" content="Keep the fleet healthy.">
<meta property="og:site_name" content="Acme Careers">
<title>Site Reliability Engineer at Acme</title>
</head><body><h1>Site Reliability Engineer</h1></body></html>"#;

pub struct TestApp {
    pub router: Router,
    pub board: MockServer,
}

impl TestApp {
    /// Absolute URL of `path` on the mock job board.
    pub fn job_url(&self, path: &str) -> String {
        format!("http://{BOARD_HOST}:{}{path}", self.board.address().port())
    }
}

/// HTTP-only strategy table so tests never need a browser.
fn http_only_table() -> StrategyTable {
    let default = DomainProfile {
        domain_pattern: "default".to_string(),
        configs: vec![ScrapingConfig::http(0, 5_000, 1), ScrapingConfig::http(0, 5_000, 2)],
        blocking_level: BlockingLevel::Low,
        requires_js: false,
        notes: None,
    };
    StrategyTable::new(Vec::new(), default).expect("valid strategy table")
}

pub async fn setup_test_app() -> TestApp {
    setup_test_app_with_limit(100).await
}

/// Test app whose clients may send `limit` requests per minute.
pub async fn setup_test_app_with_limit(limit: u32) -> TestApp {
    let board = MockServer::start().await;
    let addr: SocketAddr = *board.address();

    let client = reqwest::Client::builder()
        .resolve(BOARD_HOST, addr)
        .build()
        .expect("Failed to build HTTP client");
    let http = HttpFetcher::from_client(client, HttpSettings::fast())
        .expect("Failed to create fetcher")
        .allow_private_urls();
    let browser = jobsnare_client::browser_executor().expect("browser executor");

    let scraper =
        ScrapeService::with_strategies(http, browser, JobExtractor::new(), http_only_table())
            .with_backoff_base(Duration::ZERO)
            .with_batch_delay(Duration::ZERO);

    let state = Arc::new(AppState {
        scraper,
        rate_limiter: RateLimiter::new(limit, Duration::from_secs(60)),
    });

    TestApp {
        router: routes::router(state),
        board,
    }
}
