/// Smoke-test for `BrowserFetcher`.
///
/// Launches a headless Chromium, renders <https://example.com> through one
/// browser strategy, and prints the trace the executor recorded.
///
/// Run with:
///   cargo run -p jobsnare-client --example browser_smoke --features browser
use jobsnare_client::{BrowserFetcher, BrowserSession, BrowserSettings};
use jobsnare_core::models::{FetchService, FetchTrace, ScrapingConfig};
use jobsnare_core::traits::Fetcher;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let settings = BrowserSettings::from_env()?;
    let fetcher = BrowserFetcher::new(settings);

    let url = "https://example.com";
    let config = ScrapingConfig::browser(1, 30_000, 1);
    let mut trace = FetchTrace::new(url, FetchService::Browser);

    println!("Rendering {url} …");
    let result = fetcher.fetch(url, &config, &mut trace).await;
    BrowserSession::shutdown_global().await;
    let html = result?;

    assert!(
        html.contains("Example Domain"),
        "Expected heading not found in rendered HTML"
    );
    assert_eq!(fetcher.active_contexts(), 0, "browser context leaked");

    println!("OK: got {} bytes of rendered HTML", html.len());
    println!("{}", serde_json::to_string_pretty(&trace)?);
    Ok(())
}
