use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use jobsnare_client::{HttpFetcher, HttpSettings, JobExtractor};
use jobsnare_core::ScrapeService;
use jobsnare_server::config::ServerConfig;
use jobsnare_server::rate_limit::RateLimiter;
use jobsnare_server::routes;
use jobsnare_server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("jobsnare=info".parse()?))
        .with_target(false)
        .init();

    let config = ServerConfig::from_env().context("Invalid server configuration")?;
    let http = HttpFetcher::with_settings(HttpSettings::from_env()?)
        .context("Failed to create HTTP client")?;
    let browser = jobsnare_client::browser_executor().context("Invalid browser settings")?;
    let scraper = ScrapeService::new(http, browser, JobExtractor::new())
        .with_batch_delay(config.batch_delay);

    let state = Arc::new(AppState {
        scraper,
        rate_limiter: RateLimiter::new(config.rate_limit, config.rate_window),
    });

    let app = routes::router(state)
        .layer(RequestBodyLimitLayer::new(config.max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!(
        rate_limit = config.rate_limit,
        window_secs = config.rate_window.as_secs(),
        "Starting server on {addr}"
    );
    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    jobsnare_client::shutdown_browser().await;
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for CTRL+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    tracing::info!("Shutdown signal received");
}
