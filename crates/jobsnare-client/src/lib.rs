#[cfg(feature = "browser")]
pub mod browser_fetcher;
pub mod fetcher;
pub mod parsers;
pub mod text;

#[cfg(feature = "browser")]
pub use browser_fetcher::{BrowserFetcher, BrowserSession, BrowserSettings};
pub use fetcher::{HttpFetcher, HttpSettings};
pub use parsers::{JobExtractor, Site};

use jobsnare_core::error::AppError;

/// The browser executor compiled into this build.
#[cfg(feature = "browser")]
pub type BrowserExecutor = BrowserFetcher;
/// The browser executor compiled into this build.
#[cfg(not(feature = "browser"))]
pub type BrowserExecutor = jobsnare_core::traits::DisabledFetcher;

/// Browser executor configured from the environment. Without the `browser`
/// feature every browser strategy fails fast with `BrowserError`.
pub fn browser_executor() -> Result<BrowserExecutor, AppError> {
    #[cfg(feature = "browser")]
    {
        Ok(BrowserFetcher::new(BrowserSettings::from_env()?))
    }
    #[cfg(not(feature = "browser"))]
    {
        tracing::info!("Built without browser support; browser strategies will fail");
        Ok(jobsnare_core::traits::DisabledFetcher)
    }
}

/// Close the shared browser process, if one was launched. Safe to call more
/// than once.
pub async fn shutdown_browser() {
    #[cfg(feature = "browser")]
    BrowserSession::shutdown_global().await;
}
