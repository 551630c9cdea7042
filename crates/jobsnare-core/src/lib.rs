pub mod error;
pub mod models;
pub mod scrape;
pub mod strategy;
pub mod traits;
pub mod util;

#[cfg(test)]
pub mod testutil;

pub use error::AppError;
pub use models::{
    BlockingLevel, DomainProfile, FetchService, FetchTrace, ParsedJob, ProxyProfile,
    ScrapeAttempt, ScrapeDebug, ScrapeOptions, ScrapeResult, ScrapingConfig,
};
pub use scrape::ScrapeService;
pub use strategy::StrategyTable;
pub use traits::{DisabledFetcher, Extractor, Fetcher};
