use thiserror::Error;

/// Application-wide error types for jobsnare.
#[derive(Error, Debug)]
pub enum AppError {
    /// Every configured strategy failed for a URL.
    #[error("All {attempts} scraping strategies failed")]
    StrategyExhausted { attempts: usize },

    /// A request exceeded its time budget.
    #[error("Request timed out after {0} ms")]
    FetchTimeout(u64),

    /// The response looks like a bot-detection or captcha page.
    #[error("Blocked by target site: {0}")]
    FetchBlocked(String),

    /// The target answered with a non-success status.
    #[error("HTTP {status} for {url}")]
    FetchHttpError { status: u16, url: String },

    /// Network/connection error.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// A JS application shell was returned before client-side rendering.
    #[error("Shell content without job data: {0}")]
    ShellContent(String),

    /// The parser found neither a title nor a company/description.
    #[error("Extraction incomplete: {0}")]
    ExtractionIncomplete(String),

    /// Headless browser launch, navigation, or CDP failure.
    #[error("Browser error: {0}")]
    BrowserError(String),

    /// The input URL is not an absolute http(s) URL with a hostname.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Invalid configuration value.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Rate limit exceeded at the ingress layer.
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Generic error.
    #[error("{0}")]
    Generic(String),
}

impl AppError {
    /// Returns true if this error is transient and worth retrying inside an executor.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::NetworkError(_) | AppError::FetchTimeout(_) => true,
            AppError::FetchHttpError { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Short machine-readable name, recorded in attempt telemetry.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::StrategyExhausted { .. } => "StrategyExhausted",
            AppError::FetchTimeout(_) => "FetchTimeout",
            AppError::FetchBlocked(_) => "FetchBlocked",
            AppError::FetchHttpError { .. } => "FetchHttpError",
            AppError::NetworkError(_) => "FetchNetworkError",
            AppError::ShellContent(_) => "ShellContentError",
            AppError::ExtractionIncomplete(_) => "ExtractionIncomplete",
            AppError::BrowserError(_) => "BrowserError",
            AppError::InvalidUrl(_) => "InvalidUrl",
            AppError::ConfigError(_) => "ConfigError",
            AppError::RateLimitExceeded => "RateLimitExceeded",
            AppError::SerializationError(_) => "SerializationError",
            AppError::Generic(_) => "Error",
        }
    }
}
