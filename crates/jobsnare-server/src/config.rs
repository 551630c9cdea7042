use std::time::Duration;

use jobsnare_core::error::AppError;
use jobsnare_core::util::env_var;

/// Server settings read from `JOBSNARE_SERVER_*` environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Requests allowed per client within one window.
    pub rate_limit: u32,
    pub rate_window: Duration,
    /// Pause between URLs on the batch endpoint.
    pub batch_delay: Duration,
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            rate_limit: 10,
            rate_window: Duration::from_secs(60),
            batch_delay: Duration::from_millis(1000),
            max_body_bytes: 64 * 1024,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let mut config = Self::default();

        if let Some(port) = env_var::<u16>("JOBSNARE_SERVER_PORT")? {
            config.port = port;
        }
        if let Some(limit) = env_var::<u32>("JOBSNARE_SERVER_RATE_LIMIT")? {
            config.rate_limit = limit;
        }
        if let Some(secs) = env_var::<u64>("JOBSNARE_SERVER_RATE_WINDOW_SECS")? {
            config.rate_window = Duration::from_secs(secs);
        }
        if let Some(ms) = env_var::<u64>("JOBSNARE_BATCH_DELAY_MS")? {
            config.batch_delay = Duration::from_millis(ms);
        }
        if let Some(bytes) = env_var::<usize>("JOBSNARE_SERVER_MAX_BODY_BYTES")? {
            config.max_body_bytes = bytes;
        }

        if config.rate_limit == 0 {
            return Err(AppError::ConfigError(
                "JOBSNARE_SERVER_RATE_LIMIT must be at least 1".to_string(),
            ));
        }
        if config.rate_window.is_zero() {
            return Err(AppError::ConfigError(
                "JOBSNARE_SERVER_RATE_WINDOW_SECS must be at least 1".to_string(),
            ));
        }

        Ok(config)
    }
}
