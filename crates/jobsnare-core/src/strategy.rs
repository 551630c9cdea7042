//! Domain strategy table: which fetch strategies to try, in which order,
//! for a given job-board host.

use crate::error::AppError;
use crate::models::{BlockingLevel, DomainProfile, ScrapingConfig};
use crate::util::normalize_host;

/// Ordered list of domain profiles plus the fallback used for unknown hosts.
#[derive(Debug, Clone)]
pub struct StrategyTable {
    profiles: Vec<DomainProfile>,
    default: DomainProfile,
}

impl StrategyTable {
    /// Build a table from custom profiles.
    ///
    /// Each profile's configs are sorted by priority. Profiles without any
    /// config are rejected.
    pub fn new(
        profiles: Vec<DomainProfile>,
        default: DomainProfile,
    ) -> Result<Self, AppError> {
        let mut profiles = profiles;
        let mut default = default;

        for profile in profiles.iter_mut().chain(std::iter::once(&mut default)) {
            if profile.configs.is_empty() {
                return Err(AppError::ConfigError(format!(
                    "domain profile '{}' has no scraping configs",
                    profile.domain_pattern
                )));
            }
            profile.configs.sort_by_key(|c| c.priority);
        }

        Ok(Self { profiles, default })
    }

    /// The table shipped with jobsnare.
    pub fn builtin() -> Self {
        Self {
            profiles: builtin_profiles(),
            default: default_profile(),
        }
    }

    pub fn profiles(&self) -> &[DomainProfile] {
        &self.profiles
    }

    /// Find the profile for a URL.
    ///
    /// First profile whose pattern is contained in the host (or contains the
    /// host) wins. Unparseable URLs and unknown hosts get the default profile.
    pub fn resolve(&self, url: &str) -> &DomainProfile {
        let Some(host) = normalize_host(url) else {
            return &self.default;
        };

        self.profiles
            .iter()
            .find(|p| host.contains(&p.domain_pattern) || p.domain_pattern.contains(&host))
            .unwrap_or(&self.default)
    }

    /// Strategy for the given zero-based attempt, clamped to the last config.
    pub fn strategy_for(&self, url: &str, attempt: usize) -> ScrapingConfig {
        let configs = &self.resolve(url).configs;
        let idx = attempt.min(configs.len().saturating_sub(1));
        configs[idx]
    }

    pub fn max_attempts(&self, url: &str) -> usize {
        self.resolve(url).configs.len()
    }
}

impl Default for StrategyTable {
    fn default() -> Self {
        Self::builtin()
    }
}

fn profile(
    domain_pattern: &str,
    blocking_level: BlockingLevel,
    requires_js: bool,
    configs: Vec<ScrapingConfig>,
    notes: &str,
) -> DomainProfile {
    DomainProfile {
        domain_pattern: domain_pattern.to_string(),
        configs,
        blocking_level,
        requires_js,
        notes: Some(notes.to_string()),
    }
}

fn builtin_profiles() -> Vec<DomainProfile> {
    vec![
        profile(
            "linkedin.com",
            BlockingLevel::Extreme,
            true,
            vec![
                ScrapingConfig::browser(2, 45_000, 1),
                ScrapingConfig::http(1, 25_000, 2),
            ],
            "Aggressive bot detection; guest pages render descriptions client-side",
        ),
        profile(
            "indeed.com",
            BlockingLevel::High,
            true,
            vec![
                ScrapingConfig::browser(2, 35_000, 1),
                ScrapingConfig::http(2, 25_000, 2),
            ],
            "Cloudflare challenges on direct requests",
        ),
        profile(
            "glassdoor.com",
            BlockingLevel::High,
            true,
            vec![
                ScrapingConfig::browser(2, 35_000, 1),
                ScrapingConfig::http(1, 25_000, 2),
            ],
            "Login walls and heavy JS",
        ),
        profile(
            "wellfound.com",
            BlockingLevel::Medium,
            true,
            vec![
                ScrapingConfig::browser(2, 30_000, 1),
                ScrapingConfig::http(1, 20_000, 2),
            ],
            "React SPA",
        ),
        profile(
            "lever.co",
            BlockingLevel::Low,
            false,
            vec![
                ScrapingConfig::http(2, 20_000, 1),
                ScrapingConfig::browser(1, 25_000, 2),
            ],
            "Server-rendered postings",
        ),
        profile(
            "greenhouse.io",
            BlockingLevel::Low,
            false,
            vec![ScrapingConfig::http(2, 20_000, 1)],
            "Server-rendered postings",
        ),
    ]
}

fn default_profile() -> DomainProfile {
    DomainProfile {
        domain_pattern: "*".to_string(),
        configs: vec![
            ScrapingConfig::http(1, 20_000, 1),
            ScrapingConfig::browser(1, 30_000, 2),
        ],
        blocking_level: BlockingLevel::Medium,
        requires_js: false,
        notes: None,
    }
}
