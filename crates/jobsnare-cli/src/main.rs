use std::io::Write;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use jobsnare_client::{BrowserExecutor, HttpFetcher, HttpSettings, JobExtractor};
use jobsnare_core::models::{ScrapeOptions, ScrapeResult};
use jobsnare_core::util::validate_job_url;
use jobsnare_core::{ScrapeService, StrategyTable};

type Service = ScrapeService<HttpFetcher, BrowserExecutor, JobExtractor>;

#[derive(Parser)]
#[command(name = "jobsnare", version, about = "Job posting scraper with per-domain fallback strategies")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape a single job posting and print it as JSON
    Scrape {
        /// Job posting URL
        #[arg(short, long)]
        url: String,

        /// Print the full attempt log alongside the job
        #[arg(long, default_value_t = false)]
        debug: bool,
    },

    /// Scrape several job postings one after another
    Batch {
        /// Job posting URLs (repeat the flag)
        #[arg(short, long = "url", required = true)]
        urls: Vec<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,

        /// Pause between URLs in milliseconds
        #[arg(long, env = "JOBSNARE_BATCH_DELAY_MS", default_value_t = 1000)]
        delay_ms: u64,
    },

    /// Show which strategies would be tried for a URL
    Strategy {
        /// Job posting URL
        #[arg(short, long)]
        url: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Csv,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("jobsnare=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let outcome = match cli.command {
        Commands::Scrape { url, debug } => cmd_scrape(&url, debug).await,
        Commands::Batch {
            urls,
            format,
            delay_ms,
        } => cmd_batch(&urls, format, Duration::from_millis(delay_ms)).await,
        Commands::Strategy { url } => cmd_strategy(&url),
    };

    jobsnare_client::shutdown_browser().await;
    outcome
}

fn build_service() -> Result<Service> {
    let settings = HttpSettings::from_env().context("Invalid HTTP settings")?;
    let http = HttpFetcher::with_settings(settings)
        .context("Failed to create HTTP client")?
        .allow_private_urls();
    let browser = jobsnare_client::browser_executor().context("Invalid browser settings")?;
    Ok(ScrapeService::new(http, browser, JobExtractor::new()))
}

async fn cmd_scrape(url: &str, debug: bool) -> Result<()> {
    validate_job_url(url).with_context(|| format!("Refusing to scrape {url}"))?;
    let service = build_service()?;

    let result = service.scrape(url, ScrapeOptions { debug }).await;
    tracing::info!(
        success = result.debug.success,
        attempts = result.debug.attempts.len(),
        score = %result.job.success_score(),
        total_ms = result.debug.total_time_ms,
        "Scrape finished"
    );

    if debug {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}", serde_json::to_string_pretty(&result.job)?);
    }
    Ok(())
}

async fn cmd_batch(urls: &[String], format: OutputFormat, delay: Duration) -> Result<()> {
    for url in urls {
        validate_job_url(url).with_context(|| format!("Refusing to scrape {url}"))?;
    }
    let service = build_service()?.with_batch_delay(delay);

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, finishing current URL");
            on_signal.cancel();
        }
    });

    let results = service
        .scrape_batch(urls, ScrapeOptions::default(), &cancel)
        .await;
    let succeeded = results.iter().filter(|r| r.debug.success).count();
    tracing::info!(
        requested = urls.len(),
        scraped = results.len(),
        succeeded,
        "Batch finished"
    );

    let stdout = std::io::stdout();
    match format {
        OutputFormat::Json => {
            let jobs: Vec<BatchEntry<'_>> = results.iter().map(BatchEntry::from).collect();
            let mut out = stdout.lock();
            serde_json::to_writer_pretty(&mut out, &jobs)?;
            writeln!(out)?;
        }
        OutputFormat::Csv => write_csv(stdout.lock(), &results)?,
    }
    Ok(())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchEntry<'a> {
    success: bool,
    success_score: String,
    attempts: usize,
    job: &'a jobsnare_core::models::ParsedJob,
}

impl<'a> From<&'a ScrapeResult> for BatchEntry<'a> {
    fn from(result: &'a ScrapeResult) -> Self {
        Self {
            success: result.debug.success,
            success_score: result.job.success_score(),
            attempts: result.debug.attempts.len(),
            job: &result.job,
        }
    }
}

#[derive(Serialize)]
struct CsvRow<'a> {
    url: &'a str,
    success: bool,
    score: String,
    source: &'a str,
    title: &'a str,
    company: &'a str,
    location: &'a str,
    salary: &'a str,
    posted_at: &'a str,
    attempts: usize,
}

fn write_csv(out: impl Write, results: &[ScrapeResult]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    for result in results {
        let job = &result.job;
        writer.serialize(CsvRow {
            url: &job.apply_url,
            success: result.debug.success,
            score: job.success_score(),
            source: &job.source,
            title: job.title.as_deref().unwrap_or_default(),
            company: job.company.as_deref().unwrap_or_default(),
            location: job.location.as_deref().unwrap_or_default(),
            salary: job.salary.as_deref().unwrap_or_default(),
            posted_at: job.posted_at.as_deref().unwrap_or_default(),
            attempts: result.debug.attempts.len(),
        })?;
    }
    writer.flush()?;
    Ok(())
}

fn cmd_strategy(url: &str) -> Result<()> {
    validate_job_url(url).with_context(|| format!("Not a valid job URL: {url}"))?;
    let table = StrategyTable::builtin();
    let profile = table.resolve(url);

    println!(
        "Profile: {} (blocking level: {:?}, requires JS: {})",
        profile.domain_pattern, profile.blocking_level, profile.requires_js
    );
    if let Some(notes) = &profile.notes {
        println!("Notes:   {notes}");
    }
    for attempt in 0..table.max_attempts(url) {
        let config = table.strategy_for(url, attempt);
        println!(
            "  [{}] {:<7} retries={} timeout={}ms proxy={:?} js={}",
            attempt + 1,
            config.service,
            config.retries,
            config.timeout_ms,
            config.proxy_profile,
            config.js_rendering,
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobsnare_core::models::{ParsedJob, ScrapeDebug};

    #[test]
    fn test_cli_parses_batch_flags() {
        let cli = Cli::try_parse_from([
            "jobsnare", "batch", "--url", "https://a.dev/1", "--url", "https://b.dev/2", "--format", "csv",
        ])
        .unwrap();
        match cli.command {
            Commands::Batch { urls, format, .. } => {
                assert_eq!(urls.len(), 2);
                assert!(matches!(format, OutputFormat::Csv));
            }
            _ => panic!("expected batch"),
        }
    }

    #[test]
    fn test_csv_output() {
        let mut job = ParsedJob::minimal("https://a.dev/1", "a.dev");
        job.title = Some("Engineer, Platform".into());
        let results = vec![ScrapeResult {
            job,
            debug: ScrapeDebug {
                success: true,
                ..Default::default()
            },
        }];

        let mut buf = Vec::new();
        write_csv(&mut buf, &results).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("url,success,score,source,title,company,location,salary,posted_at,attempts")
        );
        assert_eq!(
            lines.next(),
            Some(r#"https://a.dev/1,true,1/4,a.dev,"Engineer, Platform",,,,,0"#)
        );
    }
}
