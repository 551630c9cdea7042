use std::sync::LazyLock;

use jobsnare_core::error::AppError;
use jobsnare_core::models::ParsedJob;
use regex::Regex;
use url::Url;

use super::{Page, SelectorSet, jsonld, merged};
use crate::text::{clean_text, find_salary, find_salary_prefer_range, non_empty};

static JOB_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:jobs|view)/.*(?:/|%2F|-)(\d{5,})").expect("Failed to compile job id regex")
});

const GUEST_API: &str = "https://www.linkedin.com/jobs-guest/jobs/api/jobPosting/";

/// Logged-in job page, then the guest job-posting fragment, then broad
/// fallbacks.
const SELECTOR_SETS: &[SelectorSet] = &[
    SelectorSet {
        title: r#"h1[data-test-id="job-title"], h1.t-24.t-bold.inline, .jobs-unified-top-card__job-title h1, h1.topcard__title"#,
        company: r#"a[data-test-id="job-details-company-name"], .jobs-unified-top-card__company-name a, .job-details-company__company-information a, a.topcard__org-name-link"#,
        location: r#"[data-test-id="job-details-location"], .jobs-unified-top-card__bullet, .job-details-jobs-unified-top-card__primary-description-container .tvm__text, .topcard__flavor--bullet"#,
        description: ".jobs-description, #job-details",
    },
    SelectorSet {
        title: "h2.top-card-layout__title, h1",
        company: "a.topcard__org-name-link, span.topcard__flavor",
        location: "span.topcard__flavor--bullet",
        description: "#job-details, section.description",
    },
    SelectorSet {
        title: r#"h1, .job-title, [class*="job-title"], [class*="title"]"#,
        company: r#"[class*="company"], [data-test*="company"]"#,
        location: r#"[class*="location"], [data-test*="location"]"#,
        description: r#"[class*="description"], [class*="job-details"], .description, #job-details"#,
    },
];

const DESCRIPTION_SELECTORS: &[&str] = &[
    ".jobs-description__container",
    ".jobs-description-content__text",
    ".jobs-description",
    r#"[data-test-id="job-details-description"]"#,
    ".job-details-description-text",
    ".description__text",
    ".show-more-less-html__markup",
    r#"div[class*="description"] section"#,
    "#job-details",
];

const SALARY_SELECTORS: &str =
    r#".compensation__salary, [class*="salary"], [class*="compensation"], span, div"#;

/// Numeric job id from `currentJobId`/`trkId` or the URL path.
pub(crate) fn job_id(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let from_query = parsed
        .query_pairs()
        .find(|(k, v)| (k == "currentJobId" || k == "trkId") && !v.is_empty())
        .map(|(_, v)| v.into_owned());
    from_query.or_else(|| {
        JOB_ID_RE
            .captures(url)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
    })
}

/// The job page itself, then the public guest-API fragment when an id is
/// known.
pub(crate) fn candidate_urls(url: &str) -> Vec<String> {
    let mut urls = vec![url.to_string()];
    if let Some(id) = job_id(url) {
        let guest = format!("{GUEST_API}{id}");
        if guest != url {
            urls.push(guest);
        }
    }
    urls
}

pub(crate) fn parse(url: &str, page: &Page<'_>) -> Result<ParsedJob, AppError> {
    if let Some(ld) = jsonld::find_job_posting(page) {
        let mut job = jsonld::job_from_posting(&ld, url, "LinkedIn");
        if job.salary.is_none() {
            job.salary = job.description.as_deref().and_then(find_salary_prefer_range);
        }
        return Ok(job);
    }

    let description = DESCRIPTION_SELECTORS
        .iter()
        .find_map(|sel| page.text_where(sel, |t| t.len() > 100))
        .map(|d| clean_text(&d));

    let fields = merged(page, SELECTOR_SETS);
    let description = description.or(fields.description);

    let salary = description
        .as_deref()
        .and_then(find_salary_prefer_range)
        .or_else(|| {
            page.select(SALARY_SELECTORS)
                .into_iter()
                .map(|el| super::element_text(&el))
                .filter(|t| t.contains('$'))
                .find_map(|t| find_salary(&t))
        });

    let mut job = ParsedJob::minimal(url, "LinkedIn");
    job.title = fields.title;
    job.company = fields.company;
    job.location = fields.location;
    job.description = description.and_then(non_empty);
    job.salary = salary;
    page.sections().fill(&mut job);
    Ok(job)
}

#[cfg(test)]
mod tests {
    use super::*;

    const JOB_URL: &str = "https://www.linkedin.com/jobs/view/3812345678/";

    #[test]
    fn test_job_id_sources() {
        assert_eq!(job_id(JOB_URL).as_deref(), Some("3812345678"));
        assert_eq!(
            job_id("https://www.linkedin.com/jobs/search/?currentJobId=3999999999&geoId=1").as_deref(),
            Some("3999999999")
        );
        assert_eq!(
            job_id("https://www.linkedin.com/jobs/view/senior-rust-engineer-at-acme-3811111111").as_deref(),
            Some("3811111111")
        );
        assert_eq!(job_id("https://www.linkedin.com/feed/"), None);
    }

    #[test]
    fn test_candidates_include_guest_api() {
        assert_eq!(
            candidate_urls(JOB_URL),
            vec![
                JOB_URL.to_string(),
                "https://www.linkedin.com/jobs-guest/jobs/api/jobPosting/3812345678".to_string()
            ]
        );
        assert_eq!(candidate_urls("https://www.linkedin.com/feed/").len(), 1);
    }

    #[test]
    fn test_top_card_page() {
        let long = "We are looking for a Rust engineer to build distributed systems. ".repeat(3);
        let html = format!(
            r#"<html><body>
            <h1 class="topcard__title">Senior Rust Engineer</h1>
            <a class="topcard__org-name-link">Acme Corp</a>
            <span class="topcard__flavor--bullet">Berlin, Germany</span>
            <div class="show-more-less-html__markup">{long} Salary: $5,000 bonus. Range $150,000 - $180,000/yr.</div>
            </body></html>"#
        );
        let job = parse(JOB_URL, &Page::parse(&html)).unwrap();
        assert_eq!(job.title.as_deref(), Some("Senior Rust Engineer"));
        assert_eq!(job.company.as_deref(), Some("Acme Corp"));
        assert_eq!(job.location.as_deref(), Some("Berlin, Germany"));
        assert!(job.description.as_deref().unwrap().starts_with("We are looking"));
        assert_eq!(job.salary.as_deref(), Some("$150,000 - $180,000/yr"));
        assert_eq!(job.source, "LinkedIn");
        assert_eq!(job.apply_url, JOB_URL);
    }

    #[test]
    fn test_guest_fragment() {
        let html = r#"<section class="top-card-layout">
            <h2 class="top-card-layout__title">Data Engineer</h2>
            <a class="topcard__org-name-link">Globex</a>
            <span class="topcard__flavor--bullet">Remote</span>
            </section>
            <section class="description"><div>Pipelines and more pipelines.</div></section>"#;
        let job = parse(JOB_URL, &Page::parse(html)).unwrap();
        assert_eq!(job.title.as_deref(), Some("Data Engineer"));
        assert_eq!(job.company.as_deref(), Some("Globex"));
        assert_eq!(job.description.as_deref(), Some("Pipelines and more pipelines."));
    }

    #[test]
    fn test_login_wall_is_empty() {
        let html = "<html><body><form><input name='session_key'></form></body></html>";
        let job = parse(JOB_URL, &Page::parse(html)).unwrap();
        assert!(job.is_empty());
    }
}
