use jobsnare_core::error::AppError;
use jobsnare_core::models::ParsedJob;
use url::Url;

use super::{Page, SelectorSet, first_accepted, jsonld};

const SELECTOR_SETS: &[SelectorSet] = &[
    SelectorSet {
        title: "h1",
        company: "[data-company-name] a, [data-company-name]",
        location: ".jobsearch-CompanyInfoContainer div",
        description: "#jobDescriptionText",
    },
    SelectorSet {
        title: ".jobsearch-JobInfoHeader-title",
        company: ".jobsearch-InlineCompanyRating a",
        location: r#"[data-testid="job-location"]"#,
        description: "#jobDescriptionText",
    },
    SelectorSet {
        title: r#"[data-testid="jobTitle"]"#,
        company: r#"[data-testid="inlineHeader-companyName"]"#,
        location: r#"[data-testid="job-location"]"#,
        description: "#jobDescriptionText",
    },
];

const SALARY_SELECTORS: &str = r#".jobsearch-SalaryInfoContainer, [data-testid="salary-snippet"], .metadata.salary-snippet-container, .salary-snippet, .salary, .jobsearch-DesktopStickyContainer span"#;

const BLOCK_MARKERS: &[&str] = &[
    "captcha",
    "are you a robot",
    "verify you are human",
    "you have been blocked",
    "request blocked",
];

/// The job URL plus the `viewjob?jk=`, `jobs?vjk=` and mobile variants.
///
/// Variants keep the scheme, host and port of the input.
pub(crate) fn candidate_urls(url: &str) -> Vec<String> {
    let Ok(parsed) = Url::parse(url) else {
        return vec![url.to_string()];
    };
    let param = |name: &str| {
        parsed
            .query_pairs()
            .find(|(k, v)| k == name && !v.is_empty())
            .map(|(_, v)| v.into_owned())
    };
    let variant = |path: &str, key: &str, value: &str| {
        let mut u = parsed.clone();
        u.set_path(path);
        u.set_query(None);
        u.query_pairs_mut().append_pair(key, value);
        u.to_string()
    };

    let mut urls = vec![url.to_string()];
    if let Some(vjk) = param("vjk") {
        urls.push(variant("/viewjob", "jk", &vjk));
        urls.push(variant("/jobs", "vjk", &vjk));
    }
    if let Some(jk) = param("jk") {
        urls.push(variant("/viewjob", "jk", &jk));
    }
    if parsed.host_str() == Some("www.indeed.com") {
        let mut mobile = parsed.clone();
        if mobile.set_host(Some("m.indeed.com")).is_ok() {
            urls.push(mobile.to_string());
        }
    }

    let mut seen = std::collections::HashSet::new();
    urls.retain(|u| seen.insert(u.clone()));
    urls
}

pub(crate) fn parse(url: &str, page: &Page<'_>) -> Result<ParsedJob, AppError> {
    if page.raw().len() < 100 {
        return Err(AppError::FetchBlocked(format!(
            "Indeed returned {} bytes",
            page.raw().len()
        )));
    }
    let visible = page.visible_text_lower();
    if let Some(marker) = BLOCK_MARKERS.iter().find(|m| visible.contains(*m)) {
        return Err(AppError::FetchBlocked(format!("Indeed page shows '{marker}'")));
    }

    if let Some(ld) = jsonld::find_job_posting(page) {
        let mut job = jsonld::job_from_posting(&ld, url, "Indeed");
        if job.salary.is_none() {
            job.salary = page.salary(SALARY_SELECTORS, job.description.as_deref());
        }
        page.sections().fill(&mut job);
        return Ok(job);
    }

    let fields = first_accepted(page, SELECTOR_SETS, |f| {
        f.title.is_some() && f.company.is_some()
    })
    .ok_or_else(|| AppError::ExtractionIncomplete(format!("no Indeed title/company at {url}")))?;

    let mut job = ParsedJob::minimal(url, "Indeed");
    job.salary = page.salary(SALARY_SELECTORS, fields.description.as_deref());
    job.title = fields.title;
    job.company = fields.company;
    job.location = fields.location;
    job.description = fields.description;
    page.sections().fill(&mut job);
    Ok(job)
}
