use jobsnare_core::error::AppError;
use jobsnare_core::models::ParsedJob;
use jobsnare_core::util::normalize_host;

use super::{Page, jsonld};
use crate::text::{clean_text, non_empty};

/// Splits `"Senior Engineer at Acme"` into title and company.
fn split_title_at_company(title: &str) -> Option<(String, String)> {
    let (role, company) = title.rsplit_once(" at ")?;
    Some((non_empty(role)?, non_empty(company)?))
}

pub(crate) fn parse(url: &str, page: &Page<'_>) -> Result<ParsedJob, AppError> {
    let host = normalize_host(url).unwrap_or_else(|| "unknown".to_string());

    if let Some(ld) = jsonld::find_job_posting(page) {
        let mut job = jsonld::job_from_posting(&ld, url, &host);
        page.sections().fill(&mut job);
        return Ok(job);
    }

    let source = page.meta("og:site_name").unwrap_or(host);
    let mut job = ParsedJob::minimal(url, source);

    let title = page.meta("og:title").or_else(|| page.text("title"));
    match title.as_deref().and_then(split_title_at_company) {
        Some((role, company)) => {
            job.title = Some(role);
            job.company = Some(company);
        }
        None => job.title = title,
    }
    job.description = page
        .meta("og:description")
        .or_else(|| page.meta("description"))
        .and_then(|d| non_empty(clean_text(&d)));
    page.sections().fill(&mut job);
    Ok(job)
}
