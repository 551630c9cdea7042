use jobsnare_core::error::AppError;
use jobsnare_core::models::ParsedJob;

use super::{Page, jsonld};
use crate::text::{clean_text, find_salary, non_empty};

pub(crate) fn parse(url: &str, page: &Page<'_>) -> Result<ParsedJob, AppError> {
    if let Some(ld) = jsonld::find_job_posting(page) {
        return Ok(jsonld::job_from_posting(&ld, url, "Wellfound"));
    }

    let mut job = ParsedJob::minimal(url, "Wellfound");
    job.title = page.meta("og:title").or_else(|| page.text("h1"));
    job.company = page.text(r#"a[href*="/company/"]"#);
    job.location = page.text(r#"[data-testid="job-location"], [class*="location"]"#);
    job.description = page
        .text(r#"[data-testid="job-description"], #job-details, [class*="styles_description"]"#)
        .and_then(|d| non_empty(clean_text(&d)));
    job.salary = page
        .text(r#"[class*="compensation"], [class*="salary"]"#)
        .and_then(|s| find_salary(&s));
    page.sections().fill(&mut job);
    Ok(job)
}
