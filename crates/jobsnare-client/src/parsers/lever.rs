use jobsnare_core::error::AppError;
use jobsnare_core::models::ParsedJob;
use url::Url;

use super::{Page, jsonld};
use crate::text::{clean_text, non_empty};

/// Company slug from `jobs.lever.co/<company>/<id>`.
fn company_slug(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let slug = parsed.path_segments()?.next()?;
    non_empty(slug.replace(['-', '_'], " "))
}

pub(crate) fn parse(url: &str, page: &Page<'_>) -> Result<ParsedJob, AppError> {
    let mut job = match jsonld::find_job_posting(page) {
        Some(ld) => jsonld::job_from_posting(&ld, url, "Lever"),
        None => ParsedJob::minimal(url, "Lever"),
    };

    if job.title.is_none() {
        job.title = page.text(".posting-headline h2, .posting-header h2, h2");
    }
    if job.company.is_none() {
        // Lever page titles read "<Company> - <Job title>".
        job.company = page
            .attr(".main-header-logo img", "alt")
            .or_else(|| {
                page.text("title")
                    .and_then(|t| t.split(" - ").next().and_then(non_empty))
            })
            .or_else(|| company_slug(url));
    }
    if job.location.is_none() {
        job.location = page.text(
            ".posting-categories .location, .posting-category.location, .sort-by-time.posting-category",
        );
    }
    if job.description.is_none() {
        job.description = page
            .text(r#"[data-qa="job-description"], .section.page-centered"#)
            .and_then(|d| non_empty(clean_text(&d)));
    }
    if job.salary.is_none() {
        job.salary = page.salary(
            r#"[data-qa="salary-range"], .posting-categories .compensation"#,
            job.description.as_deref(),
        );
    }
    page.sections().fill(&mut job);
    Ok(job)
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://jobs.lever.co/acme-robotics/8f1c2d3e-0000-4000-8000-123456789abc";

    const POSTING: &str = r#"<html><head><title>Acme Robotics - Firmware Engineer</title></head><body>
        <div class="posting-headline">
          <h2>Firmware Engineer</h2>
          <div class="posting-categories"><div class="location">Boston, MA</div></div>
        </div>
        <div data-qa="job-description"><p>Write firmware for arms.</p></div>
        <div class="section page-centered">
          <h3>What you'll do:</h3>
          <ul class="posting-requirements plain-list"><ul><li>Bring up boards</li><li>Write drivers</li></ul></ul>
        </div>
        <div class="section page-centered">
          <h3>Requirements</h3>
          <ul class="posting-requirements plain-list"><li>C and Rust</li></ul>
        </div>
        <div data-qa="salary-range">$130,000 - $160,000 per year</div>
        </body></html>"#;

    #[test]
    fn test_posting_page() {
        let job = parse(URL, &Page::parse(POSTING)).unwrap();
        assert_eq!(job.title.as_deref(), Some("Firmware Engineer"));
        assert_eq!(job.company.as_deref(), Some("Acme Robotics"));
        assert_eq!(job.location.as_deref(), Some("Boston, MA"));
        assert_eq!(job.description.as_deref(), Some("Write firmware for arms."));
        assert_eq!(job.salary.as_deref(), Some("$130,000 - $160,000 per year"));
        assert_eq!(
            job.responsibilities,
            Some(vec!["Bring up boards".to_string(), "Write drivers".to_string()])
        );
        assert_eq!(job.qualifications, Some(vec!["C and Rust".to_string()]));
        assert_eq!(job.source, "Lever");
    }

    #[test]
    fn test_company_from_slug() {
        assert_eq!(company_slug(URL).as_deref(), Some("acme robotics"));
        let job = parse(URL, &Page::parse("<h2>QA Lead</h2>")).unwrap();
        assert_eq!(job.title.as_deref(), Some("QA Lead"));
        assert_eq!(job.company.as_deref(), Some("acme robotics"));
    }
}
