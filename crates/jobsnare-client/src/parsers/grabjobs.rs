use jobsnare_core::error::AppError;
use jobsnare_core::models::ParsedJob;
use serde_json::{Map, Value};

use super::jsonld::as_text;
use super::{Fields, Page, SelectorSet, first_accepted, jsonld};
use crate::text::{clean_text, non_empty};

/// Rendered SPA pages shorter than this are treated as an empty shell.
const MIN_RENDERED_LEN: usize = 1000;

const SELECTOR_SETS: &[SelectorSet] = &[
    SelectorSet {
        title: r#"h1.job-title, .job-title h1, [data-testid="job-title"], .title, [class*="JobTitle"], [class*="job-title"]"#,
        company: r#".company-name, .employer-name, [data-testid="company-name"], .company, [class*="Company"], [class*="company"]"#,
        location: r#".job-location, .location, [data-testid="location"], [class*="Location"], [class*="location"]"#,
        description: r#".job-description, .description, .job-details, .details, [class*="Description"], [class*="description"], [class*="JobDetails"]"#,
    },
    SelectorSet {
        title: r#"h1, .page-title, .main-title, [role="heading"][aria-level="1"], main h1"#,
        company: r#".company, .employer, .organization, [class*="employer"], [class*="org"]"#,
        location: r#".location, .address, .workplace, [class*="address"], [class*="place"]"#,
        description: ".content, .job-content, .main-content, main div, article div",
    },
    SelectorSet {
        title: r#"h1, [class*="title"], [class*="Title"]"#,
        company: r#"[class*="company"], [class*="Company"], [class*="employer"]"#,
        location: r#"[class*="location"], [class*="Location"], [class*="address"]"#,
        description: r#"[class*="description"], [class*="Description"], [class*="detail"], [class*="Detail"]"#,
    },
];

const SALARY_SELECTORS: &str = r#".salary, .pay, .compensation, .wage, [data-testid="salary"], [data-testid="pay"], .job-salary, .salary-info, .pay-info"#;

const JOB_KEYS: &[&str] = &["job", "position", "title", "company", "description"];

pub(crate) fn parse(url: &str, page: &Page<'_>) -> Result<ParsedJob, AppError> {
    check_rendered(page)?;

    if let Some(ld) = jsonld::find_job_posting(page) {
        let mut job = jsonld::job_from_posting(&ld, url, "GrabJobs");
        if job.salary.is_none() {
            job.salary = page.salary(SALARY_SELECTORS, job.description.as_deref());
        }
        return Ok(job);
    }

    let mut fields = first_accepted(page, SELECTOR_SETS, |f| {
        f.title.is_some() && (f.company.is_some() || f.description.is_some())
    })
    .or_else(|| SELECTOR_SETS.last().map(|set| set.apply(page)))
    .unwrap_or_default();

    let mut salary = None;
    if fields.title.is_none() {
        if let Some(data) = next_data(page) {
            if let Some(found) = job_object(&data) {
                tracing::debug!(url, "Using __NEXT_DATA__ job fields");
                salary = fill_from_next_data(&mut fields, found);
            }
        }
    }

    let mut job = ParsedJob::minimal(url, "GrabJobs");
    job.salary = salary.or_else(|| page.salary(SALARY_SELECTORS, fields.description.as_deref()));
    job.title = fields.title;
    job.company = fields.company;
    job.location = fields.location;
    job.description = fields.description;
    page.sections().fill(&mut job);
    Ok(job)
}

/// Reject challenge pages and SPA shells that never rendered.
fn check_rendered(page: &Page<'_>) -> Result<(), AppError> {
    let raw = page.raw();
    if raw.contains("challenge-platform") || page.visible_text_lower().contains("captcha") {
        return Err(AppError::FetchBlocked("captcha challenge".into()));
    }
    if raw.len() < MIN_RENDERED_LEN {
        return Err(AppError::ShellContent(format!(
            "{} chars, likely an unrendered shell",
            raw.len()
        )));
    }
    if raw.contains("Loading...") && !raw.contains("job") && !raw.contains("position") {
        return Err(AppError::ShellContent("page still loading".into()));
    }
    if let Some(data) = next_data(page) {
        let empty_props = data
            .get("props")
            .and_then(Value::as_object)
            .is_none_or(Map::is_empty);
        if empty_props {
            return Err(AppError::ShellContent("__NEXT_DATA__ has no props".into()));
        }
    }
    Ok(())
}

fn next_data(page: &Page<'_>) -> Option<Value> {
    page.select("script#__NEXT_DATA__")
        .first()
        .and_then(|script| serde_json::from_str(script.inner_html().trim()).ok())
}

/// First nested object that looks like a job record.
fn job_object(value: &Value) -> Option<&Map<String, Value>> {
    match value {
        Value::Object(map) => {
            let keyed = map.iter().find_map(|(key, child)| {
                let key = key.to_lowercase();
                let is_job_key = JOB_KEYS.iter().any(|k| key.contains(k));
                if is_job_key { child.as_object() } else { None }
            });
            if keyed.is_some() {
                return keyed;
            }
            if map.contains_key("title") || map.contains_key("position") {
                return Some(map);
            }
            map.values().find_map(job_object)
        }
        Value::Array(items) => items.iter().find_map(job_object),
        _ => None,
    }
}

/// Fill missing fields from a `__NEXT_DATA__` job object; returns its salary.
fn fill_from_next_data(fields: &mut Fields, data: &Map<String, Value>) -> Option<String> {
    let pick = |keys: &[&str]| keys.iter().find_map(|k| data.get(*k).and_then(as_text));

    fields.title = fields.title.take().or_else(|| pick(&["title", "name", "position"]));
    fields.company = fields
        .company
        .take()
        .or_else(|| pick(&["company", "employer", "organization"]));
    fields.location = fields
        .location
        .take()
        .or_else(|| pick(&["location", "address", "place"]));
    fields.description = fields.description.take().or_else(|| {
        pick(&["description", "details", "content"]).and_then(|d| non_empty(clean_text(&d)))
    });
    pick(&["salary", "pay", "compensation"])
}
