use jobsnare_core::models::ParsedJob;
use serde_json::Value;

use super::Page;
use crate::text::{clean_text, non_empty};

/// First schema.org `JobPosting` in the page's JSON-LD blocks.
///
/// Handles a bare object, a top-level array, an `@graph` container and
/// `@type` given as an array. Unparseable blocks are skipped.
pub(crate) fn find_job_posting(page: &Page<'_>) -> Option<Value> {
    page.select(r#"script[type="application/ld+json"]"#)
        .into_iter()
        .filter_map(|script| {
            let text = script.inner_html();
            serde_json::from_str::<Value>(text.trim()).ok()
        })
        .find_map(|value| job_in(&value).cloned())
}

fn job_in(value: &Value) -> Option<&Value> {
    match value {
        Value::Array(items) => items.iter().find_map(job_in),
        Value::Object(map) => {
            if is_job_posting(value) {
                return Some(value);
            }
            map.get("@graph")
                .and_then(Value::as_array)
                .and_then(|graph| graph.iter().find(|v| is_job_posting(v)))
        }
        _ => None,
    }
}

fn is_job_posting(value: &Value) -> bool {
    match value.get("@type") {
        Some(Value::String(t)) => t == "JobPosting",
        Some(Value::Array(types)) => types.iter().any(|t| t.as_str() == Some("JobPosting")),
        _ => false,
    }
}

/// Scalar JSON value as trimmed text; objects yield their `name`.
pub(crate) fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => non_empty(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(map) => map.get("name").and_then(as_text),
        _ => None,
    }
}

/// Map a `JobPosting` object onto a [`ParsedJob`].
pub(crate) fn job_from_posting(ld: &Value, url: &str, source: &str) -> ParsedJob {
    let mut job = ParsedJob::minimal(url, source);
    job.title = ld.get("title").or_else(|| ld.get("name")).and_then(as_text);
    job.company = ld.get("hiringOrganization").and_then(as_text);
    job.location = location(ld);
    job.salary = ld.get("baseSalary").and_then(salary);
    job.description = ld
        .get("description")
        .and_then(Value::as_str)
        .and_then(|d| non_empty(clean_text(d)));
    job.posted_at = ld.get("datePosted").and_then(as_text);
    job.qualifications = ld.get("qualifications").and_then(text_list);
    job.responsibilities = ld.get("responsibilities").and_then(text_list);
    job.benefits = ld.get("jobBenefits").and_then(text_list);
    job
}

fn location(ld: &Value) -> Option<String> {
    let place = match ld.get("jobLocation") {
        Some(Value::Array(places)) => places.first(),
        other => other,
    };
    let from_address = place.and_then(|p| p.get("address")).and_then(|address| {
        ["addressLocality", "addressRegion", "addressCountry"]
            .iter()
            .find_map(|key| address.get(key).and_then(as_text))
    });
    from_address.or_else(|| {
        (ld.get("jobLocationType").and_then(Value::as_str) == Some("TELECOMMUTE"))
            .then(|| "Remote".to_string())
    })
}

/// `MonetaryAmount` as text: `"120000 USD"`, `"100000 - 130000 USD / year"`.
fn salary(base: &Value) -> Option<String> {
    if let Some(text) = base.as_str() {
        return non_empty(text);
    }
    let value = base.get("value")?;
    let currency = base
        .get("currency")
        .or_else(|| value.get("currency"))
        .and_then(Value::as_str)
        .unwrap_or("");

    let amount = match value {
        Value::Object(_) => match value.get("value").and_then(as_text) {
            Some(v) => v,
            None => {
                let min = value.get("minValue").and_then(as_text)?;
                match value.get("maxValue").and_then(as_text) {
                    Some(max) if max != min => format!("{min} - {max}"),
                    _ => min,
                }
            }
        },
        other => as_text(other)?,
    };

    let mut out = format!("{amount} {currency}").trim().to_string();
    if let Some(unit) = value.get("unitText").and_then(Value::as_str) {
        out.push_str(&format!(" / {}", unit.to_lowercase()));
    }
    Some(out)
}

fn text_list(value: &Value) -> Option<Vec<String>> {
    let items: Vec<String> = match value {
        Value::Array(items) => items
            .iter()
            .filter_map(as_text)
            .map(|s| clean_text(&s))
            .filter(|s| !s.is_empty())
            .collect(),
        Value::String(s) => non_empty(clean_text(s)).into_iter().collect(),
        _ => Vec::new(),
    };
    (!items.is_empty()).then_some(items)
}
