//! Site-specific job page parsers.
//!
//! Each parser is a pure function from fetched HTML to a [`ParsedJob`]. They
//! share one shape: a JSON-LD `JobPosting` pass, then ordered selector sets,
//! then a salary heuristic. [`JobExtractor`] picks the parser by host.

mod generic;
mod grabjobs;
mod indeed;
mod jsonld;
mod lever;
mod linkedin;
mod wellfound;

use jobsnare_core::error::AppError;
use jobsnare_core::models::ParsedJob;
use jobsnare_core::traits::Extractor;
use jobsnare_core::util::normalize_host;
use scraper::{ElementRef, Html, Selector};

use crate::text::{clean_text, collapse_whitespace, find_salary, non_empty};

/// Job boards with a dedicated parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Site {
    LinkedIn,
    Indeed,
    Wellfound,
    GrabJobs,
    Lever,
    Generic,
}

impl Site {
    pub fn detect(url: &str) -> Self {
        let Some(host) = normalize_host(url) else {
            return Site::Generic;
        };
        if host.contains("linkedin.com") {
            Site::LinkedIn
        } else if host.contains("indeed.com") {
            Site::Indeed
        } else if host.contains("wellfound.com") || host.contains("angel.co") {
            Site::Wellfound
        } else if host.contains("grabjobs.com") || host.contains("jobcopilot.com") {
            Site::GrabJobs
        } else if host.contains("lever.co") {
            Site::Lever
        } else {
            Site::Generic
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Site::LinkedIn => "LinkedIn",
            Site::Indeed => "Indeed",
            Site::Wellfound => "Wellfound",
            Site::GrabJobs => "GrabJobs",
            Site::Lever => "Lever",
            Site::Generic => "generic",
        }
    }
}

/// Host-dispatching [`Extractor`] over all site parsers.
#[derive(Debug, Clone, Copy, Default)]
pub struct JobExtractor;

impl JobExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Extractor for JobExtractor {
    fn candidate_urls(&self, url: &str) -> Vec<String> {
        match Site::detect(url) {
            Site::LinkedIn => linkedin::candidate_urls(url),
            Site::Indeed => indeed::candidate_urls(url),
            _ => vec![url.to_string()],
        }
    }

    fn extract(&self, url: &str, html: &str) -> Result<ParsedJob, AppError> {
        let site = Site::detect(url);
        let page = Page::parse(html);
        let job = match site {
            Site::LinkedIn => linkedin::parse(url, &page),
            Site::Indeed => indeed::parse(url, &page),
            Site::Wellfound => wellfound::parse(url, &page),
            Site::GrabJobs => grabjobs::parse(url, &page),
            Site::Lever => lever::parse(url, &page),
            Site::Generic => generic::parse(url, &page),
        }?;

        tracing::debug!(
            url,
            site = site.name(),
            score = %job.success_score(),
            salary = job.salary.is_some(),
            "Parsed job page"
        );
        Ok(job)
    }
}

// ---------------------------------------------------------------------------
// Shared page helpers
// ---------------------------------------------------------------------------

/// A parsed document plus the raw markup it came from.
pub(crate) struct Page<'a> {
    raw: &'a str,
    doc: Html,
}

impl<'a> Page<'a> {
    pub(crate) fn parse(raw: &'a str) -> Self {
        Self {
            raw,
            doc: Html::parse_document(raw),
        }
    }

    pub(crate) fn raw(&self) -> &'a str {
        self.raw
    }

    pub(crate) fn select<'b>(&'b self, selectors: &str) -> Vec<ElementRef<'b>> {
        match Selector::parse(selectors) {
            Ok(sel) => self.doc.select(&sel).collect(),
            Err(_) => {
                tracing::warn!(selectors, "Invalid CSS selector");
                Vec::new()
            }
        }
    }

    /// Collapsed text of the first match with non-blank text.
    pub(crate) fn text(&self, selectors: &str) -> Option<String> {
        self.text_where(selectors, |_| true)
    }

    /// Collapsed text of the first match whose text satisfies `accept`.
    pub(crate) fn text_where(
        &self,
        selectors: &str,
        accept: impl Fn(&str) -> bool,
    ) -> Option<String> {
        self.select(selectors)
            .into_iter()
            .filter_map(|el| non_empty(element_text(&el)))
            .find(|t| accept(t))
    }

    /// Attribute of the first match that carries a non-blank value.
    pub(crate) fn attr(&self, selectors: &str, attr: &str) -> Option<String> {
        self.select(selectors)
            .into_iter()
            .find_map(|el| el.value().attr(attr).and_then(non_empty))
    }

    pub(crate) fn meta(&self, property: &str) -> Option<String> {
        self.attr(
            &format!(r#"meta[property="{property}"], meta[name="{property}"]"#),
            "content",
        )
    }

    pub(crate) fn body_text(&self) -> String {
        self.select("body")
            .first()
            .map(element_text)
            .unwrap_or_default()
    }

    /// Lowercased body text outside `script`/`style`, for marker checks.
    pub(crate) fn visible_text_lower(&self) -> String {
        let Some(body) = self.select("body").into_iter().next() else {
            return String::new();
        };
        let parts: Vec<&str> = body
            .descendants()
            .filter_map(|node| {
                let text = node.value().as_text()?;
                let parent = node.parent().and_then(ElementRef::wrap)?;
                let hidden = matches!(parent.value().name(), "script" | "style" | "noscript");
                (!hidden).then_some(&**text)
            })
            .collect();
        collapse_whitespace(&parts.join(" ")).to_lowercase()
    }

    /// Salary from dedicated elements, then the description, then the page.
    pub(crate) fn salary(&self, selectors: &str, description: Option<&str>) -> Option<String> {
        self.select(selectors)
            .into_iter()
            .map(|el| element_text(&el))
            .filter(|t| t.contains('$'))
            .find_map(|t| find_salary(&t))
            .or_else(|| description.and_then(find_salary))
            .or_else(|| find_salary(&collapse_whitespace(&self.body_text())))
    }

    /// Bullet lists under headings like "Requirements" or "Benefits".
    pub(crate) fn sections(&self) -> Sections {
        let mut sections = Sections::default();
        for heading in self.select("h1, h2, h3, h4, h5, strong, b") {
            let Some(kind) = SectionKind::classify(&element_text(&heading)) else {
                continue;
            };
            let items = following_list(&heading).map(list_items).unwrap_or_default();
            if items.is_empty() {
                continue;
            }
            let slot = sections.slot(kind);
            if slot.is_none() {
                *slot = Some(items);
            }
        }
        sections
    }
}

/// Text of an element with its text nodes space-separated.
pub(crate) fn element_text(el: &ElementRef<'_>) -> String {
    el.text().collect::<Vec<_>>().join(" ")
}

/// The `ul`/`ol` following a heading, either as its next element sibling or
/// (for `<p><strong>Heading</strong></p>`) its parent's.
fn following_list<'a>(heading: &ElementRef<'a>) -> Option<ElementRef<'a>> {
    let next_element = |el: &ElementRef<'a>| el.next_siblings().find_map(ElementRef::wrap);
    let is_list = |el: &ElementRef<'a>| matches!(el.value().name(), "ul" | "ol");

    if let Some(next) = next_element(heading) {
        return is_list(&next).then_some(next);
    }
    let parent = heading.parent().and_then(ElementRef::wrap)?;
    next_element(&parent).filter(is_list)
}

fn list_items(list: ElementRef<'_>) -> Vec<String> {
    let Ok(li) = Selector::parse("li") else {
        return Vec::new();
    };
    list.select(&li)
        .filter_map(|item| non_empty(clean_text(&element_text(&item))))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SectionKind {
    Qualifications,
    Responsibilities,
    Benefits,
}

impl SectionKind {
    fn classify(heading: &str) -> Option<Self> {
        let h = heading.to_lowercase();
        if h.len() > 80 {
            return None;
        }
        let any = |words: &[&str]| words.iter().any(|w| h.contains(w));
        if any(&["qualification", "requirement", "what you bring", "who you are", "skills", "must have"]) {
            Some(SectionKind::Qualifications)
        } else if any(&["responsibilit", "what you'll do", "what you will do", "duties", "the role", "day to day"]) {
            Some(SectionKind::Responsibilities)
        } else if any(&["benefit", "perks", "what we offer", "we offer", "compensation"]) {
            Some(SectionKind::Benefits)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Sections {
    pub qualifications: Option<Vec<String>>,
    pub responsibilities: Option<Vec<String>>,
    pub benefits: Option<Vec<String>>,
}

impl Sections {
    fn slot(&mut self, kind: SectionKind) -> &mut Option<Vec<String>> {
        match kind {
            SectionKind::Qualifications => &mut self.qualifications,
            SectionKind::Responsibilities => &mut self.responsibilities,
            SectionKind::Benefits => &mut self.benefits,
        }
    }

    /// Fill list fields the job does not already have.
    pub(crate) fn fill(self, job: &mut ParsedJob) {
        if job.qualifications.is_none() {
            job.qualifications = self.qualifications;
        }
        if job.responsibilities.is_none() {
            job.responsibilities = self.responsibilities;
        }
        if job.benefits.is_none() {
            job.benefits = self.benefits;
        }
    }
}

/// One CSS selector group per field, tried as a unit.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SelectorSet {
    pub title: &'static str,
    pub company: &'static str,
    pub location: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Fields {
    pub title: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
}

impl SelectorSet {
    pub(crate) fn apply(&self, page: &Page<'_>) -> Fields {
        Fields {
            title: page.text(self.title),
            company: page.text(self.company),
            location: page.text(self.location),
            description: page
                .text(self.description)
                .and_then(|d| non_empty(clean_text(&d))),
        }
    }
}

/// Apply `sets` in order and return the first result `accept`s, if any.
pub(crate) fn first_accepted(
    page: &Page<'_>,
    sets: &[SelectorSet],
    accept: impl Fn(&Fields) -> bool,
) -> Option<Fields> {
    sets.iter().map(|set| set.apply(page)).find(|f| accept(f))
}

/// Field-by-field merge: each field comes from the first set that finds it.
pub(crate) fn merged(page: &Page<'_>, sets: &[SelectorSet]) -> Fields {
    let mut fields = Fields::default();
    for set in sets {
        if fields.title.is_none() {
            fields.title = page.text(set.title);
        }
        if fields.company.is_none() {
            fields.company = page.text(set.company);
        }
        if fields.location.is_none() {
            fields.location = page.text(set.location);
        }
        if fields.description.is_none() {
            fields.description = page
                .text(set.description)
                .and_then(|d| non_empty(clean_text(&d)));
        }
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_site_detection() {
        assert_eq!(Site::detect("https://www.linkedin.com/jobs/view/1"), Site::LinkedIn);
        assert_eq!(Site::detect("https://uk.indeed.com/viewjob?jk=1"), Site::Indeed);
        assert_eq!(Site::detect("https://angel.co/company/x/jobs/1"), Site::Wellfound);
        assert_eq!(Site::detect("https://jobcopilot.com/job/1"), Site::GrabJobs);
        assert_eq!(Site::detect("https://jobs.lever.co/acme/1"), Site::Lever);
        assert_eq!(Site::detect("https://careers.acme.dev/1"), Site::Generic);
        assert_eq!(Site::detect("::"), Site::Generic);
    }

    #[test]
    fn test_candidates_default_to_url() {
        let ex = JobExtractor::new();
        assert_eq!(
            ex.candidate_urls("https://careers.acme.dev/1"),
            vec!["https://careers.acme.dev/1".to_string()]
        );
    }

    #[test]
    fn test_text_skips_blank_matches() {
        let page = Page::parse("<div class='t'> </div><div class='t'>  Rust\n Engineer </div>");
        assert_eq!(page.text(".t").as_deref(), Some("Rust Engineer"));
        assert_eq!(page.text(".missing"), None);
        assert_eq!(page.text("[[bad"), None);
    }

    #[test]
    fn test_meta_by_property_or_name() {
        let page = Page::parse(
            r#"<head><meta property="og:title" content="Dev"><meta name="description" content="Build"></head>"#,
        );
        assert_eq!(page.meta("og:title").as_deref(), Some("Dev"));
        assert_eq!(page.meta("description").as_deref(), Some("Build"));
    }

    #[test]
    fn test_salary_prefers_dedicated_element() {
        let page = Page::parse(
            r#"<body><p>Referral bonus $1,000</p><span class="salary">$80,000 - $95,000 a year</span></body>"#,
        );
        assert_eq!(
            page.salary(".salary", None).as_deref(),
            Some("$80,000 - $95,000")
        );
        let page = Page::parse("<body><p>Pay: $30/hr</p></body>");
        assert_eq!(page.salary(".salary", None).as_deref(), Some("$30/hr"));
    }

    #[test]
    fn test_sections_from_headed_lists() {
        let html = r#"<body>
            <h3>Responsibilities</h3><ul><li>Ship features</li><li>Review code</li></ul>
            <p><strong>Requirements</strong></p><ul><li>5 years of Rust</li></ul>
            <h3>Benefits &amp; perks</h3><ol><li>Remote</li></ol>
            <h3>About us</h3><ul><li>Founded 2010</li></ul>
        </body>"#;
        let sections = Page::parse(html).sections();
        assert_eq!(
            sections.responsibilities,
            Some(vec!["Ship features".to_string(), "Review code".to_string()])
        );
        assert_eq!(sections.qualifications, Some(vec!["5 years of Rust".to_string()]));
        assert_eq!(sections.benefits, Some(vec!["Remote".to_string()]));
    }
}
