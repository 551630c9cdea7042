use std::sync::LazyLock;

use regex::Regex;

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("Failed to compile tag regex"));

static SALARY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\$[\d,]+(?:\s*[-–]\s*\$[\d,]+)?(?:\s*(?:per|/)\s*(?:hour|hr|year|yr|annually|monthly|month|mo))?",
    )
    .expect("Failed to compile salary regex")
});

const ENTITIES: &[(&str, &str)] = &[
    ("&nbsp;", " "),
    ("&amp;", "&"),
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&quot;", "\""),
    ("&#39;", "'"),
    ("&apos;", "'"),
];

/// Plain text from an HTML fragment or scraped text.
///
/// Tags become spaces, the common named entities are decoded and all
/// whitespace runs (including non-breaking spaces) collapse to one space.
pub fn clean_text(input: &str) -> String {
    let mut text = TAG_RE.replace_all(input, " ").into_owned();
    for (entity, replacement) in ENTITIES {
        if text.contains(entity) {
            text = text.replace(entity, replacement);
        }
    }
    collapse_whitespace(&text)
}

/// Single-spaced, trimmed copy of `input`.
pub fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First salary-looking span, e.g. `$120,000 - $150,000/yr` or `$25 per hour`.
pub fn find_salary(text: &str) -> Option<String> {
    SALARY_RE.find(text).map(|m| m.as_str().trim().to_string())
}

/// Like [`find_salary`] but a range anywhere in the text wins over an
/// earlier single figure.
pub fn find_salary_prefer_range(text: &str) -> Option<String> {
    let matches: Vec<&str> = SALARY_RE.find_iter(text).map(|m| m.as_str().trim()).collect();
    matches
        .iter()
        .find(|s| s.contains('-') || s.contains('–'))
        .or_else(|| matches.first())
        .map(|s| s.to_string())
}

/// `Some(trimmed)` unless the string is blank.
pub(crate) fn non_empty(s: impl AsRef<str>) -> Option<String> {
    let s = collapse_whitespace(s.as_ref());
    (!s.is_empty()).then_some(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_text_strips_tags_and_entities() {
        let html = "<p>Build&nbsp;things &amp; ship</p>\n\n<ul><li>Rust &lt;3</li></ul>";
        assert_eq!(clean_text(html), "Build things & ship Rust <3");
    }

    #[test]
    fn test_clean_text_collapses_whitespace() {
        assert_eq!(clean_text("  a\r\n\tb\u{a0}\u{a0}c  "), "a b c");
        assert_eq!(clean_text(""), "");
    }

    #[test]
    fn test_salary_range_with_period() {
        assert_eq!(
            find_salary("The range is $120,000 - $150,000/yr").as_deref(),
            Some("$120,000 - $150,000/yr")
        );
    }

    #[test]
    fn test_salary_variants() {
        assert_eq!(find_salary("Pays $25 per hour").as_deref(), Some("$25 per hour"));
        assert_eq!(find_salary("$4,000/month plus").as_deref(), Some("$4,000/month"));
        assert_eq!(find_salary("$90,000–$110,000").as_deref(), Some("$90,000–$110,000"));
        assert_eq!(find_salary("competitive pay"), None);
    }

    #[test]
    fn test_prefer_range() {
        let text = "Signing bonus $5,000. Base $100,000 - $120,000 per year.";
        assert_eq!(
            find_salary_prefer_range(text).as_deref(),
            Some("$100,000 - $120,000 per year")
        );
        assert_eq!(find_salary_prefer_range("Bonus $5,000").as_deref(), Some("$5,000"));
    }

    #[test]
    fn test_non_empty() {
        assert_eq!(non_empty("  Acme \n Corp "), Some("Acme Corp".to_string()));
        assert_eq!(non_empty(" \n "), None);
    }
}
