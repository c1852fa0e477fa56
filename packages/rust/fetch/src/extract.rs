//! HTML metadata and body-text extraction.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};

use sieve_shared::{DESCRIPTION_SENTINEL, TEXT_SENTINEL, TITLE_SENTINEL};

static TITLE_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("title").expect("valid selector"));
static DESCRIPTION_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"meta[name="description"]"#).expect("valid selector"));
static TEXT_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("p, h1, h2, h3, h4, h5, h6").expect("valid selector"));

/// Metadata extracted for one url.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageData {
    pub url: String,
    pub title: String,
    pub description: String,
    pub text: String,
    /// `false` when the fields are sentinels because the request failed.
    pub fetched: bool,
}

impl PageData {
    /// Sentinel-only result for a url whose fetch failed.
    pub fn degraded(url: &str) -> Self {
        Self {
            url: url.to_string(),
            title: TITLE_SENTINEL.to_string(),
            description: DESCRIPTION_SENTINEL.to_string(),
            text: TEXT_SENTINEL.to_string(),
            fetched: false,
        }
    }
}

/// Extract title, meta description and heading/paragraph text from a page.
///
/// Absent or empty fields fall back to the sentinel strings.
pub fn extract_page(url: &str, html: &str) -> PageData {
    let doc = Html::parse_document(html);

    PageData {
        url: url.to_string(),
        title: extract_title(&doc).unwrap_or_else(|| TITLE_SENTINEL.to_string()),
        description: extract_description(&doc)
            .unwrap_or_else(|| DESCRIPTION_SENTINEL.to_string()),
        text: extract_text(&doc).unwrap_or_else(|| TEXT_SENTINEL.to_string()),
        fetched: true,
    }
}

fn extract_title(doc: &Html) -> Option<String> {
    doc.select(&TITLE_SEL)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty())
}

fn extract_description(doc: &Html) -> Option<String> {
    doc.select(&DESCRIPTION_SEL)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
}

/// Concatenate heading and paragraph text in document order, whitespace collapsed.
fn extract_text(doc: &Html) -> Option<String> {
    let joined = doc
        .select(&TEXT_SEL)
        .map(|el| el.text().collect::<String>())
        .collect::<Vec<_>>()
        .join(" ");

    let collapsed = collapse_whitespace(&joined);
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed)
    }
}

pub(crate) fn collapse_whitespace(text: &str) -> String {
    static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));
    WS_RE.replace_all(text, " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load_fixture(name: &str) -> String {
        let path = format!("../../../fixtures/html/{name}");
        std::fs::read_to_string(&path).unwrap_or_else(|_| panic!("missing fixture: {path}"))
    }

    #[test]
    fn extracts_company_page() {
        let html = load_fixture("company.html");
        let page = extract_page("https://panaderia-sol.es/", &html);

        assert!(page.fetched);
        assert_eq!(page.title, "Panadería Sol | Pan artesano");
        assert_eq!(
            page.description,
            "Pan artesano y pasteles en Madrid desde 1987."
        );
        assert!(page.text.starts_with("Panadería Sol Horneamos pan de masa madre todos los días."));
        assert!(page.text.contains("+34 912 345 678"));
        // nav, footer and script content is not heading/paragraph text
        assert!(!page.text.contains("Inicio"));
        assert!(!page.text.contains("analytics"));
    }

    #[test]
    fn missing_fields_fall_back_to_sentinels() {
        let page = extract_page("http://a.com", "<html><body><div>only a div</div></body></html>");
        assert!(page.fetched);
        assert_eq!(page.title, TITLE_SENTINEL);
        assert_eq!(page.description, DESCRIPTION_SENTINEL);
        assert_eq!(page.text, TEXT_SENTINEL);
    }

    #[test]
    fn meta_without_content_is_sentinel() {
        let html = r#"<html><head><title> T </title><meta name="description"></head>
            <body><h3>Hi</h3></body></html>"#;
        let page = extract_page("http://a.com", html);
        assert_eq!(page.title, "T");
        assert_eq!(page.description, DESCRIPTION_SENTINEL);
        assert_eq!(page.text, "Hi");
    }

    #[test]
    fn degraded_page_uses_all_sentinels() {
        let page = PageData::degraded("http://down.example");
        assert!(!page.fetched);
        assert_eq!(page.url, "http://down.example");
        assert_eq!(page.title, TITLE_SENTINEL);
        assert_eq!(page.description, DESCRIPTION_SENTINEL);
        assert_eq!(page.text, TEXT_SENTINEL);
    }

    #[test]
    fn whitespace_is_collapsed() {
        assert_eq!(collapse_whitespace("  a \n\t b  "), "a b");
    }
}
