//! Enrichment stages: page fetching, translation, contact extraction and
//! keyword classification.

use std::collections::HashMap;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use tracing::info;

use sieve_fetch::{Fetcher, PageData};
use sieve_shared::{
    DESCRIPTION_SENTINEL, Record, Result, SieveError, TEXT_SENTINEL, TITLE_SENTINEL,
};
use sieve_translate::{TranslationItem, Translator, strip_punctuation};

use super::Transform;

static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\+?\d[\d -]{8,12}\d").expect("valid regex"));
static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}").expect("valid regex")
});

// ---------------------------------------------------------------------------
// Fetch
// ---------------------------------------------------------------------------

/// Fetches every record's url and stores title, description and body text.
pub struct FetchAndExtract {
    fetcher: Fetcher,
    ascii_only: bool,
}

impl FetchAndExtract {
    /// When `ascii_only` is set, characters outside printable ASCII are removed
    /// from the extracted fields.
    pub fn new(fetcher: Fetcher, ascii_only: bool) -> Self {
        Self {
            fetcher,
            ascii_only,
        }
    }

    fn merge(&self, record: &Record, page: PageData) -> Record {
        let field = |value: String, sentinel: &str| {
            let value = if self.ascii_only {
                clean_text(&value)
            } else {
                value
            };
            if value.trim().is_empty() {
                sentinel.to_string()
            } else {
                value
            }
        };

        Record {
            title: Some(field(page.title, TITLE_SENTINEL)),
            description: Some(field(page.description, DESCRIPTION_SENTINEL)),
            text: Some(field(page.text, TEXT_SENTINEL)),
            ..record.clone()
        }
    }
}

#[async_trait]
impl Transform for FetchAndExtract {
    fn name(&self) -> &'static str {
        "fetch-and-extract"
    }

    async fn apply(&self, input: &[Record]) -> Result<Vec<Record>> {
        let urls: Vec<String> = input.iter().map(|r| r.url.clone()).collect();
        let report = self.fetcher.fetch_all(&urls).await;

        if report.pages.len() != input.len() {
            return Err(SieveError::validation(format!(
                "fetch returned {} pages for {} urls",
                report.pages.len(),
                input.len()
            )));
        }

        info!(
            fetched = report.pages.iter().filter(|p| p.fetched).count(),
            client_errors = report.counters.client,
            timeout_errors = report.counters.timeout,
            other_errors = report.counters.other,
            "page metadata merged"
        );

        Ok(input
            .iter()
            .zip(report.pages)
            .map(|(record, page)| self.merge(record, page))
            .collect())
    }
}

/// Keep only printable ASCII characters (0x20..=0x7E).
fn clean_text(text: &str) -> String {
    text.chars().filter(|c| matches!(c, ' '..='~')).collect()
}

// ---------------------------------------------------------------------------
// Translate
// ---------------------------------------------------------------------------

/// Translates titles and descriptions, keyed by url.
pub struct TranslateMetadata {
    translator: Translator,
}

impl TranslateMetadata {
    pub fn new(translator: Translator) -> Self {
        Self { translator }
    }
}

/// (url, stripped text) pairs for records that have both a url and the field.
fn items_for(input: &[Record], field: impl Fn(&Record) -> Option<&String>) -> Vec<TranslationItem> {
    input
        .iter()
        .filter(|record| !record.url.is_empty())
        .filter_map(|record| {
            field(record)
                .filter(|text| !text.is_empty())
                .map(|text| TranslationItem::new(record.url.clone(), strip_punctuation(text)))
        })
        .collect()
}

fn into_map(items: Vec<TranslationItem>) -> HashMap<String, String> {
    items.into_iter().map(|item| (item.key, item.text)).collect()
}

#[async_trait]
impl Transform for TranslateMetadata {
    fn name(&self) -> &'static str {
        "translate-batch"
    }

    async fn apply(&self, input: &[Record]) -> Result<Vec<Record>> {
        let titles = items_for(input, |r| r.title.as_ref());
        let descriptions = items_for(input, |r| r.description.as_ref());

        let titles = into_map(self.translator.translate_batch(titles).await);
        let descriptions = into_map(self.translator.translate_batch(descriptions).await);

        Ok(input
            .iter()
            .map(|record| Record {
                title: titles.get(&record.url).cloned().or_else(|| record.title.clone()),
                description: descriptions
                    .get(&record.url)
                    .cloned()
                    .or_else(|| record.description.clone()),
                ..record.clone()
            })
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Contacts
// ---------------------------------------------------------------------------

/// Scans body text for phone numbers and email addresses.
#[derive(Debug, Clone, Default)]
pub struct ExtractContacts;

#[async_trait]
impl Transform for ExtractContacts {
    fn name(&self) -> &'static str {
        "extract-contacts"
    }

    async fn apply(&self, input: &[Record]) -> Result<Vec<Record>> {
        Ok(input
            .iter()
            .map(|record| {
                let text = record.text.as_deref().unwrap_or("");
                Record {
                    phone_numbers: Some(matches(&PHONE_RE, text)),
                    corporate_emails: Some(matches(&EMAIL_RE, text)),
                    ..record.clone()
                }
            })
            .collect())
    }
}

fn matches(re: &Regex, text: &str) -> Vec<String> {
    re.find_iter(text).map(|m| m.as_str().to_string()).collect()
}

// ---------------------------------------------------------------------------
// Classify
// ---------------------------------------------------------------------------

/// Flags records whose title or description mentions any keyword.
#[derive(Debug, Clone)]
pub struct ClassifyMetadata {
    keywords: Vec<String>,
}

impl ClassifyMetadata {
    /// Keywords are matched case-insensitively; empty keywords are ignored.
    pub fn new(keywords: impl IntoIterator<Item = impl AsRef<str>>) -> Self {
        Self {
            keywords: keywords
                .into_iter()
                .map(|k| k.as_ref().trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }

    fn matches(&self, record: &Record) -> bool {
        let title = record.title.as_deref().unwrap_or("").to_lowercase();
        let description = record.description.as_deref().unwrap_or("").to_lowercase();
        self.keywords
            .iter()
            .any(|k| title.contains(k.as_str()) || description.contains(k.as_str()))
    }
}

#[async_trait]
impl Transform for ClassifyMetadata {
    fn name(&self) -> &'static str {
        "classify-metadata"
    }

    async fn apply(&self, input: &[Record]) -> Result<Vec<Record>> {
        Ok(input
            .iter()
            .map(|record| Record {
                metadata_matches_keywords: Some(self.matches(record)),
                ..record.clone()
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use sieve_shared::{EMPTY_INPUT_SENTINEL, FetchConfig, TRANSLATION_FAILED_SENTINEL};
    use sieve_translate::TranslationService;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::stages::link;

    fn company_html() -> String {
        std::fs::read_to_string("../../../fixtures/html/company.html")
            .expect("missing fixture: company.html")
    }

    fn fetcher() -> Fetcher {
        Fetcher::new(FetchConfig {
            timeout: Duration::from_secs(5),
            concurrency: 4,
            ..FetchConfig::default()
        })
        .unwrap()
    }

    /// Prefixes text with `EN:`; fails on "falla".
    #[derive(Default)]
    struct FakeService {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TranslationService for FakeService {
        async fn translate(&self, text: &str, _target_language: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if text == "falla" {
                return Err(SieveError::Translation("quota exceeded".into()));
            }
            Ok(format!("EN:{text}"))
        }
    }

    fn with_metadata(url: &str, title: Option<&str>, description: Option<&str>) -> Record {
        Record {
            url: url.into(),
            title: title.map(Into::into),
            description: description.map(Into::into),
            ..Record::default()
        }
    }

    #[tokio::test]
    async fn fetch_merges_cleaned_metadata_and_degrades_failures() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/panaderia"))
            .respond_with(ResponseTemplate::new(200).set_body_string(company_html()))
            .mount(&server)
            .await;

        let input = vec![
            link(&format!("{}/panaderia", server.uri()), 3, "Spain"),
            link("http://127.0.0.1:1/unreachable", 1, "UK"),
        ];
        let stage = FetchAndExtract::new(fetcher(), true);
        let out = stage.apply(&input).await.unwrap();

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].title.as_deref(), Some("Panadera Sol | Pan artesano"));
        assert_eq!(
            out[0].description.as_deref(),
            Some("Pan artesano y pasteles en Madrid desde 1987.")
        );
        let text = out[0].text.as_deref().unwrap();
        assert!(text.contains("+34 912 345 678"));
        assert!(text.is_ascii());
        assert_eq!(out[0].occurrence_count, Some(3));
        assert_eq!(out[0].locations, vec!["Spain"]);

        assert_eq!(out[1].title.as_deref(), Some(TITLE_SENTINEL));
        assert_eq!(out[1].description.as_deref(), Some(DESCRIPTION_SENTINEL));
        assert_eq!(out[1].text.as_deref(), Some(TEXT_SENTINEL));
    }

    #[tokio::test]
    async fn fetch_keeps_unicode_when_not_ascii_only() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(company_html()))
            .mount(&server)
            .await;

        let stage = FetchAndExtract::new(fetcher(), false);
        let out = stage.apply(&[link(&server.uri(), 1, "Spain")]).await.unwrap();
        assert_eq!(out[0].title.as_deref(), Some("Panadería Sol | Pan artesano"));
    }

    #[test]
    fn clean_text_keeps_printable_ascii() {
        assert_eq!(clean_text("Caf\u{e9} \u{2013} 24h\n"), "Caf  24h");
        assert_eq!(clean_text("\u{4f60}\u{597d}"), "");
    }

    #[tokio::test]
    async fn translate_merges_by_url_and_keeps_absent_fields() {
        let service = Arc::new(FakeService::default());
        let stage = TranslateMetadata::new(Translator::new(service.clone(), "en", 2).unwrap());

        let input = vec![
            with_metadata("http://a.com/", Some("Hola, mundo!"), Some("falla")),
            with_metadata("http://b.com/", None, Some("...")),
            with_metadata("", Some("sin url"), None),
        ];
        let out = stage.apply(&input).await.unwrap();

        assert_eq!(out[0].title.as_deref(), Some("EN:Hola mundo"));
        assert_eq!(out[0].description.as_deref(), Some(TRANSLATION_FAILED_SENTINEL));
        assert_eq!(out[1].title, None);
        assert_eq!(out[1].description.as_deref(), Some(EMPTY_INPUT_SENTINEL));
        // records without a url are never sent
        assert_eq!(out[2].title.as_deref(), Some("sin url"));
        assert_eq!(service.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn contacts_are_extracted_in_order() {
        let record = Record {
            url: "http://a.com/".into(),
            text: Some(
                "Call +34 912 345 678 or 020-7946-0958. Mail info@a.com, sales.es@a-b.co.uk or x@y"
                    .into(),
            ),
            ..Record::default()
        };
        let out = ExtractContacts.apply(&[record]).await.unwrap();

        assert_eq!(
            out[0].phone_numbers.as_deref(),
            Some(&["+34 912 345 678".to_string(), "020-7946-0958".to_string()][..])
        );
        assert_eq!(
            out[0].corporate_emails.as_deref(),
            Some(&["info@a.com".to_string(), "sales.es@a-b.co.uk".to_string()][..])
        );
    }

    #[tokio::test]
    async fn contacts_without_text_are_empty() {
        let out = ExtractContacts.apply(&[link("http://a.com/", 1, "UK")]).await.unwrap();
        assert_eq!(out[0].phone_numbers, Some(vec![]));
        assert_eq!(out[0].corporate_emails, Some(vec![]));
    }

    #[tokio::test]
    async fn classify_is_case_insensitive_on_title_or_description() {
        let stage = ClassifyMetadata::new(["Bakery", "  ", "pan"]);
        let input = vec![
            with_metadata("http://a.com/", Some("Best BAKERY in town"), None),
            with_metadata("http://b.com/", Some("Tiles"), Some("Pan artesano")),
            with_metadata("http://c.com/", Some("Tiles"), Some("Ceramics")),
        ];
        let out = stage.apply(&input).await.unwrap();

        let flags: Vec<Option<bool>> = out.iter().map(|r| r.metadata_matches_keywords).collect();
        assert_eq!(flags, vec![Some(true), Some(true), Some(false)]);
    }

    #[tokio::test]
    async fn classify_without_keywords_is_false() {
        let none: [&str; 0] = [];
        let out = ClassifyMetadata::new(none)
            .apply(&[with_metadata("http://a.com/", Some("anything"), None)])
            .await
            .unwrap();
        assert_eq!(out[0].metadata_matches_keywords, Some(false));
    }
}
