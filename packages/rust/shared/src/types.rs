//! Core domain types: the [`Record`] flowing through the pipeline and the
//! domain-key derivation every grouping stage relies on.

use serde::{Deserialize, Serialize};
use url::Url;

// ---------------------------------------------------------------------------
// Sentinels
// ---------------------------------------------------------------------------

/// Title placeholder when a page could not be fetched or has no `<title>`.
pub const TITLE_SENTINEL: &str = "Title cannot be extracted";
/// Description placeholder when a page could not be fetched or has no meta description.
pub const DESCRIPTION_SENTINEL: &str = "Description cannot be extracted";
/// Text placeholder when a page could not be fetched or has no heading/paragraph text.
pub const TEXT_SENTINEL: &str = "Text cannot be extracted";
/// Translation placeholder for blank input (the service is never called).
pub const EMPTY_INPUT_SENTINEL: &str = "Original text was empty or invalid";
/// Translation placeholder when the service call fails.
pub const TRANSLATION_FAILED_SENTINEL: &str = "Translation failed";
/// Translation placeholder when the service answers with empty text.
pub const EMPTY_TRANSLATION_SENTINEL: &str = "Translation resulted in empty text";

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// One link/website observation.
///
/// Stages never mutate a record they received; they clone and emit a new one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Canonical identifier. For aggregate records this is the domain itself.
    pub url: String,
    /// Explicit domain, set only on records emitted by the aggregate stage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    /// Number of times the domain was observed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occurrence_count: Option<u64>,
    /// Distinct location labels, first-seen order.
    #[serde(default)]
    pub locations: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_numbers: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corporate_emails: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata_matches_keywords: Option<bool>,
}

impl Record {
    /// The grouping key: the explicit domain if present, otherwise the url's authority.
    pub fn domain_key(&self) -> Option<String> {
        match &self.domain {
            Some(domain) => Some(domain.clone()),
            None => domain_key(&self.url),
        }
    }
}

/// A line of crawler output: `{url, num_occurrences, loc}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawLink {
    pub url: String,
    pub num_occurrences: u64,
    pub loc: String,
}

impl From<RawLink> for Record {
    fn from(raw: RawLink) -> Self {
        Self {
            url: raw.url,
            occurrence_count: Some(raw.num_occurrences),
            locations: vec![raw.loc],
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Domain key
// ---------------------------------------------------------------------------

/// Derive the domain key (authority, scheme-agnostic) of a url.
///
/// Accepts both absolute urls (`http://a.com:8080/x`) and scheme-less ones
/// (`a.com/x`). Returns `None` when no host can be found.
pub fn domain_key(url: &str) -> Option<String> {
    let trimmed = url.trim();

    if let Ok(parsed) = Url::parse(trimmed) {
        if let Some(host) = parsed.host_str() {
            return Some(match parsed.port() {
                Some(port) => format!("{host}:{port}"),
                None => host.to_string(),
            });
        }
    }

    let rest = trimmed.split_once("://").map_or(trimmed, |(_, rest)| rest);
    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
    let host = authority
        .rsplit_once('@')
        .map_or(authority, |(_, host)| host);

    if host.is_empty() {
        None
    } else {
        Some(host.to_ascii_lowercase())
    }
}
