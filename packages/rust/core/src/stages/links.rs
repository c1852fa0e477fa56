//! Url-level transforms: canonicalization and blacklist filtering.

use async_trait::async_trait;
use tracing::warn;

use sieve_shared::{Record, Result};

use super::Transform;

/// Removes a literal substring (e.g. `www.`) from every url.
///
/// Records left without a domain key are dropped.
#[derive(Debug, Clone)]
pub struct Canonicalize {
    strip: String,
}

impl Canonicalize {
    pub fn new(strip: impl Into<String>) -> Self {
        Self {
            strip: strip.into(),
        }
    }
}

#[async_trait]
impl Transform for Canonicalize {
    fn name(&self) -> &'static str {
        "canonicalize"
    }

    async fn apply(&self, input: &[Record]) -> Result<Vec<Record>> {
        if self.strip.is_empty() {
            return Ok(input.to_vec());
        }

        let mut out = Vec::with_capacity(input.len());
        for record in input {
            let url = record.url.replace(&self.strip, "");
            let canonical = Record {
                url,
                ..record.clone()
            };
            // stripping can erase the whole host, e.g. `http://www./`
            if canonical.domain_key().is_none() {
                warn!(url = %record.url, "url has no domain after canonicalization, dropping");
                continue;
            }
            out.push(canonical);
        }

        Ok(out)
    }
}

/// Drops records whose url contains any blacklisted substring (case-sensitive).
#[derive(Debug, Clone)]
pub struct FilterByBlacklist {
    words: Vec<String>,
}

impl FilterByBlacklist {
    /// Empty entries are ignored; they would match every url.
    pub fn new(words: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            words: words
                .into_iter()
                .map(Into::into)
                .filter(|w: &String| !w.is_empty())
                .collect(),
        }
    }

    fn is_blacklisted(&self, url: &str) -> bool {
        self.words.iter().any(|word| url.contains(word.as_str()))
    }
}

#[async_trait]
impl Transform for FilterByBlacklist {
    fn name(&self) -> &'static str {
        "filter-by-blacklist"
    }

    async fn apply(&self, input: &[Record]) -> Result<Vec<Record>> {
        Ok(input
            .iter()
            .filter(|record| !self.is_blacklisted(&record.url))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::link;

    #[tokio::test]
    async fn canonicalize_strips_every_occurrence() {
        let input = vec![
            link("http://www.a.com/x", 1, "UK"),
            link("https://b.com/www.html", 1, "ES"),
            link("http://c.com/", 1, "PT"),
        ];
        let out = Canonicalize::new("www.").apply(&input).await.unwrap();

        let urls: Vec<&str> = out.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(urls, vec!["http://a.com/x", "https://b.com/html", "http://c.com/"]);
        // input untouched
        assert_eq!(input[0].url, "http://www.a.com/x");
        assert_eq!(out[0].locations, vec!["UK"]);
    }

    #[tokio::test]
    async fn canonicalize_drops_urls_left_without_a_domain() {
        let input = vec![
            link("http://www./", 1, "UK"),
            link("http://www.a.com/", 2, "ES"),
        ];
        let out = Canonicalize::new("www.").apply(&input).await.unwrap();

        let urls: Vec<&str> = out.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(urls, vec!["http://a.com/"]);
        assert!(out.iter().all(|r| r.domain_key().is_some()));
    }

    #[tokio::test]
    async fn blacklist_drops_matches_case_sensitively() {
        let input = vec![
            link("http://facebook.com/shop", 1, "UK"),
            link("http://Facebook.com/shop", 1, "UK"),
            link("http://shop.com/", 1, "UK"),
        ];
        let filter = FilterByBlacklist::new(["facebook."]);
        let out = filter.apply(&input).await.unwrap();

        let urls: Vec<&str> = out.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(urls, vec!["http://Facebook.com/shop", "http://shop.com/"]);
    }

    #[tokio::test]
    async fn blacklist_is_idempotent() {
        let input = vec![
            link("http://a.com/", 1, "UK"),
            link("http://linkedin.com/company/a", 2, "UK"),
            link("http://youtube.com/a", 1, "ES"),
            link("http://b.com/", 1, "ES"),
        ];
        let filter = FilterByBlacklist::new(["linkedin.", "youtube."]);

        let once = filter.apply(&input).await.unwrap();
        let twice = filter.apply(&once).await.unwrap();
        assert_eq!(once, twice);
        assert!(
            once.iter()
                .all(|r| !r.url.contains("linkedin.") && !r.url.contains("youtube."))
        );
    }

    #[tokio::test]
    async fn empty_blacklist_and_empty_words_are_noops() {
        let input = vec![link("http://a.com/", 1, "UK")];
        let none: [&str; 0] = [];
        assert_eq!(FilterByBlacklist::new(none).apply(&input).await.unwrap(), input);
        assert_eq!(FilterByBlacklist::new([""]).apply(&input).await.unwrap(), input);
    }
}
