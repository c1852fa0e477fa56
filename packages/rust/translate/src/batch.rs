//! Bounded-concurrency batch translation.
//!
//! [`Translator::translate_batch`] must be awaited as a top-level unit of work
//! on the caller's runtime. Do not drive it through `Handle::block_on` or
//! `futures::executor::block_on` from inside another async task: that nests
//! one scheduler inside an already running one.

use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

use sieve_shared::{
    EMPTY_INPUT_SENTINEL, EMPTY_TRANSLATION_SENTINEL, Result, SieveError,
    TRANSLATION_FAILED_SENTINEL, TranslationConfig,
};

use crate::service::{GoogleTranslate, TranslationService};

/// A keyed piece of text. The key is the record url the text belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationItem {
    pub key: String,
    pub text: String,
}

impl TranslationItem {
    pub fn new(key: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            text: text.into(),
        }
    }
}

/// Translates batches of items with at most `concurrency` requests in flight.
pub struct Translator {
    service: Arc<dyn TranslationService>,
    semaphore: Arc<Semaphore>,
    target_language: String,
}

impl Translator {
    /// Create a translator over an arbitrary service.
    pub fn new(
        service: Arc<dyn TranslationService>,
        target_language: impl Into<String>,
        concurrency: usize,
    ) -> Result<Self> {
        if concurrency == 0 {
            return Err(SieveError::config(
                "translation concurrency must be at least 1",
            ));
        }

        info!(concurrency, "translator initialized");
        Ok(Self {
            service,
            semaphore: Arc::new(Semaphore::new(concurrency)),
            target_language: target_language.into(),
        })
    }

    /// Create a translator backed by [`GoogleTranslate`] at the configured url.
    pub fn from_config(config: &TranslationConfig) -> Result<Self> {
        let service = GoogleTranslate::new(config.service_url.clone())?;
        Self::new(
            Arc::new(service),
            config.target_language.clone(),
            config.concurrency,
        )
    }

    /// Translate every item. Always returns one output per input, in input order.
    ///
    /// Blank text never reaches the service; a failed call only degrades its own item.
    #[instrument(skip_all, fields(items = items.len(), target = %self.target_language))]
    pub async fn translate_batch(&self, items: Vec<TranslationItem>) -> Vec<TranslationItem> {
        if items.is_empty() {
            return Vec::new();
        }

        let start_time = Instant::now();
        let results = join_all(items.into_iter().map(|item| self.translate_item(item))).await;

        let failed = results
            .iter()
            .filter(|item| item.text == TRANSLATION_FAILED_SENTINEL)
            .count();
        info!(
            translated = results.len(),
            failed,
            duration_ms = start_time.elapsed().as_millis(),
            "translation batch completed"
        );

        results
    }

    async fn translate_item(&self, item: TranslationItem) -> TranslationItem {
        let Ok(_permit) = self.semaphore.acquire().await else {
            warn!(key = %item.key, "translation limiter closed");
            return TranslationItem::new(item.key, TRANSLATION_FAILED_SENTINEL);
        };

        if item.text.trim().is_empty() {
            return TranslationItem::new(item.key, EMPTY_INPUT_SENTINEL);
        }

        debug!(key = %item.key, preview = %preview(&item.text), "translating");

        let text = match self
            .service
            .translate(&item.text, &self.target_language)
            .await
        {
            Ok(translated) if translated.trim().is_empty() => {
                EMPTY_TRANSLATION_SENTINEL.to_string()
            }
            Ok(translated) => translated,
            Err(e) => {
                warn!(key = %item.key, preview = %preview(&item.text), error = %e, "translation failed");
                TRANSLATION_FAILED_SENTINEL.to_string()
            }
        };

        TranslationItem { key: item.key, text }
    }
}

/// Remove ASCII punctuation before sending text to the service.
pub fn strip_punctuation(text: &str) -> String {
    text.chars().filter(|c| !c.is_ascii_punctuation()).collect()
}

fn preview(text: &str) -> String {
    text.chars().take(50).collect()
}
