//! The external translation capability and its HTTP implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use sieve_shared::{Result, SieveError};

/// Default timeout for a single translation request.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Anything that can translate `text` into `target_language`.
#[async_trait]
pub trait TranslationService: Send + Sync {
    async fn translate(&self, text: &str, target_language: &str) -> Result<String>;
}

/// Client for the public `translate_a/single` endpoint.
pub struct GoogleTranslate {
    client: Client,
    base_url: String,
}

impl GoogleTranslate {
    /// Create a client talking to `base_url` (e.g. `https://translate.googleapis.com`).
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| SieveError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl TranslationService for GoogleTranslate {
    async fn translate(&self, text: &str, target_language: &str) -> Result<String> {
        let endpoint = format!("{}/translate_a/single", self.base_url);
        debug!(%endpoint, target_language, chars = text.len(), "requesting translation");

        let response = self
            .client
            .get(&endpoint)
            .query(&[
                ("client", "gtx"),
                ("sl", "auto"),
                ("tl", target_language),
                ("dt", "t"),
                ("q", text),
            ])
            .send()
            .await
            .map_err(|e| SieveError::Translation(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SieveError::Translation(format!("HTTP {status}")));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| SieveError::Translation(format!("invalid response body: {e}")))?;

        parse_segments(&body)
    }
}

/// Join the translated segments of a `translate_a/single` response.
///
/// The payload looks like `[[["Hello ","Hola ",..],["world","mundo",..]],null,"es"]`.
fn parse_segments(body: &Value) -> Result<String> {
    let segments = body
        .get(0)
        .and_then(Value::as_array)
        .ok_or_else(|| SieveError::Translation("response has no segment list".into()))?;

    Ok(segments
        .iter()
        .filter_map(|segment| segment.get(0).and_then(Value::as_str))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn parses_multi_segment_response() {
        let body = serde_json::json!([
            [["Artisan bread ", "Pan artesano ", null, null, 10], ["in Madrid", "en Madrid", null, null, 10]],
            null,
            "es"
        ]);
        assert_eq!(parse_segments(&body).unwrap(), "Artisan bread in Madrid");
    }

    #[test]
    fn rejects_unexpected_shape() {
        let body = serde_json::json!({"error": "quota"});
        assert!(parse_segments(&body).is_err());
    }

    #[tokio::test]
    async fn translates_via_http() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/translate_a/single"))
            .and(query_param("tl", "en"))
            .and(query_param("q", "Pan artesano"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                [["Artisan bread", "Pan artesano", null, null, 10]],
                null,
                "es"
            ])))
            .mount(&server)
            .await;

        let service = GoogleTranslate::new(format!("{}/", server.uri())).unwrap();
        let translated = service.translate("Pan artesano", "en").await.unwrap();
        assert_eq!(translated, "Artisan bread");
    }

    #[tokio::test]
    async fn http_error_is_translation_error() {
        let server = MockServer::start().await;
        Mock::given(path("/translate_a/single"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let service = GoogleTranslate::new(server.uri()).unwrap();
        let err = service.translate("hola", "en").await.unwrap_err();
        assert!(matches!(err, SieveError::Translation(_)));
        assert!(err.to_string().contains("429"));
    }
}
