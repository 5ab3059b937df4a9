//! Machine translation collaborators.
//!
//! Translation is best effort: the pipeline falls back to the source text
//! whenever a translator fails, so callers never see which path was taken.

use crate::error::{DubError, Result};
use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;
use tracing::warn;

/// Translates one utterance.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, source: &str, target: &str) -> Result<String>;

    /// Short name for logs.
    fn name(&self) -> &str;
}

/// Translates `text`, returning it unchanged on failure or empty output.
///
/// Empty and whitespace-only text is never sent.
pub async fn translate_or_original(
    translator: &dyn Translator,
    text: &str,
    source: &str,
    target: &str,
) -> String {
    if text.trim().is_empty() {
        return text.to_string();
    }

    match translator.translate(text, source, target).await {
        Ok(translated) if !translated.trim().is_empty() => translated,
        Ok(_) => {
            warn!(translator = translator.name(), "empty translation, keeping source text");
            text.to_string()
        }
        Err(e) => {
            warn!(translator = translator.name(), error = %e, "translation failed, keeping source text");
            text.to_string()
        }
    }
}

/// Leaves text untouched; used when no translation service is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

#[async_trait]
impl Translator for Passthrough {
    async fn translate(&self, text: &str, _source: &str, _target: &str) -> Result<String> {
        Ok(text.to_string())
    }

    fn name(&self) -> &str {
        "passthrough"
    }
}

#[cfg(feature = "libretranslate")]
pub use libre::LibreTranslate;

#[cfg(feature = "libretranslate")]
mod libre {
    use super::*;
    use serde::{Deserialize, Serialize};

    /// Client for a LibreTranslate-compatible `/translate` endpoint.
    #[derive(Debug, Clone)]
    pub struct LibreTranslate {
        client: reqwest::Client,
        endpoint: String,
        api_key: Option<String>,
    }

    #[derive(Serialize)]
    struct TranslateRequest<'a> {
        q: &'a str,
        source: &'a str,
        target: &'a str,
        format: &'static str,
        #[serde(skip_serializing_if = "Option::is_none")]
        api_key: Option<&'a str>,
    }

    #[derive(Deserialize)]
    struct TranslateResponse {
        #[serde(rename = "translatedText")]
        translated_text: String,
    }

    impl LibreTranslate {
        pub fn new(
            endpoint: impl Into<String>,
            api_key: Option<String>,
            timeout: Duration,
        ) -> Result<Self> {
            let client = reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|e| DubError::Translation {
                    message: format!("Failed to build HTTP client: {e}"),
                })?;
            Ok(Self {
                client,
                endpoint: endpoint.into(),
                api_key,
            })
        }
    }

    #[async_trait]
    impl Translator for LibreTranslate {
        async fn translate(&self, text: &str, source: &str, target: &str) -> Result<String> {
            let request = TranslateRequest {
                q: text,
                source,
                target,
                format: "text",
                api_key: self.api_key.as_deref(),
            };

            let response = self
                .client
                .post(&self.endpoint)
                .json(&request)
                .send()
                .await
                .map_err(|e| DubError::Translation {
                    message: format!("request to {} failed: {e}", self.endpoint),
                })?;

            if !response.status().is_success() {
                return Err(DubError::Translation {
                    message: format!("{} returned status {}", self.endpoint, response.status()),
                });
            }

            let body: TranslateResponse =
                response.json().await.map_err(|e| DubError::Translation {
                    message: format!("unexpected response from {}: {e}", self.endpoint),
                })?;
            Ok(body.translated_text)
        }

        fn name(&self) -> &str {
            "libretranslate"
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn request_omits_missing_api_key() {
            let request = TranslateRequest {
                q: "hello",
                source: "en",
                target: "ar",
                format: "text",
                api_key: None,
            };
            let json = serde_json::to_value(&request).unwrap();
            assert_eq!(
                json,
                serde_json::json!({"q": "hello", "source": "en", "target": "ar", "format": "text"})
            );
        }

        #[test]
        fn response_reads_translated_text() {
            let body: TranslateResponse =
                serde_json::from_str(r#"{"translatedText": "مرحبا"}"#).unwrap();
            assert_eq!(body.translated_text, "مرحبا");
        }

        #[tokio::test]
        async fn unreachable_endpoint_is_translation_error() {
            let client = LibreTranslate::new(
                "http://127.0.0.1:9/translate",
                None,
                Duration::from_secs(2),
            )
            .unwrap();
            let err = client.translate("hello", "en", "ar").await.unwrap_err();
            assert!(matches!(err, DubError::Translation { .. }));
        }
    }
}

/// Mock translator for testing.
#[derive(Debug, Default)]
pub struct MockTranslator {
    prefix: String,
    should_fail: bool,
    delay: Option<Duration>,
    calls: Mutex<Vec<String>>,
}

impl MockTranslator {
    /// Translates by prefixing `prefix` to the text.
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            ..Self::default()
        }
    }

    /// Configure the mock to fail on every call.
    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }

    /// Sleep for `delay` before answering each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Texts the mock was asked to translate, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Translator for MockTranslator {
    async fn translate(&self, text: &str, _source: &str, _target: &str) -> Result<String> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(text.to_string());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.should_fail {
            return Err(DubError::Translation {
                message: "mock translation failure".to_string(),
            });
        }
        Ok(format!("{}{}", self.prefix, text))
    }

    fn name(&self) -> &str {
        "mock"
    }
}
