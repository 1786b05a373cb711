//! Translation backend.
//!
//! One HTTP round trip per attempt: (text, target language) in, detected
//! source language and translated text out. The language fallback loop lives
//! in the application layer; this module only performs single calls.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Errors from a single translation attempt.
#[derive(Error, Debug)]
pub enum TranslateError {
    #[error("translation request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected response shape: {0}")]
    Malformed(String),
}

/// Result of one successful translation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    /// Source language the backend detected.
    pub detected: String,
    /// Translated text.
    pub text: String,
}

/// A translation service, mockable for tests.
#[async_trait]
pub trait TranslateBackend: Send + Sync {
    /// Translate `text` into `target`, reporting the detected source language.
    async fn translate(&self, text: &str, target: &str) -> Result<Translation, TranslateError>;
}

/// Client for the Google "gtx" endpoint.
#[derive(Debug)]
pub struct GoogleTranslate {
    client: reqwest::Client,
    endpoint: String,
}

impl GoogleTranslate {
    /// Create a client for the given endpoint URL.
    pub fn new(endpoint: String) -> Result<Self, TranslateError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl TranslateBackend for GoogleTranslate {
    async fn translate(&self, text: &str, target: &str) -> Result<Translation, TranslateError> {
        debug!("Requesting translation to {target}");

        let body = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("client", "gtx"),
                ("sl", "auto"),
                ("tl", target),
                ("dt", "t"),
                ("q", text),
            ])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        parse_gtx(&body)
    }
}

/// Parse the gtx response array.
///
/// Shape: `[[["segment", "original", ...], ...], null, "detected-lang", ...]`.
/// Segments are concatenated in order.
fn parse_gtx(body: &str) -> Result<Translation, TranslateError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| TranslateError::Malformed(e.to_string()))?;

    let segments = value
        .get(0)
        .and_then(Value::as_array)
        .ok_or_else(|| TranslateError::Malformed("missing segment list".to_string()))?;

    let mut text = String::new();
    for segment in segments {
        if let Some(part) = segment.get(0).and_then(Value::as_str) {
            text.push_str(part);
        }
    }

    if text.is_empty() {
        return Err(TranslateError::Malformed("empty translation".to_string()));
    }

    let detected = value
        .get(2)
        .and_then(Value::as_str)
        .ok_or_else(|| TranslateError::Malformed("missing detected language".to_string()))?
        .to_string();

    Ok(Translation { detected, text })
}
