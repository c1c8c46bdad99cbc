use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::error::{Result, GlossaError};
use crate::languages::SOURCE_LANGUAGE;
use super::TranslateProvider;

const FREE_ENDPOINT: &str = "https://translate.googleapis.com/translate_a/single";

/// Keyless web translation endpoint. No credentials, but rate limited, so
/// callers retry with a delay.
pub struct FreeTranslator {
    client: Client,
}

impl FreeTranslator {
    pub fn new(timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .expect("HTTP client creation should not fail");

        Self { client }
    }
}

#[async_trait]
impl TranslateProvider for FreeTranslator {
    async fn translate(&self, text: &str, target: &str) -> Result<String> {
        debug!("Free translation request for {}", target);

        let response = self
            .client
            .get(FREE_ENDPOINT)
            .query(&[
                ("client", "gtx"),
                ("sl", SOURCE_LANGUAGE),
                ("tl", target),
                ("dt", "t"),
                ("q", text),
            ])
            .send()
            .await
            .map_err(|e| GlossaError::Translation(format!("Free provider request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(GlossaError::Translation(format!(
                "Free provider error {} for {}",
                response.status(),
                target
            )));
        }

        // Response is a nested array: [[["<translated>", "<source>", ...], ...], ...]
        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| GlossaError::Translation(format!("Failed to parse free provider response: {}", e)))?;

        let segments = body
            .get(0)
            .and_then(|v| v.as_array())
            .ok_or_else(|| {
                GlossaError::Translation(format!("Unexpected free provider response shape for {}", target))
            })?;

        let mut translated = String::new();
        for segment in segments {
            if let Some(part) = segment.get(0).and_then(|v| v.as_str()) {
                translated.push_str(part);
            }
        }

        let translated = translated.trim().to_string();
        if translated.is_empty() {
            return Err(GlossaError::Translation(format!(
                "Free provider returned no translation for {}",
                target
            )));
        }

        Ok(translated)
    }

    fn name(&self) -> &'static str {
        "free"
    }
}
