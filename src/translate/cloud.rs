use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::TranslatorConfig;
use crate::error::{Result, GlossaError};
use super::TranslateProvider;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TranslateTextRequest<'a> {
    contents: Vec<&'a str>,
    mime_type: &'static str,
    target_language_code: &'a str,
}

#[derive(Debug, Deserialize)]
struct TranslateTextResponse {
    translations: Vec<Translation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Translation {
    translated_text: String,
}

/// Google Cloud Translation v3 REST client. The bearer token is read once
/// from the configured credentials file at construction time.
pub struct CloudTranslator {
    client: Client,
    project_id: String,
    access_token: String,
}

impl CloudTranslator {
    pub fn from_config(config: &TranslatorConfig) -> Result<Self> {
        let project_id = config
            .project_id
            .clone()
            .ok_or_else(|| GlossaError::Config("Cloud translation requires a project id".to_string()))?;

        let credentials_path = config
            .credentials_path
            .as_ref()
            .ok_or_else(|| GlossaError::Config("Cloud translation requires a credentials file".to_string()))?;

        let access_token = std::fs::read_to_string(credentials_path)
            .map_err(|e| {
                GlossaError::Config(format!(
                    "Failed to read credentials file {}: {}",
                    credentials_path.display(),
                    e
                ))
            })?
            .trim()
            .to_string();

        if access_token.is_empty() {
            return Err(GlossaError::Config(format!(
                "Credentials file {} is empty",
                credentials_path.display()
            )));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .expect("HTTP client creation should not fail");

        Ok(Self {
            client,
            project_id,
            access_token,
        })
    }
}

#[async_trait]
impl TranslateProvider for CloudTranslator {
    async fn translate(&self, text: &str, target: &str) -> Result<String> {
        let url = format!(
            "https://translation.googleapis.com/v3/projects/{}/locations/global:translateText",
            self.project_id
        );

        debug!("Cloud translation request for {}", target);

        let request = TranslateTextRequest {
            contents: vec![text],
            mime_type: "text/plain",
            target_language_code: target,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&request)
            .send()
            .await
            .map_err(|e| GlossaError::Translation(format!("Cloud provider request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(GlossaError::Translation(format!(
                "Cloud provider error {} for {}: {}",
                status, target, error_text
            )));
        }

        let body: TranslateTextResponse = response
            .json()
            .await
            .map_err(|e| GlossaError::Translation(format!("Failed to parse cloud provider response: {}", e)))?;

        let translated = body
            .translations
            .into_iter()
            .next()
            .map(|t| t.translated_text.trim().to_string())
            .unwrap_or_default();

        if translated.is_empty() {
            return Err(GlossaError::Translation(format!(
                "Cloud provider returned no translation for {}",
                target
            )));
        }

        Ok(translated)
    }

    fn name(&self) -> &'static str {
        "cloud"
    }
}
