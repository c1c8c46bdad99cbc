use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::LlmConfig;
use crate::error::{Result, GlossaError};
use crate::translate::TranslationSet;

/// Language code mapped to the raw model output for that language's
/// translated prompt. `None` marks a failed query, persisted as JSON null.
pub type ModelResponse = BTreeMap<String, Option<String>>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub model: String,
    pub prompt: String,
    pub system: String,
    pub stream: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub response: String,
    pub done: bool,
}

/// A completion backend for one prompt at a time.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// Reachability check for the backend; assumed available by default.
    async fn check_availability(&self) -> Result<()> {
        Ok(())
    }
}

/// Client for a locally hosted Ollama server.
pub struct OllamaClient {
    client: Client,
    config: LlmConfig,
}

impl OllamaClient {
    pub fn new(config: LlmConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .expect("HTTP client creation should not fail");

        Self { client, config }
    }
}

#[async_trait]
impl CompletionClient for OllamaClient {
    /// Check that the server is reachable and the model is present.
    async fn check_availability(&self) -> Result<()> {
        let url = format!("{}/api/show", self.config.endpoint);
        let request = serde_json::json!({ "name": self.config.model });

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| GlossaError::ModelQuery(format!("Failed to connect to Ollama: {}", e)))?;

        if response.status().is_success() {
            info!("Ollama model '{}' is available", self.config.model);
            Ok(())
        } else {
            Err(GlossaError::ModelQuery(format!(
                "Ollama model '{}' not found. Please pull the model first: ollama pull {}",
                self.config.model, self.config.model
            )))
        }
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let request = CompletionRequest {
            model: self.config.model.clone(),
            prompt: prompt.to_string(),
            system: self.config.system_prompt.clone(),
            stream: false,
        };

        let url = format!("{}/api/generate", self.config.endpoint);
        debug!("Sending completion request to: {}", url);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| GlossaError::ModelQuery(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(GlossaError::ModelQuery(format!(
                "Ollama API error {}: {}",
                status, error_text
            )));
        }

        let completion: CompletionResponse = response
            .json()
            .await
            .map_err(|e| GlossaError::ModelQuery(format!("Failed to parse response: {}", e)))?;

        let raw = completion.response.trim().to_string();
        if raw.is_empty() {
            return Err(GlossaError::ModelQuery("Empty completion received".to_string()));
        }

        Ok(raw)
    }
}

/// Query the model once per translated language, in order, pacing requests
/// so the local server is not flooded. A failed query is logged and recorded
/// as `None`; the loop never aborts.
pub async fn query_all(
    client: &dyn CompletionClient,
    translations: &TranslationSet,
    pace: Duration,
) -> ModelResponse {
    let mut outputs = ModelResponse::new();
    let mut first = true;

    for (language, prompt) in translations {
        if prompt.trim().is_empty() {
            outputs.insert(language.clone(), None);
            continue;
        }

        if !first && !pace.is_zero() {
            tokio::time::sleep(pace).await;
        }
        first = false;

        info!("Querying model for language: {}", language);
        match client.complete(prompt).await {
            Ok(response) => {
                outputs.insert(language.clone(), Some(response));
            }
            Err(e) => {
                warn!("Model query failed for {}: {}", language, e);
                outputs.insert(language.clone(), None);
            }
        }
    }

    outputs
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::mock;

    mock! {
        Completion {}

        #[async_trait]
        impl CompletionClient for Completion {
            async fn complete(&self, prompt: &str) -> Result<String>;
        }
    }

    fn translations(entries: &[(&str, &str)]) -> TranslationSet {
        entries
            .iter()
            .map(|(code, text)| (code.to_string(), text.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_query_all_records_failures_as_none() {
        let mut client = MockCompletion::new();
        client.expect_complete().returning(|prompt| {
            if prompt.contains("boom") {
                Err(GlossaError::ModelQuery("connection refused".to_string()))
            } else {
                Ok("```python\npass\n```".to_string())
            }
        });

        let set = translations(&[("en", "hello"), ("fr", "boom"), ("ja", "hello")]);
        let outputs = query_all(&client, &set, Duration::ZERO).await;

        assert_eq!(outputs.len(), 3);
        assert!(outputs["en"].is_some());
        assert!(outputs["fr"].is_none());
        assert!(outputs["ja"].is_some());
    }

    #[tokio::test]
    async fn test_query_all_skips_empty_prompts() {
        let mut client = MockCompletion::new();
        client.expect_complete().times(1).returning(|_| Ok("ok".to_string()));

        let set = translations(&[("en", "hello"), ("fr", "  ")]);
        let outputs = query_all(&client, &set, Duration::ZERO).await;

        assert!(outputs["en"].is_some());
        assert!(outputs["fr"].is_none());
    }

    #[test]
    fn test_completion_request_shape() {
        let request = CompletionRequest {
            model: "qwen3:30b-a3b".to_string(),
            prompt: "write code".to_string(),
            system: "You are a code generator.".to_string(),
            stream: false,
        };
        let value = serde_json::to_value(&request).expect("serializes");
        assert_eq!(value["stream"], serde_json::json!(false));
        assert_eq!(value["model"], serde_json::json!("qwen3:30b-a3b"));
        assert!(value.get("system").is_some());
    }
}
