// Translation layer
//
// Two providers behind one trait:
// - Cloud: Google Cloud Translation v3, used when credentials are configured
// - Free: keyless web endpoint, always available as the fallback
//
// The provider is selected once from the configuration at startup; the
// per-call path never re-checks the environment.

pub mod cloud;
pub mod free;

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::config::TranslatorConfig;
use crate::error::{Result, GlossaError};
use crate::languages::{normalize_text, SOURCE_LANGUAGE, TARGET_LANGUAGES};

pub use cloud::CloudTranslator;
pub use free::FreeTranslator;

/// Language code mapped to translated prompt text. Keys are a subset of
/// [`TARGET_LANGUAGES`]; the source language is always present as the
/// identity translation.
pub type TranslationSet = BTreeMap<String, String>;

/// A single translation backend.
#[async_trait]
pub trait TranslateProvider: Send + Sync {
    /// Translate `text` into the language named by `target`
    async fn translate(&self, text: &str, target: &str) -> Result<String>;

    /// Short provider name for log lines
    fn name(&self) -> &'static str;
}

/// Which backend the configuration selects as primary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderChoice {
    Cloud,
    Free,
}

impl ProviderChoice {
    /// Decide the provider once from the configuration. Cloud requires a
    /// project id and a readable credentials file; anything less silently
    /// selects the free provider.
    pub fn from_config(config: &TranslatorConfig) -> Self {
        match (&config.project_id, &config.credentials_path) {
            (Some(project), Some(path)) if !project.is_empty() && path.is_file() => {
                ProviderChoice::Cloud
            }
            _ => ProviderChoice::Free,
        }
    }
}

/// Translator with primary/fallback policy and bounded retries on the
/// fallback, which is subject to rate limiting.
pub struct Translator {
    primary: Option<Box<dyn TranslateProvider>>,
    fallback: Box<dyn TranslateProvider>,
    max_retries: u32,
    retry_delay: Duration,
}

impl Translator {
    /// Build the translator the configuration describes.
    pub fn from_config(config: &TranslatorConfig) -> Self {
        let primary: Option<Box<dyn TranslateProvider>> =
            match ProviderChoice::from_config(config) {
                ProviderChoice::Cloud => match CloudTranslator::from_config(config) {
                    Ok(cloud) => {
                        info!("Using cloud translation provider");
                        Some(Box::new(cloud))
                    }
                    Err(e) => {
                        warn!("Cloud credentials unusable ({}), falling back to free provider", e);
                        None
                    }
                },
                ProviderChoice::Free => None,
            };

        Self::with_providers(
            primary,
            Box::new(FreeTranslator::new(config.request_timeout_secs)),
            config.max_retries,
            config.retry_delay_ms,
        )
    }

    /// Assemble from explicit providers. Tests inject stubs here.
    pub fn with_providers(
        primary: Option<Box<dyn TranslateProvider>>,
        fallback: Box<dyn TranslateProvider>,
        max_retries: u32,
        retry_delay_ms: u64,
    ) -> Self {
        Self {
            primary,
            fallback,
            max_retries,
            retry_delay: Duration::from_millis(retry_delay_ms),
        }
    }

    /// Translate one text into one target language. Tries the primary
    /// provider first when configured, then the fallback with bounded
    /// retries. All providers exhausted surfaces the last error.
    pub async fn translate(&self, text: &str, target: &str) -> Result<String> {
        if let Some(primary) = &self.primary {
            match primary.translate(text, target).await {
                Ok(translated) if !translated.trim().is_empty() => {
                    return Ok(translated);
                }
                Ok(_) => {
                    warn!("{} provider returned empty text for {}, falling back", primary.name(), target);
                }
                Err(e) => {
                    warn!("{} provider failed for {}: {}, falling back", primary.name(), target, e);
                }
            }
        }

        let mut last_error =
            GlossaError::Translation(format!("No translation attempt made for {}", target));
        let mut attempts = 0;

        while attempts < self.max_retries.max(1) {
            attempts += 1;

            match self.fallback.translate(text, target).await {
                Ok(translated) if !translated.trim().is_empty() => {
                    return Ok(translated);
                }
                Ok(_) => {
                    last_error = GlossaError::Translation(format!(
                        "{} provider returned empty text for {}",
                        self.fallback.name(),
                        target
                    ));
                }
                Err(e) => {
                    last_error = e;
                }
            }

            if attempts < self.max_retries.max(1) {
                debug!("Retrying {} after {:?} (attempt {})", target, self.retry_delay, attempts);
                tokio::time::sleep(self.retry_delay).await;
            }
        }

        Err(last_error)
    }

    /// Batch translation driver: translate the (normalized) text into every
    /// target language. A per-language failure is logged and its key
    /// omitted; partial sets are expected. The source language is always
    /// included as the identity translation.
    pub async fn translate_all_languages(&self, text: &str) -> TranslationSet {
        let text = normalize_text(text);

        let mut translations = TranslationSet::new();
        translations.insert(SOURCE_LANGUAGE.to_string(), text.clone());

        for (code, name) in TARGET_LANGUAGES {
            if code == SOURCE_LANGUAGE {
                continue;
            }

            info!("Translating to {} ({})", name, code);
            match self.translate(&text, code).await {
                Ok(translated) => {
                    translations.insert(code.to_string(), translated);
                }
                Err(e) => {
                    warn!("Translation failed for {}: {}", code, e);
                }
            }
        }

        translations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::mock;
    use std::io::Write;

    mock! {
        Provider {}

        #[async_trait]
        impl TranslateProvider for Provider {
            async fn translate(&self, text: &str, target: &str) -> Result<String>;
            fn name(&self) -> &'static str;
        }
    }

    fn echo_provider() -> MockProvider {
        let mut provider = MockProvider::new();
        provider
            .expect_translate()
            .returning(|text, target| Ok(format!("{}:{}", target, text)));
        provider.expect_name().return_const("stub");
        provider
    }

    fn failing_provider() -> MockProvider {
        let mut provider = MockProvider::new();
        provider
            .expect_translate()
            .returning(|_, _| Err(GlossaError::Translation("provider down".to_string())));
        provider.expect_name().return_const("stub");
        provider
    }

    #[test]
    fn test_provider_choice_requires_both_credentials() {
        let mut config = TranslatorConfig::default();
        assert_eq!(ProviderChoice::from_config(&config), ProviderChoice::Free);

        config.project_id = Some("my-project".to_string());
        assert_eq!(ProviderChoice::from_config(&config), ProviderChoice::Free);

        let mut token_file = tempfile::NamedTempFile::new().expect("temp file");
        token_file.write_all(b"token").expect("write token");
        config.credentials_path = Some(token_file.path().to_path_buf());
        assert_eq!(ProviderChoice::from_config(&config), ProviderChoice::Cloud);

        config.credentials_path = Some("/nonexistent/credentials".into());
        assert_eq!(ProviderChoice::from_config(&config), ProviderChoice::Free);
    }

    #[tokio::test]
    async fn test_falls_back_when_primary_fails() {
        let translator = Translator::with_providers(
            Some(Box::new(failing_provider())),
            Box::new(echo_provider()),
            3,
            1,
        );

        let translated = translator.translate("hello", "fr").await.expect("fallback succeeds");
        assert_eq!(translated, "fr:hello");
    }

    #[tokio::test]
    async fn test_retries_bounded_then_error() {
        let mut fallback = MockProvider::new();
        fallback
            .expect_translate()
            .times(3)
            .returning(|_, _| Err(GlossaError::Translation("rate limited".to_string())));
        fallback.expect_name().return_const("stub");

        let translator = Translator::with_providers(None, Box::new(fallback), 3, 1);
        let result = translator.translate("hello", "ja").await;
        assert!(matches!(result, Err(GlossaError::Translation(_))));
    }

    #[tokio::test]
    async fn test_batch_includes_source_identity() {
        let translator = Translator::with_providers(None, Box::new(echo_provider()), 1, 1);
        let set = translator.translate_all_languages("Add two numbers.").await;

        assert_eq!(set.get(SOURCE_LANGUAGE).map(String::as_str), Some("Add two numbers."));
        assert_eq!(set.len(), TARGET_LANGUAGES.len());
        assert_eq!(set.get("ja").map(String::as_str), Some("ja:Add two numbers."));
    }

    #[tokio::test]
    async fn test_batch_omits_failed_languages() {
        let mut fallback = MockProvider::new();
        fallback.expect_translate().returning(|text, target| {
            if target == "ru" {
                Err(GlossaError::Translation("quota".to_string()))
            } else {
                Ok(format!("{}:{}", target, text))
            }
        });
        fallback.expect_name().return_const("stub");

        let translator = Translator::with_providers(None, Box::new(fallback), 1, 1);
        let set = translator.translate_all_languages("hello").await;

        assert!(!set.contains_key("ru"));
        assert_eq!(set.len(), TARGET_LANGUAGES.len() - 1);
        assert!(set.contains_key(SOURCE_LANGUAGE));
    }

    #[tokio::test]
    async fn test_batch_is_deterministic_with_deterministic_provider() {
        let translator = Translator::with_providers(None, Box::new(echo_provider()), 1, 1);
        let first = translator.translate_all_languages("Add two numbers.").await;
        let second = translator.translate_all_languages("Add two numbers.").await;
        assert_eq!(first, second);
    }
}
