use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use indicatif::ProgressBar;
use tokio::fs;
use tracing::{info, warn};

use crate::analyze::{self, AnalysisSummary};
use crate::config::Config;
use crate::error::Result;
use crate::llm::{self, CompletionClient, ModelResponse, OllamaClient};
use crate::manifest::{Manifest, Prompt};
use crate::parse::{self, file_extension, ParsedResult};
use crate::translate::{TranslationSet, Translator};

pub const TRANSLATED_PROMPTS_FILE: &str = "translated_prompts.json";
pub const LLM_OUTPUT_FILE: &str = "llm_output.json";
pub const LLM_PARSED_FILE: &str = "llm_parsed.json";
pub const CODE_DIR: &str = "code";

/// Stages of one prompt's pipeline, in order. Each stage completes for all
/// languages and persists its artifact before the next begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Translating,
    Querying,
    Parsing,
    Summarizing,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Translating => "translating",
            Stage::Querying => "querying",
            Stage::Parsing => "parsing",
            Stage::Summarizing => "summarizing",
        };
        write!(f, "{}", name)
    }
}

/// Result of one prompt's pipeline run. Failures carry the stage so batch
/// reports can say where a prompt stopped.
#[derive(Debug)]
pub enum PromptOutcome {
    Success { artifacts: Vec<PathBuf> },
    Failed { stage: Stage, cause: String },
}

impl PromptOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PromptOutcome::Success { .. })
    }
}

/// Sequential pipeline: translate, query, parse, summarize. One language at
/// a time, one prompt at a time; both the free translation endpoint and the
/// local model server are rate sensitive.
pub struct Pipeline {
    config: Config,
    translator: Translator,
    llm: Box<dyn CompletionClient>,
}

impl Pipeline {
    pub fn from_config(config: Config) -> Self {
        let translator = Translator::from_config(&config.translator);
        let llm: Box<dyn CompletionClient> = Box::new(OllamaClient::new(config.llm.clone()));
        Self::with_components(config, translator, llm)
    }

    /// Assemble from explicit components. Tests inject stubs here.
    pub fn with_components(
        config: Config,
        translator: Translator,
        llm: Box<dyn CompletionClient>,
    ) -> Self {
        Self {
            config,
            translator,
            llm,
        }
    }

    /// Check that the model backend is reachable. Advisory only: a dead
    /// server degrades to per-language nulls rather than aborting a run.
    pub async fn preflight(&self) -> Result<()> {
        self.llm.check_availability().await
    }

    /// Translate the prompt into every target language and persist the set.
    pub async fn stage_translate(&self, text: &str, dir: &Path) -> Result<TranslationSet> {
        fs::create_dir_all(dir).await?;
        let translations = self.translator.translate_all_languages(text).await;
        write_json(&dir.join(TRANSLATED_PROMPTS_FILE), &translations).await?;
        Ok(translations)
    }

    /// Query the model for each translated prompt and persist the raw
    /// responses (null for failed languages).
    pub async fn stage_query(&self, dir: &Path) -> Result<ModelResponse> {
        let translations: TranslationSet = read_json(&dir.join(TRANSLATED_PROMPTS_FILE)).await?;
        let outputs = llm::query_all(
            self.llm.as_ref(),
            &translations,
            Duration::from_millis(self.config.llm.pace_ms),
        )
        .await;
        write_json(&dir.join(LLM_OUTPUT_FILE), &outputs).await?;
        Ok(outputs)
    }

    /// Parse each response with the syntax-aware parser, persist the
    /// structured results and the extracted code files.
    pub async fn stage_parse(&self, dir: &Path) -> Result<BTreeMap<String, ParsedResult>> {
        let outputs: ModelResponse = read_json(&dir.join(LLM_OUTPUT_FILE)).await?;
        let parsed = parse::parse_all(&outputs);
        write_json(&dir.join(LLM_PARSED_FILE), &parsed).await?;
        self.write_code_files(&parsed, dir).await?;
        Ok(parsed)
    }

    /// Aggregate detections, write the report and render the charts.
    pub async fn stage_summarize(&self, dir: &Path) -> Result<(AnalysisSummary, Vec<PathBuf>)> {
        let parsed: BTreeMap<String, ParsedResult> = read_json(&dir.join(LLM_PARSED_FILE)).await?;
        let summary = analyze::summarize(&parsed);
        analyze::write_report(&summary, dir)?;
        let charts = analyze::render_charts(&summary, dir)?;
        Ok((summary, charts))
    }

    /// Run the whole pipeline for one prompt, writing into
    /// `<data_root>/<prompt id>/`. Every stage persists its artifact as soon
    /// as it completes, so a later failure loses no earlier work.
    pub async fn run_prompt(&self, prompt: &Prompt, data_root: &Path) -> PromptOutcome {
        let dir = data_root.join(&prompt.id);
        let mut artifacts = Vec::new();

        info!("[{}] translating prompt", prompt.id);
        if let Err(e) = self.stage_translate(&prompt.text, &dir).await {
            return PromptOutcome::Failed {
                stage: Stage::Translating,
                cause: e.to_string(),
            };
        }
        artifacts.push(dir.join(TRANSLATED_PROMPTS_FILE));

        info!("[{}] querying model", prompt.id);
        if let Err(e) = self.stage_query(&dir).await {
            return PromptOutcome::Failed {
                stage: Stage::Querying,
                cause: e.to_string(),
            };
        }
        artifacts.push(dir.join(LLM_OUTPUT_FILE));

        info!("[{}] parsing responses", prompt.id);
        if let Err(e) = self.stage_parse(&dir).await {
            return PromptOutcome::Failed {
                stage: Stage::Parsing,
                cause: e.to_string(),
            };
        }
        artifacts.push(dir.join(LLM_PARSED_FILE));

        info!("[{}] summarizing detections", prompt.id);
        match self.stage_summarize(&dir).await {
            Ok((_, charts)) => {
                artifacts.push(dir.join(analyze::RESULTS_FILE));
                artifacts.push(dir.join(analyze::SUMMARY_FILE));
                artifacts.extend(charts);
            }
            Err(e) => {
                return PromptOutcome::Failed {
                    stage: Stage::Summarizing,
                    cause: e.to_string(),
                };
            }
        }

        PromptOutcome::Success { artifacts }
    }

    /// Run every prompt in the manifest, each into its own folder. A failed
    /// prompt is logged with its stage and the batch continues.
    pub async fn run_batch(
        &self,
        manifest: &Manifest,
        data_root: &Path,
    ) -> Result<Vec<(String, PromptOutcome)>> {
        fs::create_dir_all(data_root).await?;

        let total = manifest.prompts.len();
        let progress = ProgressBar::new(total as u64);
        let mut reports = Vec::new();

        for (index, prompt) in manifest.prompts.iter().enumerate() {
            info!("Processing prompt {}/{}: {}", index + 1, total, prompt.id);
            progress.set_message(prompt.id.clone());

            let outcome = self.run_prompt(prompt, data_root).await;
            match &outcome {
                PromptOutcome::Success { artifacts } => {
                    info!("[{}] completed, {} artifacts", prompt.id, artifacts.len());
                }
                PromptOutcome::Failed { stage, cause } => {
                    warn!("[{}] failed during {}: {}", prompt.id, stage, cause);
                }
            }

            reports.push((prompt.id.clone(), outcome));
            progress.inc(1);
        }

        progress.finish_and_clear();
        Ok(reports)
    }

    /// Persist the first detected code block per language under `code/`.
    async fn write_code_files(
        &self,
        parsed: &BTreeMap<String, ParsedResult>,
        dir: &Path,
    ) -> Result<()> {
        let code_dir = dir.join(CODE_DIR);
        fs::create_dir_all(&code_dir).await?;

        for (language, result) in parsed {
            let Some(block) = result.code_blocks.iter().find(|b| b.language.is_some()) else {
                continue;
            };
            let detected = block.language.as_deref().unwrap_or_default();
            let path = code_dir.join(format!("{}_code.{}", language, file_extension(detected)));
            fs::write(&path, &block.source_text).await?;
        }

        Ok(())
    }
}

async fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(value)?;
    fs::write(path, content).await?;
    Ok(())
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&content)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GlossaError;
    use crate::languages::TARGET_LANGUAGES;
    use crate::translate::TranslateProvider;
    use async_trait::async_trait;
    use mockall::mock;

    mock! {
        Provider {}

        #[async_trait]
        impl TranslateProvider for Provider {
            async fn translate(&self, text: &str, target: &str) -> Result<String>;
            fn name(&self) -> &'static str;
        }
    }

    mock! {
        Completion {}

        #[async_trait]
        impl CompletionClient for Completion {
            async fn complete(&self, prompt: &str) -> Result<String>;
        }
    }

    fn echo_translator() -> Translator {
        let mut provider = MockProvider::new();
        provider
            .expect_translate()
            .returning(|text, target| Ok(format!("{}:{}", target, text)));
        provider.expect_name().return_const("stub");
        Translator::with_providers(None, Box::new(provider), 1, 1)
    }

    fn python_completion() -> Box<dyn CompletionClient> {
        let mut client = MockCompletion::new();
        client
            .expect_complete()
            .returning(|_| Ok("```python\ndef add(a, b): return a + b\n```".to_string()));
        Box::new(client)
    }

    fn test_config() -> Config {
        let mut config = Config::default();
        config.llm.pace_ms = 0;
        config
    }

    #[tokio::test]
    async fn test_run_prompt_writes_all_artifacts() {
        let pipeline = Pipeline::with_components(test_config(), echo_translator(), python_completion());
        let root = tempfile::tempdir().expect("temp dir");

        let prompt = Prompt {
            id: "p1".to_string(),
            text: "Write a function that adds two numbers.".to_string(),
        };
        let outcome = pipeline.run_prompt(&prompt, root.path()).await;
        assert!(outcome.is_success(), "outcome: {:?}", outcome);

        let dir = root.path().join("p1");
        for file in [
            TRANSLATED_PROMPTS_FILE,
            LLM_OUTPUT_FILE,
            LLM_PARSED_FILE,
            analyze::RESULTS_FILE,
            analyze::SUMMARY_FILE,
            analyze::BAR_CHART_FILE,
            analyze::PIE_CHART_FILE,
        ] {
            assert!(dir.join(file).is_file(), "{} should exist", file);
        }

        let parsed: BTreeMap<String, ParsedResult> =
            serde_json::from_str(&std::fs::read_to_string(dir.join(LLM_PARSED_FILE)).unwrap())
                .unwrap();
        assert_eq!(parsed.len(), TARGET_LANGUAGES.len());
        for (language, result) in &parsed {
            assert_eq!(
                result.detected_language.as_deref(),
                Some("python"),
                "language {}",
                language
            );
            assert_eq!(result.code_blocks[0].function_count, 1);
        }

        let summary: AnalysisSummary =
            serde_json::from_str(&std::fs::read_to_string(dir.join(analyze::RESULTS_FILE)).unwrap())
                .unwrap();
        assert_eq!(summary.counts.get("python"), Some(&TARGET_LANGUAGES.len()));
    }

    #[tokio::test]
    async fn test_translation_artifact_survives_failed_queries() {
        let mut client = MockCompletion::new();
        client
            .expect_complete()
            .returning(|_| Err(GlossaError::ModelQuery("connection refused".to_string())));

        let pipeline =
            Pipeline::with_components(test_config(), echo_translator(), Box::new(client));
        let root = tempfile::tempdir().expect("temp dir");

        let prompt = Prompt {
            id: "p1".to_string(),
            text: "Reverse a string.".to_string(),
        };
        let outcome = pipeline.run_prompt(&prompt, root.path()).await;
        assert!(outcome.is_success());

        let dir = root.path().join("p1");
        assert!(dir.join(TRANSLATED_PROMPTS_FILE).is_file());

        let outputs: ModelResponse =
            serde_json::from_str(&std::fs::read_to_string(dir.join(LLM_OUTPUT_FILE)).unwrap())
                .unwrap();
        assert!(outputs.values().all(Option::is_none));

        // All-null detections collapse into a single unknown bucket
        let summary: AnalysisSummary =
            serde_json::from_str(&std::fs::read_to_string(dir.join(analyze::RESULTS_FILE)).unwrap())
                .unwrap();
        assert_eq!(summary.counts.len(), 1);
        assert_eq!(
            summary.counts.get(crate::analyze::UNKNOWN_BUCKET),
            Some(&TARGET_LANGUAGES.len())
        );
    }

    #[tokio::test]
    async fn test_batch_isolates_prompt_failures() {
        let pipeline = Pipeline::with_components(test_config(), echo_translator(), python_completion());
        let root = tempfile::tempdir().expect("temp dir");

        // A plain file where prompt 2's folder should go makes its first
        // stage fail without touching the other prompts.
        std::fs::write(root.path().join("p2"), b"in the way").unwrap();

        let manifest = Manifest {
            prompts: vec![
                Prompt { id: "p1".to_string(), text: "one".to_string() },
                Prompt { id: "p2".to_string(), text: "two".to_string() },
                Prompt { id: "p3".to_string(), text: "three".to_string() },
            ],
        };

        let reports = pipeline.run_batch(&manifest, root.path()).await.expect("batch runs");
        assert_eq!(reports.len(), 3);
        assert!(reports[0].1.is_success());
        assert!(matches!(
            reports[1].1,
            PromptOutcome::Failed { stage: Stage::Translating, .. }
        ));
        assert!(reports[2].1.is_success());

        assert!(root.path().join("p1").join(LLM_PARSED_FILE).is_file());
        assert!(root.path().join("p3").join(LLM_PARSED_FILE).is_file());
    }

    #[tokio::test]
    async fn test_code_files_written_for_detected_blocks() {
        let pipeline = Pipeline::with_components(test_config(), echo_translator(), python_completion());
        let root = tempfile::tempdir().expect("temp dir");

        let prompt = Prompt { id: "p1".to_string(), text: "add".to_string() };
        let outcome = pipeline.run_prompt(&prompt, root.path()).await;
        assert!(outcome.is_success());

        let code_dir = root.path().join("p1").join(CODE_DIR);
        assert!(code_dir.join("en_code.py").is_file());
        let code = std::fs::read_to_string(code_dir.join("en_code.py")).unwrap();
        assert!(code.contains("def add"));
    }
}
