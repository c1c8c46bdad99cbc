use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::error::{Result, GlossaError};

// Default values for translator configuration
fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_translator_timeout_secs() -> u64 {
    30
}

// Default values for LLM configuration
fn default_endpoint() -> String {
    "http://localhost:11434".to_string()
}

fn default_model() -> String {
    "qwen3:30b-a3b".to_string()
}

fn default_system_prompt() -> String {
    "You are a code generator. Only output valid code inside a single fenced \
     code block. Do not include explanations or text outside the code."
        .to_string()
}

fn default_llm_timeout_secs() -> u64 {
    300
}

fn default_pace_ms() -> u64 {
    1000
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub translator: TranslatorConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslatorConfig {
    /// Cloud project identifier. Cloud translation is used only when both
    /// this and `credentials_path` are set and the file is readable.
    #[serde(default)]
    pub project_id: Option<String>,
    /// Path to a file containing a bearer access token for the cloud API
    #[serde(default)]
    pub credentials_path: Option<PathBuf>,
    /// Maximum retries for the free provider when it is rate limited
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Delay between free-provider retries
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// HTTP timeout for translation requests
    #[serde(default = "default_translator_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Ollama endpoint URL
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Model to send completion requests to
    #[serde(default = "default_model")]
    pub model: String,
    /// System prompt steering the model toward fenced code output
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    /// HTTP timeout for a single completion request
    #[serde(default = "default_llm_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Pause between per-language queries, the local server is easy to flood
    #[serde(default = "default_pace_ms")]
    pub pace_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Root directory for per-prompt output folders and the runtime log
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            project_id: None,
            credentials_path: None,
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            request_timeout_secs: default_translator_timeout_secs(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            system_prompt: default_system_prompt(),
            request_timeout_secs: default_llm_timeout_secs(),
            pace_ms: default_pace_ms(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| GlossaError::Config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| GlossaError::Config(format!("Failed to parse config file: {}", e)))
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| GlossaError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| GlossaError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.llm.endpoint, "http://localhost:11434");
        assert_eq!(config.translator.max_retries, 3);
        assert_eq!(config.translator.retry_delay_ms, 1000);
        assert_eq!(config.output.data_dir, PathBuf::from("data"));
        assert!(config.translator.project_id.is_none());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let parsed: Config = toml::from_str(
            r#"
            [llm]
            model = "llama3.2:3b"
            "#,
        )
        .expect("partial config should parse");
        assert_eq!(parsed.llm.model, "llama3.2:3b");
        assert_eq!(parsed.llm.endpoint, "http://localhost:11434");
        assert_eq!(parsed.translator.max_retries, 3);
    }
}
