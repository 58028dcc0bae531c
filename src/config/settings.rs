//! Configuration settings for Docent.

use crate::error::{DocentError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub llm: LlmSettings,
    pub openai: ProviderSettings,
    pub groq: ProviderSettings,
    pub embedding: EmbeddingSettings,
    pub index: IndexSettings,
    pub rag: RagSettings,
    pub session: SessionSettings,
    pub server: ServerSettings,
    pub ui: UiSettings,
    pub prompts: PromptSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            general: GeneralSettings::default(),
            llm: LlmSettings::default(),
            openai: ProviderSettings::openai(),
            groq: ProviderSettings::groq(),
            embedding: EmbeddingSettings::default(),
            index: IndexSettings::default(),
            rag: RagSettings::default(),
            session: SessionSettings::default(),
            server: ServerSettings::default(),
            ui: UiSettings::default(),
            prompts: PromptSettings::default(),
        }
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for storing application data.
    pub data_dir: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.docent".to_string(),
        }
    }
}

/// Which hosted chat model backs the agent.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[default]
    OpenAI,
    Groq,
}

impl std::str::FromStr for LlmProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(LlmProvider::OpenAI),
            "groq" => Ok(LlmProvider::Groq),
            _ => Err(format!("Unknown LLM provider: {}", s)),
        }
    }
}

impl std::fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LlmProvider::OpenAI => write!(f, "openai"),
            LlmProvider::Groq => write!(f, "groq"),
        }
    }
}

/// Tool selection policy for the first model call of a turn.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoiceSetting {
    /// The model must call a tool before answering.
    #[default]
    Required,
    /// The model decides.
    Auto,
}

/// Chat model settings shared by both providers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub provider: LlmProvider,
    pub temperature: f32,
    pub max_tokens: u32,
    pub tool_choice: ToolChoiceSetting,
    /// Upper bound on model calls per user turn.
    pub max_iterations: usize,
    pub request_timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: LlmProvider::OpenAI,
            temperature: 0.5,
            max_tokens: 3000,
            tool_choice: ToolChoiceSetting::Required,
            max_iterations: 15,
            request_timeout_secs: 300,
        }
    }
}

/// Credentials and model for one OpenAI-compatible provider.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ProviderSettings {
    pub api_key: Option<String>,
    pub model: String,
    /// Base URL override. None uses the async-openai default.
    pub api_base: Option<String>,
}

impl ProviderSettings {
    fn openai() -> Self {
        Self {
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            api_base: None,
        }
    }

    fn groq() -> Self {
        Self {
            api_key: None,
            model: "llama-3.1-70b-versatile".to_string(),
            api_base: Some("https://api.groq.com/openai/v1".to_string()),
        }
    }
}

/// Embedding generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub model: String,
    pub dimensions: u32,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            model: "text-embedding-3-small".to_string(),
            dimensions: 1536,
        }
    }
}

/// Document index settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSettings {
    /// Folder holding the documents to answer from.
    pub input_dir: String,
    /// Descend into subdirectories.
    pub recursive: bool,
    /// File extensions to read (without the dot).
    pub extensions: Vec<String>,
    /// Chunk size in tokens.
    pub chunk_size: usize,
    /// Overlap between consecutive chunks in tokens.
    pub chunk_overlap: usize,
    /// Persist embeddings so unchanged files are not embedded again.
    pub cache: bool,
    pub cache_path: String,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            input_dir: "./data".to_string(),
            recursive: true,
            extensions: ["txt", "md", "markdown", "csv", "json", "html", "htm", "rst", "log"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            chunk_size: 1024,
            chunk_overlap: 20,
            cache: true,
            cache_path: "~/.docent/index.db".to_string(),
        }
    }
}

/// Retrieval and answer settings for the RAG engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagSettings {
    /// Model used to answer from retrieved context. Defaults to `openai.model`.
    pub model: Option<String>,
    pub similarity_top_k: usize,
    pub min_score: f32,
    pub temperature: f32,
}

impl Default for RagSettings {
    fn default() -> Self {
        Self {
            model: None,
            similarity_top_k: 2,
            min_score: 0.0,
            temperature: 0.1,
        }
    }
}

/// Conversation memory settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Maximum messages kept per session. 0 keeps everything.
    pub max_messages: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self { max_messages: 50 }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 7860,
        }
    }
}

/// Chat widget text and assets.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiSettings {
    pub title: String,
    pub chatbot_label: String,
    pub placeholder: String,
    pub submit_label: String,
    pub stop_label: String,
    pub examples: Vec<String>,
    pub avatar_path: Option<String>,
}

impl Default for UiSettings {
    fn default() -> Self {
        Self {
            title: "AI 小助理".to_string(),
            chatbot_label: "問答記錄".to_string(),
            placeholder: "輸入任何想問的問題".to_string(),
            submit_label: "發問 ▶️".to_string(),
            stop_label: "停止 ⏸".to_string(),
            examples: vec![
                "黑神話悟空遊戲中的六根分別有哪些場景?".to_string(),
                "蘋果這次發表會有哪些新玩意兒?".to_string(),
                "RAG的技術細節有哪些?".to_string(),
            ],
            avatar_path: None,
        }
    }
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PromptSettings {
    /// Directory for custom prompts (overrides defaults).
    pub custom_dir: Option<String>,
    /// Custom variables available in all prompts as {{variable_name}}.
    pub variables: std::collections::HashMap<String, String>,
}

/// Resolved connection details for a chat provider.
#[derive(Debug, Clone)]
pub struct ResolvedProvider {
    pub provider: LlmProvider,
    pub api_key: String,
    pub model: String,
    pub api_base: Option<String>,
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            Self::from_toml(&content)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse settings from TOML, filling provider defaults the file leaves out.
    pub fn from_toml(content: &str) -> Result<Self> {
        let mut settings: Settings = toml::from_str(content)?;
        if settings.openai.model.is_empty() {
            settings.openai.model = ProviderSettings::openai().model;
        }
        if settings.groq.model.is_empty() {
            settings.groq.model = ProviderSettings::groq().model;
        }
        if settings.groq.api_base.is_none() {
            settings.groq.api_base = ProviderSettings::groq().api_base;
        }
        Ok(settings)
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| DocentError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("docent")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded data directory path.
    pub fn data_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.data_dir)
    }

    /// Get the expanded document folder path.
    pub fn input_dir(&self) -> PathBuf {
        Self::expand_path(&self.index.input_dir)
    }

    /// Get the expanded index cache path.
    pub fn cache_path(&self) -> PathBuf {
        Self::expand_path(&self.index.cache_path)
    }

    /// OpenAI API key from the config file, falling back to `OPENAI_API_KEY`.
    pub fn openai_api_key(&self) -> Result<String> {
        resolve_key(self.openai.api_key.as_deref(), "openai", "OPENAI_API_KEY")
    }

    /// Groq API key from the config file, falling back to `GROQ_API_KEY`.
    pub fn groq_api_key(&self) -> Result<String> {
        resolve_key(self.groq.api_key.as_deref(), "groq", "GROQ_API_KEY")
    }

    /// Connection details for the configured agent provider.
    pub fn chat_provider(&self) -> Result<ResolvedProvider> {
        let (settings, api_key) = match self.llm.provider {
            LlmProvider::OpenAI => (&self.openai, self.openai_api_key()?),
            LlmProvider::Groq => (&self.groq, self.groq_api_key()?),
        };

        Ok(ResolvedProvider {
            provider: self.llm.provider,
            api_key,
            model: settings.model.clone(),
            api_base: settings.api_base.clone(),
        })
    }

    /// Model used by the RAG engine.
    pub fn rag_model(&self) -> String {
        self.rag
            .model
            .clone()
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| self.openai.model.clone())
    }

    /// Reject settings that would fail later in the pipeline.
    pub fn validate(&self) -> Result<()> {
        if self.index.chunk_size == 0 {
            return Err(DocentError::Config("index.chunk_size must be greater than 0".to_string()));
        }
        if self.index.chunk_overlap >= self.index.chunk_size {
            return Err(DocentError::Config(format!(
                "index.chunk_overlap ({}) must be smaller than index.chunk_size ({})",
                self.index.chunk_overlap, self.index.chunk_size
            )));
        }
        if self.rag.similarity_top_k == 0 {
            return Err(DocentError::Config(
                "rag.similarity_top_k must be greater than 0".to_string(),
            ));
        }
        if self.session.max_messages == 1 {
            return Err(DocentError::Config(
                "session.max_messages must be 0 (unbounded) or at least 2".to_string(),
            ));
        }
        if self.llm.max_iterations == 0 {
            return Err(DocentError::Config(
                "llm.max_iterations must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

fn resolve_key(configured: Option<&str>, section: &str, env_var: &str) -> Result<String> {
    if let Some(key) = configured.filter(|k| !k.trim().is_empty()) {
        return Ok(key.trim().to_string());
    }

    match std::env::var(env_var) {
        Ok(key) if !key.trim().is_empty() => Ok(key.trim().to_string()),
        _ => Err(DocentError::Config(format!(
            "No API key for {}. Set {}.api_key in the config file or export {}",
            section, section, env_var
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.index.chunk_size, 1024);
        assert_eq!(settings.index.chunk_overlap, 20);
        assert_eq!(settings.rag.similarity_top_k, 2);
        assert_eq!(settings.llm.max_tokens, 3000);
        assert_eq!(settings.openai.model, "gpt-4o-mini");
        assert_eq!(
            settings.groq.api_base.as_deref(),
            Some("https://api.groq.com/openai/v1")
        );
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let settings = Settings::from_toml(
            r#"
            [openai]
            api_key = "sk-test"

            [llm]
            provider = "groq"
            tool_choice = "auto"

            [index]
            chunk_size = 256
            "#,
        )
        .unwrap();

        assert_eq!(settings.openai.api_key.as_deref(), Some("sk-test"));
        assert_eq!(settings.openai.model, "gpt-4o-mini");
        assert_eq!(settings.llm.provider, LlmProvider::Groq);
        assert_eq!(settings.llm.tool_choice, ToolChoiceSetting::Auto);
        assert_eq!(settings.index.chunk_size, 256);
        assert_eq!(settings.index.chunk_overlap, 20);
        assert_eq!(settings.groq.model, "llama-3.1-70b-versatile");
        assert_eq!(settings.server.port, 7860);
    }

    #[test]
    fn test_configured_key_wins() {
        let mut settings = Settings::default();
        settings.openai.api_key = Some("  sk-from-file ".to_string());
        assert_eq!(settings.openai_api_key().unwrap(), "sk-from-file");
    }

    #[test]
    fn test_rag_model_falls_back_to_openai_model() {
        let mut settings = Settings::default();
        assert_eq!(settings.rag_model(), "gpt-4o-mini");
        settings.rag.model = Some("gpt-4o".to_string());
        assert_eq!(settings.rag_model(), "gpt-4o");
    }

    #[test]
    fn test_validate_rejects_large_overlap() {
        let mut settings = Settings::default();
        settings.index.chunk_overlap = settings.index.chunk_size;
        assert!(matches!(settings.validate(), Err(DocentError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_single_message_history() {
        let mut settings = Settings::default();
        settings.session.max_messages = 1;
        assert!(matches!(settings.validate(), Err(DocentError::Config(_))));

        settings.session.max_messages = 0;
        assert!(settings.validate().is_ok());
        settings.session.max_messages = 2;
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_key_falls_back_to_environment() {
        std::env::set_var("DOCENT_TEST_FALLBACK_KEY", " sk-from-env ");
        assert_eq!(
            resolve_key(None, "openai", "DOCENT_TEST_FALLBACK_KEY").unwrap(),
            "sk-from-env"
        );
        assert_eq!(
            resolve_key(Some("  "), "openai", "DOCENT_TEST_FALLBACK_KEY").unwrap(),
            "sk-from-env"
        );
    }

    #[test]
    fn test_missing_key_is_an_error() {
        let err = resolve_key(None, "groq", "DOCENT_TEST_UNSET_KEY").unwrap_err();
        assert!(matches!(err, DocentError::Config(_)));
        assert!(err.to_string().contains("DOCENT_TEST_UNSET_KEY"));
    }

    #[test]
    fn test_groq_chat_provider() {
        let mut settings = Settings::default();
        settings.llm.provider = LlmProvider::Groq;
        settings.groq.api_key = Some("gsk-test".to_string());

        let provider = settings.chat_provider().unwrap();
        assert_eq!(provider.provider, LlmProvider::Groq);
        assert_eq!(provider.api_key, "gsk-test");
        assert_eq!(provider.model, "llama-3.1-70b-versatile");
        assert_eq!(
            provider.api_base.as_deref(),
            Some("https://api.groq.com/openai/v1")
        );
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut settings = Settings::default();
        settings.ui.title = "Helper".to_string();
        settings.save_to(&path).unwrap();

        let loaded = Settings::load_from(Some(&path)).unwrap();
        assert_eq!(loaded.ui.title, "Helper");
        assert_eq!(loaded.groq.model, settings.groq.model);
    }

    #[test]
    fn test_provider_parse() {
        assert_eq!("Groq".parse::<LlmProvider>().unwrap(), LlmProvider::Groq);
        assert!("anthropic".parse::<LlmProvider>().is_err());
        assert_eq!(LlmProvider::OpenAI.to_string(), "openai");
    }
}
