//! Configuration module for Docent.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{AgentPrompts, ChatPrompts, Prompts, RagPrompts};
pub use settings::{
    EmbeddingSettings, GeneralSettings, IndexSettings, LlmProvider, LlmSettings,
    PromptSettings, ProviderSettings, RagSettings, ResolvedProvider, ServerSettings,
    SessionSettings, Settings, ToolChoiceSetting, UiSettings,
};
