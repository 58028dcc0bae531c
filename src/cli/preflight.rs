//! Pre-flight checks before expensive operations.
//!
//! Validates that credentials and the document folder are available
//! before starting operations that would otherwise fail midway.

use crate::config::{LlmProvider, Settings};
use crate::error::{DocentError, Result};

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Chatting needs the agent provider key, the OpenAI key and documents.
    Chat,
    /// Indexing needs the OpenAI key (embeddings) and documents.
    Index,
}

/// Run pre-flight checks for the given operation.
///
/// Returns Ok(()) if all checks pass, or an error describing what's missing.
pub fn check(operation: Operation, settings: &Settings) -> Result<()> {
    settings.validate()?;
    check_api_key(settings, LlmProvider::OpenAI)?;

    if let Operation::Chat = operation {
        if settings.llm.provider != LlmProvider::OpenAI {
            check_api_key(settings, settings.llm.provider)?;
        }
    }

    check_input_dir(settings)
}

fn check_api_key(settings: &Settings, provider: LlmProvider) -> Result<()> {
    let (key, env_var) = match provider {
        LlmProvider::OpenAI => (settings.openai_api_key(), "OPENAI_API_KEY"),
        LlmProvider::Groq => (settings.groq_api_key(), "GROQ_API_KEY"),
    };

    key.map(|_| ()).map_err(|_| {
        DocentError::Config(format!(
            "No {} API key. Set {}.api_key in the config file or export {}='...'",
            provider, provider, env_var
        ))
    })
}

fn check_input_dir(settings: &Settings) -> Result<()> {
    let dir = settings.input_dir();
    if dir.is_dir() {
        Ok(())
    } else {
        Err(DocentError::Config(format!(
            "Document folder {} does not exist. Create it or set index.input_dir",
            dir.display()
        )))
    }
}
