//! Ask command implementation.

use super::chat::print_updates;
use crate::assistant::Assistant;
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use anyhow::Result;

/// Run the ask command.
pub async fn run_ask(question: &str, session: Option<String>, settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Chat, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let spinner = Output::spinner("Indexing documents...");
    let assistant = Assistant::from_settings(&settings).await;
    spinner.finish_and_clear();
    let assistant = assistant?;

    let completed = print_updates(assistant.chat(session.as_deref(), question)).await?;
    if !completed {
        anyhow::bail!("No answer was produced");
    }

    Ok(())
}
