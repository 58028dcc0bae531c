//! Web chat server command.

use crate::assistant::Assistant;
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::server::{self, AppState};
use anyhow::Result;
use std::sync::Arc;

/// Index the documents and serve the chat widget.
pub async fn run_serve(host: Option<String>, port: Option<u16>, settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Chat, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let spinner = Output::spinner("Indexing documents...");
    let assistant = Assistant::from_settings(&settings).await;
    spinner.finish_and_clear();
    let assistant = assistant?;

    if let Some(report) = assistant.index_report() {
        Output::index_report(report);
    }

    let state = Arc::new(AppState::new(assistant, settings.ui.clone()));

    let host = host.unwrap_or_else(|| settings.server.host.clone());
    let port = port.unwrap_or(settings.server.port);
    let addr = format!("{}:{}", host, port);

    Output::header(&settings.ui.title);
    println!();
    Output::success(&format!("Chat widget at http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Widget", "GET    /");
    Output::kv("Chat (SSE)", "POST   /api/chat");
    Output::kv("UI settings", "GET    /api/ui");
    Output::kv("Clear session", "DELETE /api/sessions/{id}");
    Output::kv("Health", "GET    /health");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    server::serve(&addr, state).await?;

    Ok(())
}
