//! Interactive terminal chat.

use crate::assistant::{Assistant, ChatUpdate};
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use anyhow::Result;
use console::style;
use futures::{Stream, StreamExt};
use indicatif::ProgressBar;
use std::io::{self, BufRead, Write};

/// Run the interactive chat command.
pub async fn run_chat(settings: Settings) -> Result<()> {
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

    let session_id = uuid::Uuid::new_v4().to_string();

    println!("\n{}", style(&settings.ui.title).bold().cyan());
    println!(
        "{}\n",
        style("Type your questions, or 'exit' to quit. Use 'clear' to reset conversation.").dim()
    );

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("{} ", style("You:").green().bold());
        stdout.flush()?;

        let mut input = String::new();
        if stdin.lock().read_line(&mut input)? == 0 {
            break;
        }

        let trimmed = input.trim();

        if trimmed.eq_ignore_ascii_case("exit") || trimmed.eq_ignore_ascii_case("quit") {
            Output::info("Goodbye!");
            break;
        }

        if trimmed.eq_ignore_ascii_case("clear") {
            assistant.sessions().clear(&session_id)?;
            Output::info("Conversation history cleared.");
            continue;
        }

        print!("\n{} ", style("Docent:").cyan().bold());
        stdout.flush()?;
        print_updates(assistant.chat(Some(&session_id), trimmed)).await?;
        println!();
    }

    Ok(())
}

/// Print a streamed answer as it grows. Returns whether it completed.
pub(crate) async fn print_updates(
    mut updates: impl Stream<Item = ChatUpdate> + Unpin,
) -> io::Result<bool> {
    let mut stdout = io::stdout();
    let mut shown = String::new();
    let mut thinking: Option<ProgressBar> = None;

    while let Some(update) = updates.next().await {
        if !matches!(update, ChatUpdate::Thinking(_)) {
            if let Some(spinner) = thinking.take() {
                spinner.finish_and_clear();
            }
        }

        match update {
            ChatUpdate::Greeting(text) => {
                println!("{}", text);
                return Ok(true);
            }
            ChatUpdate::Thinking(text) => {
                thinking = Some(Output::spinner(&text));
            }
            ChatUpdate::Partial(text) => {
                print_growth(&mut stdout, &shown, &text)?;
                shown = text;
            }
            ChatUpdate::Done(text) => {
                print_growth(&mut stdout, &shown, &text)?;
                println!();
                return Ok(true);
            }
            ChatUpdate::Error(message) => {
                println!();
                Output::error(&message);
                return Ok(false);
            }
        }
    }

    if let Some(spinner) = thinking {
        spinner.finish_and_clear();
    }
    Ok(false)
}

fn print_growth(stdout: &mut io::Stdout, shown: &str, text: &str) -> io::Result<()> {
    match text.strip_prefix(shown) {
        Some(rest) => write!(stdout, "{}", rest)?,
        None => write!(stdout, "\n{}", text)?,
    }
    stdout.flush()
}
