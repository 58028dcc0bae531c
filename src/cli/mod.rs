//! CLI module for Docent.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};

/// Docent - answers questions from your documents
///
/// Indexes a folder of documents and serves a chat assistant that consults
/// them through a tool-calling agent, in the browser or the terminal.
#[derive(Parser, Debug)]
#[command(name = "docent")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Index the documents and start the web chat widget
    Serve {
        /// Host to bind to (defaults to server.host)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (defaults to server.port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Start an interactive chat session in the terminal
    Chat,

    /// Ask a single question
    Ask {
        /// The question to ask
        question: String,

        /// Session to continue
        #[arg(short, long)]
        session: Option<String>,
    },

    /// Build or refresh the document index
    Index {
        /// Drop the existing index and embed everything again
        #[arg(long)]
        rebuild: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Write a configuration file with the default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        let cli = Cli::parse_from(["docent", "-vv", "ask", "What is RAG?", "--session", "s1"]);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Ask { question, session } => {
                assert_eq!(question, "What is RAG?");
                assert_eq!(session.as_deref(), Some("s1"));
            }
            other => panic!("unexpected command {:?}", other),
        }

        let cli = Cli::parse_from(["docent", "serve", "--port", "8080"]);
        assert!(matches!(
            cli.command,
            Commands::Serve {
                host: None,
                port: Some(8080)
            }
        ));

        let cli = Cli::parse_from(["docent", "--config", "c.toml", "index", "--rebuild"]);
        assert_eq!(cli.config.as_deref(), Some("c.toml"));
        assert!(matches!(cli.command, Commands::Index { rebuild: true }));
    }
}
