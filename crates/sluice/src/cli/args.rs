use clap::{Parser, Subcommand};

/// Streaming chat client with tool calling for OpenAI-compatible endpoints.
#[derive(Parser)]
#[command(version, about, long_about = None, author)]
pub struct Cli {
    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Send one message, or chat interactively when no message is given
    Chat {
        /// Message to send. Reads lines from stdin when omitted.
        message: Option<String>,
        /// Print each stream event as one JSON object per line
        #[arg(long)]
        json: bool,
        /// Model to use (overrides settings and SLUICE_MODEL)
        #[arg(short, long)]
        model: Option<String>,
    },
    /// Inspect or create the settings file
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show the effective settings with secrets masked
    Show,
    /// Write a settings file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}
