use clap::Parser;
use eyre::Result;

use sluice::cli::{Cli, Commands, ConfigCommands};
use sluice::commands::{
    Command,
    chat::ChatCommand,
    config::{ConfigAction, ConfigCommand},
};
use tracing::debug;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    // Level configured via RUST_LOG
    let log_path = sluice_core::utils::tracing::init_tracing()?;
    if let Some(path) = log_path {
        debug!(target: "sluice::cli", "Logging to {}", path.display());
    }

    let command: Box<dyn Command> = match cli.command {
        Commands::Chat {
            message,
            json,
            model,
        } => Box::new(ChatCommand {
            message,
            json,
            model,
        }),
        Commands::Config { action } => Box::new(ConfigCommand {
            action: match action {
                ConfigCommands::Show => ConfigAction::Show,
                ConfigCommands::Init { force } => ConfigAction::Init { force },
            },
        }),
    };

    command.execute().await
}
