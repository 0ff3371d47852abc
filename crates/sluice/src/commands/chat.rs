use async_trait::async_trait;
use eyre::Result;
use futures::StreamExt;
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::Command;
use crate::error::Error;
use sluice_core::app::{Message, Orchestrator, StreamEvent};
use sluice_core::config::Settings;

pub struct ChatCommand {
    pub message: Option<String>,
    pub json: bool,
    pub model: Option<String>,
}

#[async_trait]
impl Command for ChatCommand {
    async fn execute(&self) -> Result<()> {
        let orchestrator = self.build_orchestrator()?;

        let token = CancellationToken::new();
        let interrupt = token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!(target: "sluice::cli", "Interrupted; cancelling turn");
                interrupt.cancel();
            }
        });

        match &self.message {
            Some(message) => {
                self.run_turn(&orchestrator, vec![], message, &token).await?;
            }
            None => self.repl(&orchestrator, &token).await?,
        }
        Ok(())
    }
}

impl ChatCommand {
    fn build_orchestrator(&self) -> std::result::Result<Orchestrator, Error> {
        let mut settings = Settings::load()?;
        if let Some(model) = &self.model {
            settings.model.model.clone_from(model);
        }
        debug!(
            target: "sluice::cli",
            base_url = %settings.model.base_url,
            model = %settings.model.model,
            "Starting chat"
        );

        let client = settings.model.build_client()?;
        let registry = settings.build_registry()?;
        let validator = settings.build_validator(registry);
        Ok(Orchestrator::new(
            Arc::new(client),
            validator,
            settings.turn.clone(),
        ))
    }

    /// Read one message per line until EOF, `exit`, or Ctrl-C.
    async fn repl(
        &self,
        orchestrator: &Orchestrator,
        token: &CancellationToken,
    ) -> std::result::Result<(), Error> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut history = Vec::new();

        loop {
            {
                let mut stdout = std::io::stdout();
                write!(stdout, "> ")?;
                stdout.flush()?;
            }

            let line = tokio::select! {
                () = token.cancelled() => break,
                line = lines.next_line() => line?,
            };
            let Some(line) = line else {
                break;
            };
            let input = line.trim();
            if input.is_empty() {
                continue;
            }
            if matches!(input, "exit" | "quit") {
                break;
            }

            if let Some(reply) = self.run_turn(orchestrator, history.clone(), input, token).await? {
                history.push(Message::user(input));
                history.push(Message::assistant(reply));
            }
            if token.is_cancelled() {
                break;
            }
        }
        Ok(())
    }

    /// Stream one turn to stdout. Returns the final transcript on success.
    async fn run_turn(
        &self,
        orchestrator: &Orchestrator,
        history: Vec<Message>,
        input: &str,
        token: &CancellationToken,
    ) -> std::result::Result<Option<String>, Error> {
        let mut events = orchestrator.run_turn(history, input, token.child_token());
        let mut stdout = std::io::stdout();
        let mut reply = None;

        while let Some(event) = events.next().await {
            if self.json {
                writeln!(stdout, "{}", serde_json::to_string(&event)?)?;
            } else if let Some(text) = render(&event) {
                write!(stdout, "{text}")?;
            }
            stdout.flush()?;

            if event.is_terminal() {
                if let StreamEvent::Done { content } = event {
                    reply = Some(content);
                }
                break;
            }
        }
        Ok(reply)
    }
}

/// Plain-text form of an event, or `None` for events with nothing to show.
fn render(event: &StreamEvent) -> Option<String> {
    match event {
        StreamEvent::Thinking => None,
        StreamEvent::Responding { content } => Some(content.clone()),
        StreamEvent::UsingTool => Some("[using tools]\n".to_string()),
        StreamEvent::ToolResult {
            component_type,
            content,
        } => Some(format!("[{component_type}] {content}\n")),
        StreamEvent::Done { content } if content.is_empty() => None,
        StreamEvent::Done { .. } => Some("\n".to_string()),
        StreamEvent::Error { content } => Some(format!("error: {content}\n")),
    }
}
