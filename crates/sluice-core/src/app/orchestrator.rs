//! The per-turn state machine.
//!
//! ```text
//! Requesting -> Accumulating -> Completing
//!                    |
//!                    v
//!               Validating --(declined)--> Requesting (clarification, no tools)
//!                    |
//!                    v
//!               Dispatching -> Completing           (all results inline)
//!                    |
//!                    v
//!               Reentering -> Requesting            (any reenter-model result)
//! ```
//!
//! Any phase may move to Erroring, which emits the single terminal `error`
//! event of the turn.

use std::pin::{Pin, pin};
use std::sync::Arc;

use futures::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::api::error::ApiError;
use crate::api::provider::{CompletionRequest, FragmentStream, Provider};
use crate::app::accumulator::{Accumulated, accumulate};
use crate::app::conversation::{Message, latest_user_message};
use crate::app::events::StreamEvent;
use crate::app::validation::ToolCallValidator;
use crate::config::TurnSettings;
use crate::tools::ToolDispatcher;
use sluice_tools::ToolResult;

pub type TurnStream = Pin<Box<dyn Stream<Item = StreamEvent> + Send>>;

const CLARIFICATION_PROMPT: &str = "The request could not be completed with the available tools. \
Ask the user a short clarifying question, or briefly explain what you can help with instead.";

enum Phase {
    Requesting(CompletionRequest),
    Accumulating {
        fragments: FragmentStream,
        tools_offered: bool,
    },
    Validating(Message),
    Dispatching(Message),
    Reentering {
        assistant: Message,
        results: Vec<ToolResult>,
    },
    Completing,
    Erroring(ApiError),
}

impl Phase {
    fn name(&self) -> &'static str {
        match self {
            Phase::Requesting(_) => "requesting",
            Phase::Accumulating { .. } => "accumulating",
            Phase::Validating(_) => "validating",
            Phase::Dispatching(_) => "dispatching",
            Phase::Reentering { .. } => "reentering",
            Phase::Completing => "completing",
            Phase::Erroring(_) => "erroring",
        }
    }
}

/// Drives one user turn from request to terminal event.
///
/// Cloning is cheap; every clone shares the provider and tools.
#[derive(Clone)]
pub struct Orchestrator {
    provider: Arc<dyn Provider>,
    validator: ToolCallValidator,
    dispatcher: ToolDispatcher,
    settings: TurnSettings,
}

impl Orchestrator {
    pub fn new(
        provider: Arc<dyn Provider>,
        validator: ToolCallValidator,
        settings: TurnSettings,
    ) -> Self {
        let dispatcher = ToolDispatcher::new(validator.registry().clone());
        Self {
            provider,
            validator,
            dispatcher,
            settings,
        }
    }

    pub fn settings(&self) -> &TurnSettings {
        &self.settings
    }

    fn seed_conversation(&self, history: Vec<Message>, user_input: String) -> Vec<Message> {
        let mut conversation = Vec::with_capacity(history.len() + 2);
        if !self.settings.system_prompt.is_empty() {
            conversation.push(Message::system(self.settings.system_prompt.clone()));
        }
        conversation.extend(history);
        conversation.push(Message::user(user_input));
        conversation
    }

    fn completion_request(&self, conversation: &[Message], offer_tools: bool) -> CompletionRequest {
        let request = CompletionRequest::new(conversation.to_vec(), self.settings.temperature);
        if offer_tools {
            request.with_tools(
                self.dispatcher.registry().schemas(),
                self.settings.tool_choice,
            )
        } else {
            request
        }
    }

    /// Only the latest user message, no tools, low temperature.
    fn clarification_request(&self, conversation: &[Message]) -> CompletionRequest {
        let mut messages = vec![Message::system(CLARIFICATION_PROMPT)];
        if let Some(latest) = latest_user_message(conversation) {
            messages.push(Message::user(latest));
        }
        CompletionRequest::new(messages, self.settings.clarification_temperature)
    }

    /// Run one turn. `history` excludes the system prompt and `user_input`.
    ///
    /// Dropping the returned stream abandons the turn and releases the
    /// in-flight response. Callers must not start another turn on the same
    /// conversation until this one has produced `done` or `error`.
    pub fn run_turn(
        &self,
        history: Vec<Message>,
        user_input: impl Into<String>,
        token: CancellationToken,
    ) -> TurnStream {
        let this = self.clone();
        let user_input = user_input.into();

        Box::pin(async_stream::stream! {
            let turn_token = token.child_token();
            let _cancel_on_drop = turn_token.clone().drop_guard();

            let mut conversation = this.seed_conversation(history, user_input);
            let mut transcript = String::new();
            let mut thinking_sent = false;
            let mut tool_rounds: u32 = 0;

            let offer_tools = this.settings.max_tool_rounds > 0;
            let mut phase = Phase::Requesting(this.completion_request(&conversation, offer_tools));

            loop {
                debug!(target: "sluice::orchestrator", "Entering {} phase", phase.name());

                phase = match phase {
                    Phase::Requesting(request) => {
                        let tools_offered = request.has_tools();
                        match this.provider.stream_completion(request, turn_token.clone()).await {
                            Ok(fragments) => Phase::Accumulating { fragments, tools_offered },
                            Err(e) => Phase::Erroring(e),
                        }
                    }

                    Phase::Accumulating { fragments, tools_offered } => {
                        let mut items = pin!(accumulate(fragments, !thinking_sent));
                        let mut outcome = None;
                        while let Some(item) = items.next().await {
                            match item {
                                Ok(Accumulated::Event(event)) => {
                                    match &event {
                                        StreamEvent::Thinking => thinking_sent = true,
                                        StreamEvent::Responding { content } => transcript.push_str(content),
                                        _ => {}
                                    }
                                    yield event;
                                }
                                Ok(Accumulated::Finished(message)) => outcome = Some(Ok(message)),
                                Err(e) => outcome = Some(Err(e)),
                            }
                        }

                        match outcome {
                            Some(Ok(message)) if message.has_tool_calls() && tools_offered => {
                                Phase::Validating(message)
                            }
                            Some(Ok(message)) => {
                                if message.has_tool_calls() {
                                    warn!(
                                        target: "sluice::orchestrator",
                                        "Ignoring {} tool call(s) from a request without tools",
                                        message.tool_calls().len()
                                    );
                                }
                                Phase::Completing
                            }
                            Some(Err(e)) => Phase::Erroring(e),
                            None => Phase::Erroring(ApiError::StreamError {
                                provider: this.provider.name().to_string(),
                                details: "stream ended without a final message".to_string(),
                            }),
                        }
                    }

                    Phase::Validating(message) => {
                        if this.validator.validate(message.tool_calls(), &conversation) {
                            yield StreamEvent::UsingTool;
                            Phase::Dispatching(message)
                        } else {
                            info!(target: "sluice::orchestrator", "Tool calls declined; asking for clarification");
                            Phase::Requesting(this.clarification_request(&conversation))
                        }
                    }

                    Phase::Dispatching(message) => {
                        let results = this.dispatcher.dispatch(message.tool_calls(), &turn_token).await;

                        if turn_token.is_cancelled() {
                            Phase::Erroring(ApiError::Cancelled {
                                provider: this.provider.name().to_string(),
                            })
                        } else {
                            for result in &results {
                                if let Some(component_type) = result.presentation.component_type() {
                                    yield StreamEvent::ToolResult {
                                        component_type: component_type.to_string(),
                                        content: result.payload_text(),
                                    };
                                }
                            }

                            if results.iter().any(|r| !r.presentation.is_inline()) {
                                Phase::Reentering { assistant: message, results }
                            } else {
                                Phase::Completing
                            }
                        }
                    }

                    Phase::Reentering { assistant, results } => {
                        conversation.push(assistant);
                        conversation.extend(results.iter().map(Message::tool_result));
                        tool_rounds += 1;

                        let offer_tools = tool_rounds < this.settings.max_tool_rounds;
                        if !offer_tools {
                            debug!(
                                target: "sluice::orchestrator",
                                "Tool round limit {} reached; follow-up omits tools",
                                this.settings.max_tool_rounds
                            );
                        }
                        Phase::Requesting(this.completion_request(&conversation, offer_tools))
                    }

                    Phase::Completing => {
                        yield StreamEvent::Done { content: std::mem::take(&mut transcript) };
                        break;
                    }

                    Phase::Erroring(e) => {
                        error!(target: "sluice::orchestrator", "Turn failed: {}", e);
                        yield StreamEvent::Error { content: e.user_message().to_string() };
                        break;
                    }
                };
            }
        })
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("provider", &self.provider.name())
            .field("validator", &self.validator)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
