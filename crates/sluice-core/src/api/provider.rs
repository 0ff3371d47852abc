use async_trait::async_trait;
use futures_core::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use tokio_util::sync::CancellationToken;

use crate::api::error::ApiError;
use crate::api::fragment::Fragment;
use crate::app::conversation::Message;
use sluice_tools::ToolSchema;

pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<Fragment, ApiError>> + Send>>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoice {
    #[default]
    Auto,
    None,
    Required,
}

/// One streamed chat-completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub messages: Vec<Message>,
    pub temperature: f32,
    /// `None` sends no tool definitions at all.
    pub tools: Option<Vec<ToolSchema>>,
    pub tool_choice: Option<ToolChoice>,
}

impl CompletionRequest {
    pub fn new(messages: Vec<Message>, temperature: f32) -> Self {
        Self {
            messages,
            temperature,
            tools: None,
            tool_choice: None,
        }
    }

    /// Attach tool definitions. An empty list is treated as no tools.
    #[must_use]
    pub fn with_tools(mut self, tools: Vec<ToolSchema>, tool_choice: ToolChoice) -> Self {
        if tools.is_empty() {
            self.tools = None;
            self.tool_choice = None;
        } else {
            self.tools = Some(tools);
            self.tool_choice = Some(tool_choice);
        }
        self
    }

    pub fn has_tools(&self) -> bool {
        self.tools.as_ref().is_some_and(|tools| !tools.is_empty())
    }
}

/// The model-completion collaborator.
///
/// Dropping the returned stream must release the underlying connection.
#[async_trait]
pub trait Provider: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    async fn stream_completion(
        &self,
        request: CompletionRequest,
        token: CancellationToken,
    ) -> Result<FragmentStream, ApiError>;
}
