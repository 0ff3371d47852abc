use serde::{Deserialize, Serialize};

use crate::api::provider::ToolChoice;
use crate::app::conversation::{Message, Role};
use sluice_tools::{ToolCallRequest, ToolSchema};

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub(super) enum OpenAIMessage {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        #[serde(skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        tool_calls: Option<Vec<OpenAIToolCall>>,
    },
    Tool {
        content: String,
        tool_call_id: String,
    },
}

impl From<Message> for OpenAIMessage {
    fn from(message: Message) -> Self {
        match message.role {
            Role::System => OpenAIMessage::System {
                content: message.content,
            },
            Role::User => OpenAIMessage::User {
                content: message.content,
            },
            Role::Assistant => {
                let tool_calls = message
                    .tool_calls
                    .filter(|calls| !calls.is_empty())
                    .map(|calls| calls.into_iter().map(OpenAIToolCall::from).collect());
                OpenAIMessage::Assistant {
                    content: (!message.content.is_empty()).then_some(message.content),
                    tool_calls,
                }
            }
            Role::Tool => OpenAIMessage::Tool {
                content: message.content,
                tool_call_id: message.tool_call_id.unwrap_or_default(),
            },
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub(super) struct OpenAIToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub tool_type: String,
    pub function: OpenAIFunctionCall,
}

impl From<ToolCallRequest> for OpenAIToolCall {
    fn from(call: ToolCallRequest) -> Self {
        Self {
            id: call.id,
            tool_type: "function".to_string(),
            function: OpenAIFunctionCall {
                name: call.name,
                arguments: call.arguments,
            },
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub(super) struct OpenAIFunctionCall {
    pub name: String,
    pub arguments: String, // JSON string
}

#[derive(Debug, Serialize, Deserialize)]
pub(super) struct OpenAITool {
    #[serde(rename = "type")]
    pub tool_type: String, // "function"
    pub function: OpenAIFunction,
}

impl From<ToolSchema> for OpenAITool {
    fn from(tool: ToolSchema) -> Self {
        Self {
            tool_type: "function".to_string(),
            function: OpenAIFunction {
                parameters: tool.input_schema.to_json_schema(),
                name: tool.name,
                description: tool.description,
            },
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub(super) struct OpenAIFunction {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub(super) struct OpenAIRequest {
    pub model: String,
    pub messages: Vec<OpenAIMessage>,
    pub temperature: f32,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<OpenAITool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,
}

/// In-band failure some compatible servers send instead of a chunk.
#[derive(Debug, Deserialize)]
pub(super) struct OpenAIStreamErrorBody {
    pub error: OpenAIStreamErrorDetail,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(super) enum OpenAIStreamErrorDetail {
    Structured {
        message: String,
    },
    Plain(String),
    Other(serde_json::Value),
}

impl OpenAIStreamErrorDetail {
    pub fn message(&self) -> String {
        match self {
            OpenAIStreamErrorDetail::Structured { message } | OpenAIStreamErrorDetail::Plain(message) => {
                message.clone()
            }
            OpenAIStreamErrorDetail::Other(value) => value.to_string(),
        }
    }
}
