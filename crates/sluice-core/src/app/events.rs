use serde::{Deserialize, Serialize};

/// Externally visible unit of a turn, in strict per-turn order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StreamEvent {
    /// The request was accepted. Emitted once per turn.
    Thinking,
    Responding {
        content: String,
    },
    UsingTool,
    ToolResult {
        #[serde(rename = "componentType")]
        component_type: String,
        content: String,
    },
    Done {
        content: String,
    },
    /// Terminal failure with a user-safe message.
    Error {
        content: String,
    },
}

impl StreamEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Done { .. } | StreamEvent::Error { .. })
    }
}
