use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ToolError;

/// Component used when a tool result carries no renderer of its own.
pub const TEXT_COMPONENT: &str = "Text";

/// Where a tool's output goes once it has run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Presentation {
    /// Shown to the user directly through the named UI component.
    Inline { component_type: String },
    /// Appended to the conversation and sent back to the model.
    ReenterModel,
}

impl Presentation {
    pub fn inline(component_type: impl Into<String>) -> Self {
        Presentation::Inline {
            component_type: component_type.into(),
        }
    }

    pub fn is_inline(&self) -> bool {
        matches!(self, Presentation::Inline { .. })
    }

    pub fn component_type(&self) -> Option<&str> {
        match self {
            Presentation::Inline { component_type } => Some(component_type),
            Presentation::ReenterModel => None,
        }
    }
}

/// Outcome of one dispatched tool call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolResult {
    pub tool_call_id: String,
    pub name: String,
    pub payload: Value,
    pub presentation: Presentation,
    #[serde(default)]
    pub is_error: bool,
}

impl ToolResult {
    pub fn success(
        tool_call_id: impl Into<String>,
        name: impl Into<String>,
        payload: Value,
        presentation: Presentation,
    ) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            name: name.into(),
            payload,
            presentation,
            is_error: false,
        }
    }

    pub fn failure(
        tool_call_id: impl Into<String>,
        name: impl Into<String>,
        error: &ToolError,
        presentation: Presentation,
    ) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            name: name.into(),
            payload: serde_json::json!({ "error": error.to_string() }),
            presentation,
            is_error: true,
        }
    }

    /// Payload as sent to the model in a `tool` message and to the UI.
    ///
    /// String payloads keep their JSON quoting.
    pub fn payload_text(&self) -> String {
        serde_json::to_string(&self.payload).unwrap_or_else(|_| self.payload.to_string())
    }
}
