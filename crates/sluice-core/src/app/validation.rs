use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::app::conversation::{Message, latest_user_message};
use crate::tools::ToolRegistry;
use sluice_tools::ToolCallRequest;

/// Why a tool-call batch was declined.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("unknown tool '{0}'")]
    UnknownTool(String),

    #[error("arguments for {tool_name} are not valid JSON: {message}")]
    MalformedArguments { tool_name: String, message: String },

    #[error("{tool_name} is missing required parameters: {}", missing.join(", "))]
    MissingRequired {
        tool_name: String,
        missing: Vec<String>,
    },

    #[error("the latest user message does not call for {0}")]
    GateDeclined(String),
}

/// Per-tool check against the conversation, for tools that are easy to
/// trigger by mistake.
pub trait ContextGate: Send + Sync {
    fn allows(&self, call: &ToolCallRequest, latest_user_message: Option<&str>) -> bool;
}

/// Always allows. Used for every tool without a registered gate.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThrough;

impl ContextGate for PassThrough {
    fn allows(&self, _call: &ToolCallRequest, _latest_user_message: Option<&str>) -> bool {
        true
    }
}

/// Allows a call when the user's latest message mentions one of the
/// keywords (case-insensitive) or starts with the command prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeywordGate {
    keywords: Vec<String>,
    command_prefix: Option<String>,
}

impl KeywordGate {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            keywords: keywords
                .into_iter()
                .map(|k| k.as_ref().trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
            command_prefix: None,
        }
    }

    #[must_use]
    pub fn with_command_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        self.command_prefix = (!prefix.is_empty()).then_some(prefix);
        self
    }
}

impl ContextGate for KeywordGate {
    fn allows(&self, _call: &ToolCallRequest, latest_user_message: Option<&str>) -> bool {
        let Some(message) = latest_user_message else {
            return false;
        };
        if let Some(prefix) = &self.command_prefix
            && message.trim_start().starts_with(prefix.as_str())
        {
            return true;
        }
        let message = message.to_lowercase();
        self.keywords.iter().any(|k| message.contains(k.as_str()))
    }
}

/// All-or-nothing gate in front of the dispatcher.
#[derive(Clone)]
pub struct ToolCallValidator {
    registry: ToolRegistry,
    gates: HashMap<String, Arc<dyn ContextGate>>,
}

impl ToolCallValidator {
    pub fn new(registry: ToolRegistry) -> Self {
        Self {
            registry,
            gates: HashMap::new(),
        }
    }

    pub fn register_gate(&mut self, tool_name: impl Into<String>, gate: impl ContextGate + 'static) {
        self.gates.insert(tool_name.into(), Arc::new(gate));
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    #[must_use]
    pub fn with_gate(mut self, tool_name: impl Into<String>, gate: impl ContextGate + 'static) -> Self {
        self.register_gate(tool_name, gate);
        self
    }

    fn check_call(&self, call: &ToolCallRequest, latest: Option<&str>) -> Result<(), Rejection> {
        let Some(tool) = self.registry.get(&call.name) else {
            return Err(Rejection::UnknownTool(call.name.clone()));
        };

        let arguments = call
            .parse_arguments()
            .map_err(|e| Rejection::MalformedArguments {
                tool_name: call.name.clone(),
                message: e.to_string(),
            })?;

        let missing = tool.schema().input_schema.missing_required(&arguments);
        if !missing.is_empty() {
            return Err(Rejection::MissingRequired {
                tool_name: call.name.clone(),
                missing,
            });
        }

        let allowed = self
            .gates
            .get(&call.name)
            .is_none_or(|gate| gate.allows(call, latest));
        if !allowed {
            return Err(Rejection::GateDeclined(call.name.clone()));
        }
        Ok(())
    }

    /// Check every call; the first failure declines the whole batch.
    pub fn check(&self, calls: &[ToolCallRequest], conversation: &[Message]) -> Result<(), Rejection> {
        let latest = latest_user_message(conversation);
        calls.iter().try_for_each(|call| self.check_call(call, latest))
    }

    pub fn validate(&self, calls: &[ToolCallRequest], conversation: &[Message]) -> bool {
        match self.check(calls, conversation) {
            Ok(()) => {
                debug!(target: "sluice::validator", "Approved {} tool call(s)", calls.len());
                true
            }
            Err(rejection) => {
                warn!(
                    target: "sluice::validator",
                    "Declined batch of {} tool call(s): {}", calls.len(), rejection
                );
                false
            }
        }
    }
}

impl std::fmt::Debug for ToolCallValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolCallValidator")
            .field("registry", &self.registry)
            .field("gated_tools", &self.gates.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::builtin::{ArchiveQueryTool, SampleArchive, WeatherTool};
    use rstest::rstest;
    use std::time::Duration;

    fn validator() -> ToolCallValidator {
        let registry = ToolRegistry::new()
            .with(WeatherTool::offline())
            .with(ArchiveQueryTool::new(SampleArchive, 4, Duration::from_secs(60)));
        ToolCallValidator::new(registry).with_gate(
            "query_personnel_archive",
            KeywordGate::new(["archive", "personnel", "档案"]).with_command_prefix("@"),
        )
    }

    fn weather(arguments: &str) -> ToolCallRequest {
        ToolCallRequest::new("call_w", "get_weather", arguments)
    }

    fn query(sql: &str) -> ToolCallRequest {
        ToolCallRequest::new("call_q", "query_personnel_archive", format!(r#"{{"sql":"{sql}"}}"#))
    }

    #[rstest]
    #[case(vec![weather(r#"{"location":"Hangzhou"}"#)], "weather in Hangzhou?", Ok(()))]
    #[case(
        vec![ToolCallRequest::new("c", "teleport", "{}")],
        "beam me up",
        Err(Rejection::UnknownTool("teleport".into()))
    )]
    #[case(
        vec![weather(r#"{"units":"metric"}"#)],
        "weather?",
        Err(Rejection::MissingRequired { tool_name: "get_weather".into(), missing: vec!["location".into()] })
    )]
    #[case(
        vec![query("SELECT * FROM archive")],
        "what's the weather",
        Err(Rejection::GateDeclined("query_personnel_archive".into()))
    )]
    #[case(vec![query("SELECT * FROM archive")], "Show the PERSONNEL list", Ok(()))]
    #[case(vec![query("SELECT * FROM archive")], "@档案 张三", Ok(()))]
    fn checks_each_call(
        #[case] calls: Vec<ToolCallRequest>,
        #[case] user: &str,
        #[case] expected: Result<(), Rejection>,
    ) {
        let conversation = vec![Message::user(user)];
        assert_eq!(validator().check(&calls, &conversation), expected);
    }

    #[test]
    fn one_bad_call_declines_the_batch() {
        let calls = vec![
            weather(r#"{"location":"Hangzhou"}"#),
            weather(r#"{"location":"#),
        ];
        let conversation = vec![Message::user("weather in Hangzhou and Beijing")];

        let validator = validator();
        assert!(!validator.validate(&calls, &conversation));
        assert!(matches!(
            validator.check(&calls, &conversation),
            Err(Rejection::MalformedArguments { .. })
        ));
    }

    #[test]
    fn keyword_gate_needs_a_user_message() {
        let gate = KeywordGate::new(["archive"]);
        assert!(!gate.allows(&query("SELECT 1"), None));
        assert!(PassThrough.allows(&query("SELECT 1"), None));
    }
}
