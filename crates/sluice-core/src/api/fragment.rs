use serde::{Deserialize, Serialize};

/// One streamed chunk of a chat completion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    #[serde(default)]
    pub choices: Vec<FragmentChoice>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FragmentChoice {
    #[serde(default)]
    pub delta: FragmentDelta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FragmentDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallDelta>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolCallDelta {
    pub index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<FunctionDelta>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}

impl Fragment {
    fn from_delta(delta: FragmentDelta) -> Self {
        Self {
            choices: vec![FragmentChoice {
                delta,
                finish_reason: None,
            }],
        }
    }

    pub fn text(content: impl Into<String>) -> Self {
        Self::from_delta(FragmentDelta {
            content: Some(content.into()),
            tool_calls: None,
        })
    }

    /// A partial tool call. `None` parts are omitted from the delta.
    pub fn tool_call(
        index: usize,
        id: Option<&str>,
        name: Option<&str>,
        arguments: Option<&str>,
    ) -> Self {
        let function = (name.is_some() || arguments.is_some()).then(|| FunctionDelta {
            name: name.map(str::to_string),
            arguments: arguments.map(str::to_string),
        });
        Self::from_delta(FragmentDelta {
            content: None,
            tool_calls: Some(vec![ToolCallDelta {
                index,
                id: id.map(str::to_string),
                function,
            }]),
        })
    }

    /// The delta of the first choice, if any. Only one choice is ever requested.
    pub fn delta(&self) -> Option<&FragmentDelta> {
        self.choices.first().map(|choice| &choice.delta)
    }
}
