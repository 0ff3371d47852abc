use schemars::JsonSchema;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::collections::BTreeSet;
use std::error::Error as StdError;

use crate::error::{ToolError, ToolExecutionError};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InputSchema {
    pub properties: serde_json::Map<String, Value>,
    pub required: Vec<String>,
    #[serde(rename = "type")]
    pub schema_type: String,
}

impl InputSchema {
    pub fn object(properties: serde_json::Map<String, Value>, required: Vec<String>) -> Self {
        Self {
            properties,
            required,
            schema_type: "object".to_string(),
        }
    }

    /// JSON-schema form sent to the model as a function's `parameters`.
    pub fn to_json_schema(&self) -> Value {
        serde_json::json!({
            "type": self.schema_type,
            "properties": self.properties,
            "required": self.required,
        })
    }

    /// Required parameter names absent from `arguments`.
    ///
    /// Anything other than a JSON object is missing every required parameter.
    pub fn missing_required(&self, arguments: &Value) -> Vec<String> {
        let Some(obj) = arguments.as_object() else {
            return self.required.clone();
        };
        self.required
            .iter()
            .filter(|name| obj.get(name.as_str()).is_none_or(Value::is_null))
            .cloned()
            .collect()
    }
}

impl From<schemars::Schema> for InputSchema {
    fn from(schema: schemars::Schema) -> Self {
        let schema_value = serde_json::to_value(&schema).unwrap_or(Value::Null);
        let summary = SchemaSummary::from_value(&schema_value);
        Self {
            properties: summary.properties,
            required: summary.required.into_iter().collect(),
            schema_type: summary.schema_type,
        }
    }
}

struct SchemaSummary {
    properties: serde_json::Map<String, Value>,
    required: BTreeSet<String>,
    schema_type: String,
}

impl SchemaSummary {
    fn from_value(schema: &Value) -> Self {
        let mut summary = Self {
            properties: serde_json::Map::new(),
            required: BTreeSet::new(),
            schema_type: schema
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or("object")
                .to_string(),
        };
        summary.merge(schema);
        summary
    }

    fn merge(&mut self, schema: &Value) {
        let Some(obj) = schema.as_object() else {
            return;
        };

        if let Some(props) = obj.get("properties").and_then(Value::as_object) {
            for (key, value) in props {
                self.properties
                    .entry(key.clone())
                    .or_insert_with(|| value.clone());
            }
        }

        if let Some(req) = obj.get("required").and_then(Value::as_array) {
            self.required
                .extend(req.iter().filter_map(Value::as_str).map(str::to_string));
        }

        if let Some(all_of) = obj.get("allOf").and_then(Value::as_array) {
            for sub in all_of {
                self.merge(sub);
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolSchema {
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    pub description: String,
    pub input_schema: InputSchema,
}

pub trait ToolSpec {
    type Params: DeserializeOwned + JsonSchema + Send;
    type Result: Serialize + Send;
    type Error: StdError + Send + Sync + 'static;

    const NAME: &'static str;
    const DISPLAY_NAME: &'static str;

    fn execution_error(error: Self::Error) -> ToolExecutionError;
}

/// A tool invocation requested by the model.
///
/// `arguments` is the raw JSON text as streamed by the model. It is only
/// meaningful once the stream has finished and may still fail to parse.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

impl ToolCallRequest {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    pub fn parse_arguments(&self) -> Result<Value, ToolError> {
        // Some providers send an empty string for argument-less calls.
        if self.arguments.trim().is_empty() {
            return Ok(Value::Object(serde_json::Map::new()));
        }
        serde_json::from_str(&self.arguments)
            .map_err(|e| ToolError::malformed_arguments(&self.name, e.to_string()))
    }
}
