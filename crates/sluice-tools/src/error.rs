use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tools::{
    archive::ArchiveQueryError, time::CurrentTimeError, weather::WeatherError,
};

#[derive(Error, Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Malformed arguments for {tool_name}: {message}")]
    MalformedArguments { tool_name: String, message: String },

    #[error("Invalid parameters for {tool_name}: {message}")]
    InvalidParams { tool_name: String, message: String },

    #[error("{0}")]
    Execution(ToolExecutionError),

    #[error("{0} was cancelled")]
    Cancelled(String),

    #[error("Unexpected error: {0}")]
    InternalError(String),
}

impl ToolError {
    pub fn execution<T: Into<String>, M: Into<String>>(tool_name: T, message: M) -> Self {
        ToolError::Execution(ToolExecutionError::External {
            tool_name: tool_name.into(),
            message: message.into(),
        })
    }

    pub fn invalid_params<T: Into<String>, M: Into<String>>(tool_name: T, message: M) -> Self {
        ToolError::InvalidParams {
            tool_name: tool_name.into(),
            message: message.into(),
        }
    }

    pub fn malformed_arguments<T: Into<String>, M: Into<String>>(tool_name: T, message: M) -> Self {
        ToolError::MalformedArguments {
            tool_name: tool_name.into(),
            message: message.into(),
        }
    }
}

#[derive(Error, Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(tag = "tool", content = "error", rename_all = "snake_case")]
pub enum ToolExecutionError {
    #[error("{0}")]
    Weather(WeatherError),
    #[error("{0}")]
    CurrentTime(CurrentTimeError),
    #[error("{0}")]
    ArchiveQuery(ArchiveQueryError),

    #[error("{tool_name} failed: {message}")]
    External { tool_name: String, message: String },
}
