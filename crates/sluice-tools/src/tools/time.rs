use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ToolSpec;
use crate::error::ToolExecutionError;

pub const CURRENT_TIME_TOOL_NAME: &str = "get_current_time";

pub const TIME_COMPONENT: &str = "TimeCard";

/// Offset used when the model does not ask for one (UTC+8).
pub const DEFAULT_UTC_OFFSET_HOURS: i32 = 8;

pub struct CurrentTimeToolSpec;

impl ToolSpec for CurrentTimeToolSpec {
    type Params = CurrentTimeParams;
    type Result = CurrentTime;
    type Error = CurrentTimeError;

    const NAME: &'static str = CURRENT_TIME_TOOL_NAME;
    const DISPLAY_NAME: &'static str = "Current Time";

    fn execution_error(error: Self::Error) -> ToolExecutionError {
        ToolExecutionError::CurrentTime(error)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Error, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CurrentTimeError {
    #[error("utc offset {hours}h is out of range")]
    InvalidOffset { hours: i32 },
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CurrentTimeParams {
    /// Hours east of UTC, between -12 and 14 (defaults to 8)
    #[schemars(range(min = -12, max = 14))]
    pub utc_offset_hours: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CurrentTime {
    pub timestamp: String,
    pub formatted: String,
}
