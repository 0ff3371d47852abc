use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ToolSpec;
use crate::error::ToolExecutionError;

pub const WEATHER_TOOL_NAME: &str = "get_weather";

/// UI component that renders a [`WeatherReport`].
pub const WEATHER_COMPONENT: &str = "WeatherCard";

pub struct WeatherToolSpec;

impl ToolSpec for WeatherToolSpec {
    type Params = WeatherParams;
    type Result = WeatherReport;
    type Error = WeatherError;

    const NAME: &'static str = WEATHER_TOOL_NAME;
    const DISPLAY_NAME: &'static str = "Weather";

    fn execution_error(error: Self::Error) -> ToolExecutionError {
        ToolExecutionError::Weather(error)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Error, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WeatherError {
    #[error("no location matches '{location}'")]
    UnknownLocation { location: String },

    #[error("weather service request failed: {message}")]
    RequestFailed { message: String },

    #[error("weather service returned code {code}")]
    Service { code: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WeatherParams {
    /// The city and country, e.g. "Hangzhou, China"
    pub location: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeatherReport {
    pub city: String,
    pub temperature: String,
    pub weather: String,
    pub humidity: String,
    pub wind: String,
    pub message: String,
}
