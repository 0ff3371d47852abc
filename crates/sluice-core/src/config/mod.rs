//! User settings, stored as TOML under the platform config directory.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::api::{ApiError, OpenAIClient, ToolChoice};
use crate::app::validation::{KeywordGate, ToolCallValidator};
use crate::error::{Error, Result};
use crate::tools::ToolRegistry;
use crate::tools::builtin::{
    ArchiveQueryTool, CurrentTimeTool, QWeather, SampleArchive, WeatherTool,
};

pub const ENV_BASE_URL: &str = "SLUICE_BASE_URL";
pub const ENV_API_KEY: &str = "SLUICE_API_KEY";
pub const ENV_MODEL: &str = "SLUICE_MODEL";
pub const ENV_WEATHER_API_KEY: &str = "WEATHER_API_KEY";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub model: ModelSettings,

    #[serde(default)]
    pub turn: TurnSettings,

    #[serde(default)]
    pub tools: ToolSettings,

    /// Keyword gates by tool name. Tools without an entry are not gated.
    #[serde(default)]
    pub gates: BTreeMap<String, GateSettings>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.deepseek.com".to_string(),
            api_key: String::new(),
            model: "deepseek-chat".to_string(),
            timeout_secs: 120,
        }
    }
}

impl ModelSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn build_client(&self) -> std::result::Result<OpenAIClient, ApiError> {
        if self.api_key.trim().is_empty() {
            return Err(ApiError::Configuration(format!(
                "no API key configured; set {ENV_API_KEY} or model.api_key"
            )));
        }
        OpenAIClient::new(
            &self.api_key,
            Some(&self.base_url),
            self.model.clone(),
            self.timeout(),
        )
    }

    /// The key with all but its last four characters hidden.
    pub fn masked_api_key(&self) -> String {
        mask_secret(&self.api_key)
    }
}

/// Stars for all but the last four characters. Secrets of four characters
/// or fewer are hidden entirely.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 4 {
        return "*".repeat(chars.len());
    }
    let visible: String = chars[chars.len() - 4..].iter().collect();
    format!("{}{visible}", "*".repeat(chars.len() - 4))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TurnSettings {
    pub system_prompt: String,
    pub temperature: f32,
    /// Used for the follow-up request after a tool-call batch is declined.
    pub clarification_temperature: f32,
    pub tool_choice: ToolChoice,
    /// Tool rounds per turn before follow-up requests stop offering tools.
    pub max_tool_rounds: u32,
}

impl Default for TurnSettings {
    fn default() -> Self {
        Self {
            system_prompt: "You are a helpful assistant.".to_string(),
            temperature: 0.7,
            clarification_temperature: 0.2,
            tool_choice: ToolChoice::Auto,
            max_tool_rounds: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolSettings {
    /// QWeather key. Without one the weather tool reports offline data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weather_api_key: Option<String>,
    /// Per-account QWeather API host. Defaults to the public endpoints.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weather_api_host: Option<String>,
    pub query_cache_ttl_secs: u64,
    pub query_cache_capacity: usize,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            weather_api_key: None,
            weather_api_host: None,
            query_cache_ttl_secs: 3600,
            query_cache_capacity: 128,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateSettings {
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command_prefix: Option<String>,
}

impl Settings {
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| {
            Error::Configuration("Could not determine config directory".to_string())
        })?;
        Ok(config_dir.join("sluice").join("settings.toml"))
    }

    /// Load from the default path and apply environment overrides.
    pub fn load() -> Result<Self> {
        // A missing .env file is the common case.
        let _ = dotenvy::dotenv();
        let mut settings = Self::load_from(&Self::config_path()?)?;
        settings.apply_overrides(|key| std::env::var(key).ok());
        Ok(settings)
    }

    /// Missing files yield defaults, as do files that fail to parse.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        match toml::from_str(&contents) {
            Ok(settings) => Ok(settings),
            Err(e) => {
                tracing::warn!(
                    target: "sluice::config",
                    "Failed to parse settings file at {:?}: {}. Using defaults.",
                    path,
                    e
                );
                Ok(Self::default())
            }
        }
    }

    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::config_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Configuration(format!("Failed to serialize settings: {e}")))?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Overlay values from `lookup` (normally the process environment).
    /// Empty values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        if let Some(base_url) = get(ENV_BASE_URL) {
            self.model.base_url = base_url;
        }
        if let Some(api_key) = get(ENV_API_KEY) {
            self.model.api_key = api_key;
        }
        if let Some(model) = get(ENV_MODEL) {
            self.model.model = model;
        }
        if let Some(key) = get(ENV_WEATHER_API_KEY) {
            self.tools.weather_api_key = Some(key);
        }
    }

    /// Registry with the built-in tools.
    pub fn build_registry(&self) -> Result<ToolRegistry> {
        let weather = match self.tools.weather_api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => {
                let mut backend = QWeather::new(key, self.model.timeout())
                    .map_err(|e| Error::Configuration(format!("weather client: {e}")))?;
                if let Some(host) = self
                    .tools
                    .weather_api_host
                    .as_deref()
                    .filter(|h| !h.trim().is_empty())
                {
                    backend = backend.with_api_host(host);
                }
                WeatherTool::new(backend)
            }
            _ => WeatherTool::offline(),
        };

        Ok(ToolRegistry::new()
            .with(weather)
            .with(CurrentTimeTool)
            .with(ArchiveQueryTool::new(
                SampleArchive,
                self.tools.query_cache_capacity,
                Duration::from_secs(self.tools.query_cache_ttl_secs),
            )))
    }

    /// Validator over `registry` with a keyword gate per `[gates.*]` entry.
    pub fn build_validator(&self, registry: ToolRegistry) -> ToolCallValidator {
        let mut validator = ToolCallValidator::new(registry);
        for (tool_name, gate) in &self.gates {
            let mut keyword_gate = KeywordGate::new(&gate.keywords);
            if let Some(prefix) = &gate.command_prefix {
                keyword_gate = keyword_gate.with_command_prefix(prefix.clone());
            }
            validator.register_gate(tool_name.clone(), keyword_gate);
        }
        validator
    }
}
