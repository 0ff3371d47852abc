mod chat;
mod types;

pub use chat::OpenAIClient;

/// Provider name constant for OpenAI-compatible endpoints
pub(crate) const PROVIDER_NAME: &str = "openai";

const DEFAULT_API_URL: &str = "https://api.openai.com/v1/chat/completions";
