use eventsource_stream::EventStreamError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SseParseError {
    #[error("UTF-8 error: {details}")]
    Utf8 { details: String },
    #[error("Parse error: {details}")]
    Parser { details: String },
    #[error("Transport error: {details}")]
    Transport { details: String },
}

impl<E> From<EventStreamError<E>> for SseParseError
where
    E: std::error::Error,
{
    fn from(err: EventStreamError<E>) -> Self {
        match err {
            EventStreamError::Utf8(err) => Self::Utf8 {
                details: err.to_string(),
            },
            EventStreamError::Parser(err) => Self::Parser {
                details: err.to_string(),
            },
            EventStreamError::Transport(err) => Self::Transport {
                details: err.to_string(),
            },
        }
    }
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Authentication failed for {provider}: {details}")]
    AuthenticationFailed { provider: String, details: String },

    #[error("Rate limited by {provider}: {details}")]
    RateLimited { provider: String, details: String },

    #[error("{provider} server error (Status: {status_code}): {details}")]
    ServerError {
        provider: String,
        status_code: u16,
        details: String,
    },

    #[error("Request timed out for {provider}")]
    Timeout { provider: String },

    #[error("Request cancelled for {provider}")]
    Cancelled { provider: String },

    #[error("SSE parse error: {0}")]
    SseParse(#[from] SseParseError),

    #[error("Stream error from {provider}: {details}")]
    StreamError { provider: String, details: String },

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl ApiError {
    /// A sentence that is safe to show to the end user.
    ///
    /// Provider bodies and URLs stay out of it; they belong in the logs.
    pub fn user_message(&self) -> &'static str {
        match self {
            ApiError::Network(e) if e.is_timeout() => {
                "The assistant took too long to respond. Please try again."
            }
            ApiError::Timeout { .. } => "The assistant took too long to respond. Please try again.",
            ApiError::Network(_) | ApiError::SseParse(_) | ApiError::StreamError { .. } => {
                "The connection to the assistant was interrupted. Please try again later."
            }
            ApiError::AuthenticationFailed { .. } => {
                "The assistant service rejected the configured credentials."
            }
            ApiError::RateLimited { .. } => {
                "The assistant is receiving too many requests. Please wait a moment and retry."
            }
            ApiError::Cancelled { .. } => "The request was cancelled.",
            ApiError::Configuration(_) => "The assistant is not configured correctly.",
            ApiError::ServerError { .. } => {
                "Sorry, the assistant is temporarily unavailable. Please try again later."
            }
        }
    }
}
