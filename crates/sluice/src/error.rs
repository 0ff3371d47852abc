use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize settings: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("Failed to encode event: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Core(#[from] sluice_core::error::Error),
}

impl From<sluice_core::api::ApiError> for Error {
    fn from(err: sluice_core::api::ApiError) -> Self {
        Error::Core(err.into())
    }
}
