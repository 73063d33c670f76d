use thiserror::Error;

/// Common error type for HubBridge components.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias using HubBridge's Error.
pub type Result<T> = std::result::Result<T, Error>;
