//! Error types for routelet

use thiserror::Error;

/// Main error type for routelet
#[derive(Error, Debug)]
pub enum RouteletError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// No instance available for a service
    #[error("No instance available for service: {0}")]
    NoInstanceAvailable(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for routelet operations
pub type RouteletResult<T> = Result<T, RouteletError>;

impl From<toml::de::Error> for RouteletError {
    fn from(err: toml::de::Error) -> Self {
        RouteletError::Config(err.to_string())
    }
}
