//! Error types for rosbot_mppic

use thiserror::Error;

/// Main error type for the controller core
#[derive(Debug, Error)]
pub enum MppicError {
    /// Invalid parameter (configuration, sequence length, frequency)
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
    /// Reference trajectory cannot be scored against
    #[error("Invalid reference: {0}")]
    InvalidReference(String),
    /// Numerical computation failed (degenerate weights, NaN costs)
    #[error("Numerical error: {0}")]
    NumericalError(String),
    /// Configuration file could not be read
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
    /// Configuration file could not be parsed
    #[error("Config error: {0}")]
    ConfigError(#[from] toml::de::Error),
}

/// Result type alias for controller operations
pub type MppicResult<T> = Result<T, MppicError>;
