//! Error types for Yak.

use thiserror::Error;

use crate::command::ExtensionError;

/// Common error type for Yak.
#[derive(Error, Debug)]
pub enum YakError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Validation error for user input or configuration values.
    #[error("validation error: {0}")]
    Validation(String),

    /// Script sandbox error.
    #[error("script error: {0}")]
    Script(String),

    /// Extension catalog error.
    #[error("extension error: {0}")]
    Extension(#[from] ExtensionError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias for Yak operations.
pub type Result<T> = std::result::Result<T, YakError>;
