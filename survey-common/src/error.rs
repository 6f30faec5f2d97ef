//! Common error types for the survey service

use thiserror::Error;

/// Common result type for survey operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors shared by storage, configuration and the HTTP layer
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be parsed
    #[error("Invalid config file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// No respondent row with the given id
    #[error("Respondent not found: {0}")]
    RespondentNotFound(i64),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
