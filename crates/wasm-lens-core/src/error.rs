use thiserror::Error;

/// Core error types for wasm-lens
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Caller supplied an invalid hyperparameter or runtime option.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid tensor shape: {0}")]
    InvalidShape(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Runtime error: {0}")]
    Runtime(String),
}

pub type Result<T> = std::result::Result<T, Error>;
