//! Error types for detached contexts and the demonstration driver.

/// Why a context became done.
///
/// The display strings match what callers print in place of a result, so
/// `ContextError::DeadlineExceeded.to_string()` is `"context deadline exceeded"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum ContextError {
    #[error("context canceled")]
    Canceled,

    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

/// Top-level error type for the crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Context(#[from] ContextError),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The worker task ended without delivering a result (it panicked or was
    /// aborted by the runtime shutting down).
    #[error("worker finished without sending a result")]
    WorkerLost,

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl Error {
    /// The context error carried by this error, if any.
    pub fn context_error(&self) -> Option<ContextError> {
        match self {
            Error::Context(e) => Some(*e),
            _ => None,
        }
    }
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;
