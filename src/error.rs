//! Error types for the opguard engine.

use thiserror::Error;

/// Main error type for opguard operations.
///
/// A denied request is not an error: rate-limit and lockout denials are
/// returned as values (`Decision::Denied`, a `false` permit), never through
/// this type. Errors here indicate bad configuration or misuse of the API
/// by a caller.
#[derive(Error, Debug)]
pub enum GuardError {
    /// Configuration-related errors
    #[error("configuration error: {0}")]
    Config(String),

    /// Caller passed a missing or invalid identifier or operation key
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// I/O errors (configuration file loading)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for opguard operations.
pub type Result<T> = std::result::Result<T, GuardError>;
