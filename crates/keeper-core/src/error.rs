//! Error types for keeper-core

use thiserror::Error;

/// Result type alias using keeper-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in keeper-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// An authenticated-only operation was invoked without a signed-in user.
    /// Callers should route to the sign-in flow instead of retrying.
    #[error("Sign in required for this operation")]
    AuthRequired,

    /// HTTP transport error (network unreachable, timeout)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Server rejected the request with a non-2xx status
    #[error("Server error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Record or shared link not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Local store error
    #[error("Local store error: {0}")]
    Store(#[from] std::io::Error),

    /// Secure session storage error
    #[error("Secure storage error: {0}")]
    SecureStorage(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
