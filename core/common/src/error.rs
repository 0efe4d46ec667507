//! Common error types for Shopbox.

use thiserror::Error;

/// Top-level error type for Shopbox operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Client id or client secret is missing or unusable.
    #[error("Credential error: {0}")]
    Credential(String),

    /// Authorization-code exchange with the provider failed.
    #[error("Token exchange failed: {0}")]
    TokenExchange(String),

    /// Access-token refresh failed; stored tokens have been cleared.
    #[error("Token refresh failed: {0}")]
    Refresh(String),

    /// No usable access token for an authenticated call.
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Network or timeout failure talking to the provider.
    #[error("Network error: {0}")]
    Network(String),

    /// Resource not found, including broken path segments.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Upload was rejected or produced an unusable response.
    #[error("Upload failed: {0}")]
    Upload(String),

    /// The provider did not hand out a direct download location.
    #[error("Download unavailable: {0}")]
    DownloadUnavailable(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
