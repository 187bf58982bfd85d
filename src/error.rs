//! Error handling for the overlay bridge

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Not found (device, overlay, registered service)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Config error
    #[error("Config error: {0}")]
    Config(String),

    /// Parse error (camera response not recognizable)
    #[error("Parse error: {0}")]
    Parse(String),

    /// Subscription error (host event bus)
    #[error("Subscription error: {0}")]
    Subscription(String),

    /// Camera rejected a request (non-2xx)
    #[error("Camera error: {0}")]
    Camera(String),

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
