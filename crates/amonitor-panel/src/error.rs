//! Panel error types.

use thiserror::Error;

/// Panel error type.
#[derive(Debug, Error)]
pub enum PanelError {
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("timeout error: {0}")]
    Timeout(String),

    #[error("not connected")]
    NotConnected,
}

/// Panel result type.
pub type Result<T> = std::result::Result<T, PanelError>;
