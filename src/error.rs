use std::sync::Arc;

use thiserror::Error;

/// Every fallible operation in the crate returns this error. The fixed
/// user-facing messages for the transport categories match what the
/// dashboard shows verbatim.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("API endpoint not found")]
    EndpointNotFound,
    #[error("Server error. Please try again later.")]
    ServerError,
    #[error("Network error. Please check your connection.")]
    Network,
    /// Error string carried in a non-2xx response body.
    #[error("{0}")]
    Api(String),
    /// 2xx response whose envelope reported `success: false`.
    #[error("request failed: {0}")]
    Logical(String),
    #[error("unexpected HTTP status {0}")]
    UnexpectedStatus(u16),
    #[error("request error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("websocket error: {0}")]
    WebSocket(Box<tokio_tungstenite::tungstenite::Error>),
    #[error("json decode error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("json decode error: {0}")]
    SimdJson(#[from] simd_json::Error),
    #[error("push channel not connected")]
    NotConnected,
    #[error("push channel connect timed out")]
    ConnectTimeout,
    /// Outcome of a fetch that another caller shared via the cache.
    #[error("{0}")]
    Shared(Arc<ClientError>),
}

impl From<tokio_tungstenite::tungstenite::Error> for ClientError {
    fn from(value: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WebSocket(Box::new(value))
    }
}

impl From<Arc<ClientError>> for ClientError {
    fn from(value: Arc<ClientError>) -> Self {
        Self::Shared(value)
    }
}

impl serde::Serialize for ClientError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
