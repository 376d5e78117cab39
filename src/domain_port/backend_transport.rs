use crate::domain_model::*;

/// Moves one prepared request to the backend and brings back whatever it
/// answered. Any HTTP status is a successful transport round trip; only a
/// missing response is an error.
#[async_trait::async_trait]
pub trait BackendTransport: Send + Sync {
    async fn dispatch(&self, request: PreparedRequest) -> Result<ApiResponse, TransportError>;
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("network error: {0}")]
    Network(String),
}
