use crate::domain_model::*;
use crate::domain_port::{CredentialStoreError, TransportError};
use tokio::sync::broadcast;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// No response came back (connect failure, timeout, broken body).
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    /// The replayed request was rejected with 401 as well.
    #[error("authorization expired (status {})", .0.status)]
    AuthorizationExpired(ApiResponse),
    /// The session could not be refreshed; credentials were cleared.
    /// `response` is the original 401.
    #[error("session expired (status {})", .response.status)]
    SessionExpired { response: ApiResponse },
    /// Any other non-2xx status, untouched.
    #[error("backend returned status {}", .0.status)]
    Application(ApiResponse),
    #[error("credential store error: {0}")]
    Store(#[from] CredentialStoreError),
    #[error("invalid json: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ClientError {
    /// The backend's response, when there was one.
    pub fn response(&self) -> Option<&ApiResponse> {
        match self {
            ClientError::AuthorizationExpired(response) => Some(response),
            ClientError::SessionExpired { response } => Some(response),
            ClientError::Application(response) => Some(response),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        self.response().map(|response| response.status)
    }
}

#[async_trait::async_trait]
pub trait ApiClient: Send + Sync {
    /// Send `request` with the session's credentials, refreshing them once if
    /// the backend rejects the access token.
    async fn send(&self, request: OutboundRequest) -> Result<ApiResponse, ClientError>;

    async fn get(&self, path: &str) -> Result<ApiResponse, ClientError> {
        self.send(OutboundRequest::get(path)).await
    }

    async fn delete(&self, path: &str) -> Result<ApiResponse, ClientError> {
        self.send(OutboundRequest::delete(path)).await
    }

    async fn post_json(
        &self,
        path: &str,
        value: &serde_json::Value,
    ) -> Result<ApiResponse, ClientError> {
        self.send(OutboundRequest::post(path).body(Body::Json(value.clone())))
            .await
    }

    async fn put_json(
        &self,
        path: &str,
        value: &serde_json::Value,
    ) -> Result<ApiResponse, ClientError> {
        self.send(OutboundRequest::put(path).body(Body::Json(value.clone())))
            .await
    }

    async fn patch_json(
        &self,
        path: &str,
        value: &serde_json::Value,
    ) -> Result<ApiResponse, ClientError> {
        self.send(OutboundRequest::patch(path).body(Body::Json(value.clone())))
            .await
    }
}

#[derive(Debug, Clone)]
pub struct LoginInput {
    pub username: String,
    pub password: String,
}

#[async_trait::async_trait]
pub trait SessionService: Send + Sync {
    async fn login(&self, input: LoginInput) -> Result<(), ClientError>;
    /// Revoke the refresh token (best effort) and forget the credentials.
    async fn logout(&self) -> Result<(), ClientError>;
    async fn is_authenticated(&self) -> Result<bool, ClientError>;
    fn subscribe(&self) -> broadcast::Receiver<SessionEvent>;
}
