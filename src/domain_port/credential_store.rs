use crate::domain_model::*;

/// Session-wide token storage.
///
/// Implementations must make `set_pair` and `clear` atomic with respect to
/// every read: a reader sees the old pair, the new pair, or nothing, never a
/// mix of two pairs.
#[async_trait::async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get_access_token(&self) -> Result<Option<AccessToken>, CredentialStoreError>;
    async fn get_refresh_token(&self) -> Result<Option<RefreshToken>, CredentialStoreError>;
    /// Both halves read as one snapshot.
    async fn get_pair(&self) -> Result<Option<Credential>, CredentialStoreError>;
    /// Replace whatever is stored with `credential`.
    async fn set_pair(&self, credential: Credential) -> Result<(), CredentialStoreError>;
    async fn clear(&self) -> Result<(), CredentialStoreError>;
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum CredentialStoreError {
    #[error("store error: {0}")]
    Store(String),
    #[error("stored credential is incomplete")]
    Incomplete,
}
