use crate::domain_model::*;
use crate::domain_port::*;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

/// Credential store shared between processes through Redis.
///
/// Each operation is a single command (`MSET`, `MGET`, `DEL`), so Redis
/// applies it atomically and readers never see halves of two pairs.
pub struct RedisCredentialStore {
    conn: ConnectionManager,
    prefix: String,
}

impl RedisCredentialStore {
    pub fn new(conn: ConnectionManager, prefix: impl Into<String>) -> Self {
        RedisCredentialStore {
            conn,
            prefix: prefix.into(),
        }
    }

    pub async fn connect(dsn: &str, prefix: impl Into<String>) -> Result<Self, CredentialStoreError> {
        let client = redis::Client::open(dsn).map_err(store_error)?;
        let conn = client.get_connection_manager().await.map_err(store_error)?;
        Ok(Self::new(conn, prefix))
    }

    fn access_key(&self) -> String {
        format!("{}:access", self.prefix)
    }

    fn refresh_key(&self) -> String {
        format!("{}:refresh", self.prefix)
    }
}

fn store_error(e: redis::RedisError) -> CredentialStoreError {
    CredentialStoreError::Store(e.to_string())
}

#[async_trait::async_trait]
impl CredentialStore for RedisCredentialStore {
    async fn get_access_token(&self) -> Result<Option<AccessToken>, CredentialStoreError> {
        let mut conn = self.conn.clone();
        let val: Option<String> = conn.get(self.access_key()).await.map_err(store_error)?;
        Ok(val.map(AccessToken))
    }

    async fn get_refresh_token(&self) -> Result<Option<RefreshToken>, CredentialStoreError> {
        let mut conn = self.conn.clone();
        let val: Option<String> = conn.get(self.refresh_key()).await.map_err(store_error)?;
        Ok(val.map(RefreshToken))
    }

    async fn get_pair(&self) -> Result<Option<Credential>, CredentialStoreError> {
        let mut conn = self.conn.clone();
        let (access, refresh): (Option<String>, Option<String>) = redis::cmd("MGET")
            .arg(self.access_key())
            .arg(self.refresh_key())
            .query_async(&mut conn)
            .await
            .map_err(store_error)?;
        match (access, refresh) {
            (Some(access), Some(refresh)) => Ok(Some(Credential::new(access, refresh))),
            (None, None) => Ok(None),
            _ => Err(CredentialStoreError::Incomplete),
        }
    }

    async fn set_pair(&self, credential: Credential) -> Result<(), CredentialStoreError> {
        if !credential.is_complete() {
            return Err(CredentialStoreError::Incomplete);
        }
        let mut conn = self.conn.clone();
        let _: () = conn
            .mset(&[
                (self.access_key(), credential.access_token.0),
                (self.refresh_key(), credential.refresh_token.0),
            ])
            .await
            .map_err(store_error)?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), CredentialStoreError> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .del(vec![self.access_key(), self.refresh_key()])
            .await
            .map_err(store_error)?;
        Ok(())
    }
}
