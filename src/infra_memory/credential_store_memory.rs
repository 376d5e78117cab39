use crate::domain_model::*;
use crate::domain_port::*;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Per-process credential store. The whole pair lives behind one lock, so a
/// reader can never see halves of two different pairs.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    credential: RwLock<Option<Credential>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credential(credential: Credential) -> Self {
        MemoryCredentialStore {
            credential: RwLock::new(Some(credential)),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Option<Credential>> {
        self.credential
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Option<Credential>> {
        self.credential
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait::async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get_access_token(&self) -> Result<Option<AccessToken>, CredentialStoreError> {
        Ok(self.read().as_ref().map(|c| c.access_token.clone()))
    }

    async fn get_refresh_token(&self) -> Result<Option<RefreshToken>, CredentialStoreError> {
        Ok(self.read().as_ref().map(|c| c.refresh_token.clone()))
    }

    async fn get_pair(&self) -> Result<Option<Credential>, CredentialStoreError> {
        Ok(self.read().clone())
    }

    async fn set_pair(&self, credential: Credential) -> Result<(), CredentialStoreError> {
        if !credential.is_complete() {
            return Err(CredentialStoreError::Incomplete);
        }
        *self.write() = Some(credential);
        Ok(())
    }

    async fn clear(&self) -> Result<(), CredentialStoreError> {
        *self.write() = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test]
    async fn set_replaces_and_clear_removes() {
        let store = MemoryCredentialStore::new();
        assert_eq!(store.get_pair().await.unwrap(), None);

        store.set_pair(Credential::new("T1", "R1")).await.unwrap();
        store.set_pair(Credential::new("T2", "R2")).await.unwrap();
        assert_eq!(
            store.get_access_token().await.unwrap(),
            Some(AccessToken::new("T2"))
        );
        assert_eq!(
            store.get_refresh_token().await.unwrap(),
            Some(RefreshToken::new("R2"))
        );

        store.clear().await.unwrap();
        assert_eq!(store.get_access_token().await.unwrap(), None);
        assert_eq!(store.get_refresh_token().await.unwrap(), None);
    }

    #[tokio::test]
    async fn rejects_incomplete_pairs() {
        let store = MemoryCredentialStore::with_credential(Credential::new("T1", "R1"));
        let result = store.set_pair(Credential::new("", "R2")).await;

        assert!(matches!(result, Err(CredentialStoreError::Incomplete)));
        assert_eq!(
            store.get_pair().await.unwrap(),
            Some(Credential::new("T1", "R1"))
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn readers_never_observe_mixed_pairs() {
        let store = Arc::new(MemoryCredentialStore::new());
        let done = Arc::new(AtomicBool::new(false));

        let writer = {
            let store = store.clone();
            let done = done.clone();
            tokio::spawn(async move {
                for i in 0..2_000 {
                    if i % 7 == 0 {
                        store.clear().await.unwrap();
                    } else {
                        let pair = Credential::new(format!("access-{i}"), format!("refresh-{i}"));
                        store.set_pair(pair).await.unwrap();
                    }
                    tokio::task::yield_now().await;
                }
                done.store(true, Ordering::SeqCst);
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = store.clone();
                let done = done.clone();
                tokio::spawn(async move {
                    while !done.load(Ordering::SeqCst) {
                        if let Some(pair) = store.get_pair().await.unwrap() {
                            let access = pair.access_token.as_str().trim_start_matches("access-");
                            let refresh =
                                pair.refresh_token.as_str().trim_start_matches("refresh-");
                            assert_eq!(access, refresh);
                        }
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();

        writer.await.unwrap();
        for reader in readers {
            reader.await.unwrap();
        }
    }
}
