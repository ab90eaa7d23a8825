//! Process-local CredentialStorage.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{CredentialStorage, PersistedSession, StorageError};

/// Keeps the session in memory only; nothing survives a restart.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCredentialStorage {
    session: Arc<Mutex<Option<PersistedSession>>>,
}

impl InMemoryCredentialStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage pre-seeded as if a previous process had persisted `session`
    pub fn with_session(session: PersistedSession) -> Self {
        Self {
            session: Arc::new(Mutex::new(Some(session))),
        }
    }

    pub async fn snapshot(&self) -> Option<PersistedSession> {
        self.session.lock().await.clone()
    }
}

#[async_trait]
impl CredentialStorage for InMemoryCredentialStorage {
    async fn load(&self) -> Result<Option<PersistedSession>, StorageError> {
        Ok(self.session.lock().await.clone())
    }

    async fn save(&self, session: &PersistedSession) -> Result<(), StorageError> {
        *self.session.lock().await = Some(session.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        *self.session.lock().await = None;
        Ok(())
    }
}
