//! CredentialStorage trait 定義
//!
//! 永続化された資格情報と利用者情報へのインターフェース。
//! CredentialStore はこの trait に依存し、ファイルなどの具体的な実装には依存しない。

use async_trait::async_trait;
use serde_json::Value;

use super::StorageError;

/// Credential and identity as they were persisted
///
/// Either field may be missing; validation happens when the store loads them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PersistedSession {
    pub credential: Option<String>,
    pub identity: Option<Value>,
}

/// Persistent storage for the signed-in session
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CredentialStorage: Send + Sync {
    /// Read the persisted session, `None` if nothing was stored
    async fn load(&self) -> Result<Option<PersistedSession>, StorageError>;

    /// Replace the persisted session
    async fn save(&self, session: &PersistedSession) -> Result<(), StorageError>;

    /// Remove any persisted session
    async fn clear(&self) -> Result<(), StorageError>;
}
