//! UseCase: credential and identity holder
//!
//! ## 概要
//!
//! プロセス内で唯一の資格情報と利用者情報を保持し、永続化ストレージと同期します。
//!
//! ## ライフサイクル
//!
//! - `initialize()`: 起動時に 1 回。永続化されたセッションを検証し、不正なら破棄する
//! - `login()` / `logout()` / `update_identity()`: 明示的な更新
//! - `invalidate()`: 認可拒否や期限切れによる強制クリア
//! - `shutdown()`: 期限切れタイマーの停止
//!
//! 資格情報と利用者情報は 1 つの `Option<AuthSession>` として保持されるため、
//! 片方だけが設定された状態は観測されない。

use std::{sync::Arc, time::Duration};

use tokio::{
    sync::{Mutex, watch},
    task::JoinHandle,
};

use crate::domain::{
    Credential, CredentialError, CredentialStorage, Identity, IdentityPatch, PersistedSession,
    TokenValidator,
};

/// Credential and identity held together
#[derive(Debug, Clone, PartialEq)]
pub struct AuthSession {
    pub credential: Credential,
    pub identity: Identity,
}

impl AuthSession {
    fn to_persisted(&self) -> PersistedSession {
        PersistedSession {
            credential: Some(self.credential.as_str().to_string()),
            identity: Some(self.identity.to_value()),
        }
    }
}

struct StoreInner {
    storage: Arc<dyn CredentialStorage>,
    validator: TokenValidator,
    session: Mutex<Option<AuthSession>>,
    signed_in: watch::Sender<bool>,
    expiry_timer: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

/// Process-wide holder of the current credential and identity
#[derive(Clone)]
pub struct CredentialStore {
    inner: Arc<StoreInner>,
}

impl CredentialStore {
    pub fn new(storage: Arc<dyn CredentialStorage>, validator: TokenValidator) -> Self {
        let (signed_in, _) = watch::channel(false);
        Self {
            inner: Arc::new(StoreInner {
                storage,
                validator,
                session: Mutex::new(None),
                signed_in,
                expiry_timer: parking_lot::Mutex::new(None),
            }),
        }
    }

    pub fn validator(&self) -> &TokenValidator {
        &self.inner.validator
    }

    /// Load the persisted session, if it is still acceptable.
    ///
    /// Never fails: unreadable storage, a rejected credential or a malformed
    /// identity all leave the store empty (and the invalid copy is removed).
    pub async fn initialize(&self) {
        let mut session = self.inner.session.lock().await;

        let persisted = match self.inner.storage.load().await {
            Ok(Some(persisted)) => persisted,
            Ok(None) => {
                tracing::info!("No persisted session found");
                return;
            }
            Err(e) => {
                tracing::warn!("Could not read persisted session, starting signed out: {}", e);
                return;
            }
        };

        match self.accept_persisted(persisted) {
            Ok(accepted) => {
                tracing::info!("Restored session for user '{}'", accepted.identity.id);
                self.hold(&mut session, accepted);
            }
            Err(e) => {
                tracing::warn!("Discarding persisted session: {}", e);
                if let Err(e) = self.inner.storage.clear().await {
                    tracing::warn!("Failed to remove discarded session: {}", e);
                }
            }
        }
    }

    fn accept_persisted(&self, persisted: PersistedSession) -> Result<AuthSession, CredentialError> {
        let raw = persisted.credential.ok_or_else(|| {
            CredentialError::InvalidCredential("no credential persisted".to_string())
        })?;
        let credential = self.inner.validator.validate(&raw)?;
        let identity = Identity::from_value(persisted.identity.ok_or_else(|| {
            CredentialError::InvalidIdentity("no identity persisted".to_string())
        })?)?;
        Ok(AuthSession {
            credential,
            identity,
        })
    }

    /// Accept a freshly issued credential with its identity.
    ///
    /// # Errors
    ///
    /// - `InvalidCredential` if the credential is malformed or expired
    /// - `InvalidIdentity` if the identity lacks an identifier or role
    /// - `Storage` if persisting fails; the store is left unchanged
    pub async fn login(&self, raw: &str, identity: Identity) -> Result<(), CredentialError> {
        let credential = self.inner.validator.validate(raw)?;
        if !identity.is_well_formed() {
            return Err(CredentialError::InvalidIdentity(
                "identifier and role must not be blank".to_string(),
            ));
        }

        let accepted = AuthSession {
            credential,
            identity,
        };
        let mut session = self.inner.session.lock().await;
        self.inner.storage.save(&accepted.to_persisted()).await?;

        tracing::info!("User '{}' signed in", accepted.identity.id);
        self.hold(&mut session, accepted);
        Ok(())
    }

    /// Clear credential, identity and persisted copies. Idempotent.
    pub async fn logout(&self) {
        self.invalidate("logout").await;
    }

    /// Forced clear after a rejection or expiry.
    pub async fn invalidate(&self, reason: &str) {
        let mut session = self.inner.session.lock().await;
        self.clear(&mut session, reason).await;
    }

    /// Merge `patch` into the held identity and persist the whole result.
    ///
    /// # Errors
    ///
    /// - `NoIdentity` if nobody is signed in (nothing changes)
    /// - `InvalidIdentity` if the merge would break the identity
    /// - `Storage` if persisting fails; the held identity is left unchanged
    pub async fn update_identity(&self, patch: IdentityPatch) -> Result<Identity, CredentialError> {
        let mut session = self.inner.session.lock().await;
        let Some(current) = session.as_mut() else {
            tracing::warn!("Identity update ignored: no identity is held");
            return Err(CredentialError::NoIdentity);
        };

        let merged = AuthSession {
            credential: current.credential.clone(),
            identity: current.identity.merged(&patch)?,
        };
        self.inner.storage.save(&merged.to_persisted()).await?;
        current.identity = merged.identity.clone();

        tracing::debug!("Identity of user '{}' updated", current.identity.id);
        Ok(merged.identity)
    }

    pub async fn current(&self) -> Option<AuthSession> {
        self.inner.session.lock().await.clone()
    }

    pub async fn credential(&self) -> Option<Credential> {
        self.inner
            .session
            .lock()
            .await
            .as_ref()
            .map(|s| s.credential.clone())
    }

    pub async fn identity(&self) -> Option<Identity> {
        self.inner
            .session
            .lock()
            .await
            .as_ref()
            .map(|s| s.identity.clone())
    }

    pub fn is_signed_in(&self) -> bool {
        *self.inner.signed_in.borrow()
    }

    /// Observe sign-in state; `false` is published whenever the store is cleared.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.inner.signed_in.subscribe()
    }

    /// Stop the expiry timer. The held session is kept.
    pub fn shutdown(&self) {
        if let Some(timer) = self.inner.expiry_timer.lock().take() {
            timer.abort();
        }
    }

    fn hold(&self, slot: &mut Option<AuthSession>, session: AuthSession) {
        self.arm_expiry_timer(&session.credential);
        *slot = Some(session);
        self.inner.signed_in.send_replace(true);
    }

    async fn clear(&self, slot: &mut Option<AuthSession>, reason: &str) {
        self.shutdown();
        let previous = slot.take();
        self.inner.signed_in.send_replace(false);

        if let Err(e) = self.inner.storage.clear().await {
            tracing::warn!("Failed to clear persisted session: {}", e);
        }
        if let Some(previous) = previous {
            tracing::info!("User '{}' signed out ({})", previous.identity.id, reason);
        }
    }

    /// Replace the expiry timer with one for `credential`.
    fn arm_expiry_timer(&self, credential: &Credential) {
        let mut timer = self.inner.expiry_timer.lock();
        if let Some(previous) = timer.take() {
            previous.abort();
        }

        let Some(remaining) = credential.millis_until_expiry(self.inner.validator.now_millis())
        else {
            return;
        };
        // Expiry is strict (`exp < now`), so fire one millisecond past the boundary.
        let delay = Duration::from_millis(u64::try_from(remaining).unwrap_or(0) + 1);
        let store = Arc::downgrade(&self.inner);
        let raw = credential.as_str().to_string();

        *timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(inner) = store.upgrade() {
                CredentialStore { inner }.expire(&raw).await;
            }
        }));
    }

    async fn expire(&self, raw: &str) {
        // Detach our own handle so that clearing does not abort this task.
        drop(self.inner.expiry_timer.lock().take());

        let mut session = self.inner.session.lock().await;
        let still_current = session
            .as_ref()
            .is_some_and(|s| s.credential.as_str() == raw);
        if still_current {
            tracing::warn!("Credential expired");
            self.clear(&mut session, "credential expired").await;
        }
    }
}
