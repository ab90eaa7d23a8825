//! UseCase: reaction to authorization rejections
//!
//! A rejection clears the credential store and sends the user to the
//! authentication entry point exactly once, however many rejections arrive
//! before the user gets there.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use crate::{config::RealtimeConfig, domain::Navigator, usecase::CredentialStore};

/// What `reject()` did about navigation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionOutcome {
    /// The user was sent to the entry point
    Redirected,
    /// The user already is on an entry point; nothing to do
    AlreadyOnEntryPoint,
    /// A redirect from an earlier rejection is still pending
    RedirectPending,
}

pub struct AuthorizationGuard {
    store: CredentialStore,
    navigator: Arc<dyn Navigator>,
    entry_path: String,
    entry_points: Vec<String>,
    redirecting: AtomicBool,
}

impl AuthorizationGuard {
    pub fn new(store: CredentialStore, navigator: Arc<dyn Navigator>, config: &RealtimeConfig) -> Self {
        Self {
            store,
            navigator,
            entry_path: config.auth_entry_path.clone(),
            entry_points: config.auth_entry_points.clone(),
            redirecting: AtomicBool::new(false),
        }
    }

    /// Handle an authorization rejection from the handshake or another layer.
    pub async fn reject(&self, reason: &str) -> RejectionOutcome {
        tracing::warn!("Authorization rejected: {}", reason);
        self.store.invalidate(reason).await;

        let location = self.navigator.current_location();
        if self.is_entry_point(&location) {
            self.redirecting.store(false, Ordering::SeqCst);
            tracing::debug!("Already on entry point '{}'", location);
            return RejectionOutcome::AlreadyOnEntryPoint;
        }

        if self.redirecting.swap(true, Ordering::SeqCst) {
            tracing::debug!("Redirect already pending; skipping");
            return RejectionOutcome::RedirectPending;
        }

        tracing::info!("Redirecting from '{}' to '{}'", location, self.entry_path);
        self.navigator.navigate(&self.entry_path);
        RejectionOutcome::Redirected
    }

    /// Re-arm the redirect after the user has authenticated again.
    pub fn reset(&self) {
        self.redirecting.store(false, Ordering::SeqCst);
    }

    /// Compare the path part only, so `/login?next=/orders` is an entry point.
    fn is_entry_point(&self, location: &str) -> bool {
        let path = location
            .split(['?', '#'])
            .next()
            .unwrap_or(location)
            .trim_end_matches('/');
        self.entry_points
            .iter()
            .any(|entry| entry.trim_end_matches('/') == path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::{Identity, MockNavigator, TokenValidator, encode_unsigned},
        infrastructure::storage::InMemoryCredentialStorage,
    };
    use ichiba_shared::time::{FixedClock, get_timestamp_millis};
    use serde_json::json;

    async fn signed_in_store() -> CredentialStore {
        let now = get_timestamp_millis();
        let store = CredentialStore::new(
            Arc::new(InMemoryCredentialStorage::new()),
            TokenValidator::new(Arc::new(FixedClock::new(now))),
        );
        let token = encode_unsigned(&json!({"sub": "7", "exp": now / 1000 + 3600}));
        store
            .login(&token, Identity::new("7", "client"))
            .await
            .unwrap();
        store
    }

    fn navigator_at(location: &'static str, navigations: usize) -> MockNavigator {
        let mut navigator = MockNavigator::new();
        navigator
            .expect_current_location()
            .returning(move || location.to_string());
        navigator
            .expect_navigate()
            .withf(|target| target == "/login")
            .times(navigations)
            .return_const(());
        navigator
    }

    #[tokio::test]
    async fn test_reject_clears_store_and_redirects_once() {
        // テスト項目: 連続した拒否でも遷移は 1 回だけ行われ、ストアはクリアされる
        // given (前提条件):
        let store = signed_in_store().await;
        let guard = AuthorizationGuard::new(
            store.clone(),
            Arc::new(navigator_at("/orders/12", 1)),
            &RealtimeConfig::default(),
        );

        // when (操作):
        let first = guard.reject("401").await;
        let second = guard.reject("401").await;

        // then (期待する結果):
        assert_eq!(first, RejectionOutcome::Redirected);
        assert_eq!(second, RejectionOutcome::RedirectPending);
        assert!(!store.is_signed_in());
    }

    #[tokio::test]
    async fn test_reject_on_entry_point_stays() {
        // テスト項目: 既に認証入口にいる場合は遷移しない（クエリ付きでも同様）
        // given (前提条件):
        let store = signed_in_store().await;
        let guard = AuthorizationGuard::new(
            store.clone(),
            Arc::new(navigator_at("/login?next=/orders", 0)),
            &RealtimeConfig::default(),
        );

        // when (操作):
        let outcome = guard.reject("403").await;

        // then (期待する結果):
        assert_eq!(outcome, RejectionOutcome::AlreadyOnEntryPoint);
        assert!(!store.is_signed_in());
    }

    #[tokio::test]
    async fn test_reset_allows_a_new_redirect() {
        // テスト項目: 再認証後の reset で、次の拒否時に再び遷移できる
        // given (前提条件):
        let store = signed_in_store().await;
        let guard = AuthorizationGuard::new(
            store,
            Arc::new(navigator_at("/messages", 2)),
            &RealtimeConfig::default(),
        );
        guard.reject("401").await;

        // when (操作):
        guard.reset();
        let outcome = guard.reject("401").await;

        // then (期待する結果):
        assert_eq!(outcome, RejectionOutcome::Redirected);
    }
}
