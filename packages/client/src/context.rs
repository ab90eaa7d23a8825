//! Explicitly constructed process-wide realtime context.
//!
//! Construct one at process start, call [`RealtimeContext::start`], hand
//! references to collaborators, and call [`RealtimeContext::shutdown`] before
//! exit. It owns the one credential store and the one channel of the process.

use std::sync::Arc;

use crate::{
    config::RealtimeConfig,
    domain::{
        ConnectionState, CredentialError, CredentialStorage, EventCategory, Identity,
        IdentityPatch, InboundEvent, Navigator, OutboundCommand, RealtimeError, TokenValidator,
        Transport,
    },
    usecase::{
        AuthorizationGuard, ConnectionManager, CredentialStore, EventDispatcher, ListenerResult,
        RejectionOutcome, RoomTracker, Subscription,
    },
};

pub struct RealtimeContext {
    credentials: CredentialStore,
    guard: Arc<AuthorizationGuard>,
    dispatcher: EventDispatcher,
    connection: ConnectionManager,
    rooms: RoomTracker,
}

impl RealtimeContext {
    pub fn new(
        config: RealtimeConfig,
        transport: Arc<dyn Transport>,
        storage: Arc<dyn CredentialStorage>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self::with_validator(config, transport, storage, navigator, TokenValidator::system())
    }

    pub fn with_validator(
        config: RealtimeConfig,
        transport: Arc<dyn Transport>,
        storage: Arc<dyn CredentialStorage>,
        navigator: Arc<dyn Navigator>,
        validator: TokenValidator,
    ) -> Self {
        let credentials = CredentialStore::new(storage, validator);
        let guard = Arc::new(AuthorizationGuard::new(
            credentials.clone(),
            navigator,
            &config,
        ));
        let dispatcher = EventDispatcher::new();
        let connection =
            ConnectionManager::new(config, transport, credentials.clone(), dispatcher.clone())
                .with_authorization_guard(Arc::clone(&guard));
        let rooms = RoomTracker::new(connection.clone());

        Self {
            credentials,
            guard,
            dispatcher,
            connection,
            rooms,
        }
    }

    /// Restore the persisted session. Does not connect.
    pub async fn start(&self) {
        self.credentials.initialize().await;
        match self.credentials.identity().await {
            Some(identity) => tracing::info!(
                "Realtime context started for user '{}' ({})",
                identity.id,
                identity.role
            ),
            None => tracing::info!("Realtime context started signed out"),
        }
    }

    /// Close the channel and stop background timers.
    pub async fn shutdown(&self) {
        self.connection.disconnect().await;
        self.credentials.shutdown();
        tracing::info!("Realtime context shut down");
    }

    pub async fn login(&self, credential: &str, identity: Identity) -> Result<(), CredentialError> {
        self.credentials.login(credential, identity).await?;
        self.guard.reset();
        Ok(())
    }

    pub async fn logout(&self) {
        self.connection.disconnect().await;
        self.credentials.logout().await;
    }

    pub async fn update_identity(&self, patch: IdentityPatch) -> Result<Identity, CredentialError> {
        self.credentials.update_identity(patch).await
    }

    /// Report an authorization rejection observed outside the channel,
    /// e.g. an HTTP 401 from an API call.
    pub async fn handle_authorization_rejection(&self, reason: &str) -> RejectionOutcome {
        self.guard.reject(reason).await
    }

    pub async fn connect(&self) -> Result<(), RealtimeError> {
        self.connection.connect().await
    }

    pub async fn ensure_connected(&self) -> Result<(), RealtimeError> {
        self.connection.ensure_connected().await
    }

    pub async fn disconnect(&self) {
        self.connection.disconnect().await;
    }

    pub async fn force_reconnect(&self) -> Result<(), RealtimeError> {
        self.connection.force_reconnect().await
    }

    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub async fn send_message(
        &self,
        recipient_id: impl Into<String>,
        content: impl Into<String>,
        message_type: Option<String>,
        order_id: Option<String>,
    ) -> Result<(), RealtimeError> {
        self.connection
            .emit(OutboundCommand::SendMessage {
                recipient_id: recipient_id.into(),
                content: content.into(),
                message_type,
                order_id,
            })
            .await
    }

    pub async fn start_typing(
        &self,
        recipient_id: impl Into<String>,
        conversation_id: Option<String>,
    ) -> Result<(), RealtimeError> {
        self.connection
            .emit(OutboundCommand::TypingStart {
                recipient_id: recipient_id.into(),
                conversation_id,
            })
            .await
    }

    pub async fn stop_typing(
        &self,
        recipient_id: impl Into<String>,
        conversation_id: Option<String>,
    ) -> Result<(), RealtimeError> {
        self.connection
            .emit(OutboundCommand::TypingStop {
                recipient_id: recipient_id.into(),
                conversation_id,
            })
            .await
    }

    pub async fn join(
        &self,
        conversation_id: impl Into<String>,
        other_user_id: Option<String>,
        order_id: Option<String>,
    ) -> Result<(), RealtimeError> {
        self.rooms.join(conversation_id, other_user_id, order_id).await
    }

    pub async fn leave(
        &self,
        conversation_id: impl Into<String>,
        order_id: Option<String>,
    ) -> Result<(), RealtimeError> {
        self.rooms.leave(conversation_id, order_id).await
    }

    /// Subscribe to one event category.
    ///
    /// Dropping the returned `Subscription` keeps the listener; call
    /// `unsubscribe()` to remove it.
    pub fn on<F>(&self, category: EventCategory, callback: F) -> Subscription
    where
        F: Fn(&InboundEvent) -> ListenerResult + Send + Sync + 'static,
    {
        self.dispatcher.subscribe(category, callback)
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    pub fn rooms(&self) -> &RoomTracker {
        &self.rooms
    }
}
