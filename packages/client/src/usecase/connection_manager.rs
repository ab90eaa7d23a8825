//! UseCase: the single authenticated realtime channel
//!
//! ## 概要
//!
//! 1 プロセスにつき 1 本のチャンネルを管理します。
//!
//! - 同時に呼ばれた `connect()` は 1 回のハンドシェイクを共有する
//! - 失敗した試行は固定間隔で再試行し、上限に達したら `Failed`
//! - チャンネルが切れたら自動で再接続し、`SessionHook` の再送コマンドを
//!   呼び出し元のコマンドより先に送る
//! - 資格情報が失効したらチャンネルを閉じる
//!
//! ## 世代番号
//!
//! `disconnect()` などでチャンネルを捨てるたびに世代番号を進めます。
//! 古い世代のハンドシェイクや受信タスクが後から状態を書き換えることはありません。

use std::sync::{
    Arc,
    atomic::{AtomicU32, Ordering},
};

use futures_util::{
    FutureExt,
    future::{BoxFuture, Shared},
};
use tokio::{
    sync::{Mutex, mpsc, watch},
    task::AbortHandle,
};

use crate::{
    config::RealtimeConfig,
    domain::{
        Channel, ChannelEvent, ConnectionState, Credential, InboundEvent, OutboundCommand,
        RealtimeError, ReconnectPolicy, SessionHook, Transport, TransportError,
    },
    infrastructure::dto::conversion::encode_command,
    usecase::{AuthorizationGuard, CredentialStore, EventDispatcher},
};

type PendingConnect = Shared<BoxFuture<'static, Result<(), RealtimeError>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HandshakeKind {
    Initial,
    Reconnect,
}

#[derive(Default)]
struct Session {
    generation: u64,
    channel: Option<mpsc::UnboundedSender<String>>,
    pending: Option<PendingConnect>,
    handshake_task: Option<AbortHandle>,
    reader_task: Option<AbortHandle>,
}

impl Session {
    /// Drop the channel and stop its tasks. Returns whether a channel was open.
    fn discard(&mut self, abort_reader: bool) -> bool {
        self.generation += 1;
        self.pending = None;
        if let Some(task) = self.handshake_task.take() {
            task.abort();
        }
        if let Some(task) = self.reader_task.take()
            && abort_reader
        {
            task.abort();
        }
        self.channel.take().is_some()
    }
}

struct Inner {
    config: RealtimeConfig,
    policy: ReconnectPolicy,
    transport: Arc<dyn Transport>,
    credentials: CredentialStore,
    dispatcher: EventDispatcher,
    guard: Option<Arc<AuthorizationGuard>>,
    hooks: parking_lot::RwLock<Vec<Arc<dyn SessionHook>>>,
    state: watch::Sender<ConnectionState>,
    attempts: AtomicU32,
    session: Mutex<Session>,
}

/// Owner of the realtime channel
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

impl ConnectionManager {
    pub fn new(
        config: RealtimeConfig,
        transport: Arc<dyn Transport>,
        credentials: CredentialStore,
        dispatcher: EventDispatcher,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            inner: Arc::new(Inner {
                policy: config.reconnect_policy(),
                config,
                transport,
                credentials,
                dispatcher,
                guard: None,
                hooks: parking_lot::RwLock::new(Vec::new()),
                state,
                attempts: AtomicU32::new(0),
                session: Mutex::new(Session::default()),
            }),
        }
    }

    /// Route handshake rejections through `guard` instead of a plain store clear.
    ///
    /// Must be called before the manager is cloned.
    pub fn with_authorization_guard(mut self, guard: Arc<AuthorizationGuard>) -> Self {
        match Arc::get_mut(&mut self.inner) {
            Some(inner) => inner.guard = Some(guard),
            None => tracing::warn!("Authorization guard ignored: manager already shared"),
        }
        self
    }

    pub fn register_hook(&self, hook: Arc<dyn SessionHook>) {
        self.inner.hooks.write().push(hook);
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// Failed attempts in the current handshake run
    pub fn attempts(&self) -> u32 {
        self.inner.attempts.load(Ordering::SeqCst)
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Establish the channel, or join the handshake already in flight.
    ///
    /// # Errors
    ///
    /// - `NoCredential` / `InvalidCredential` before any network attempt
    /// - `ConnectionRefused` once the retry budget is spent or the server
    ///   rejects the credential
    /// - `ConnectionTimeout` if the whole run exceeds `connect_timeout`
    /// - `ConnectionAborted` if `disconnect()` cancels the run
    pub async fn connect(&self) -> Result<(), RealtimeError> {
        let pending = {
            let mut session = self.inner.session.lock().await;
            if session.channel.is_some() && self.is_connected() {
                return Ok(());
            }
            match &session.pending {
                Some(pending) => {
                    tracing::debug!("Joining in-flight connect");
                    pending.clone()
                }
                None => {
                    self.inner.usable_credential().await?;
                    Inner::start_handshake(&self.inner, &mut session, HandshakeKind::Initial)
                }
            }
        };
        pending.await
    }

    pub async fn ensure_connected(&self) -> Result<(), RealtimeError> {
        if self.is_connected() {
            return Ok(());
        }
        self.connect().await
    }

    /// Close the channel and cancel any handshake. Safe in any state.
    ///
    /// Session hooks are reset, so rooms joined before are not rejoined by
    /// the next `connect()`.
    pub async fn disconnect(&self) {
        self.inner.teardown("client disconnect", None).await;
    }

    /// Drop the current channel and handshake anew, replaying session hooks.
    pub async fn force_reconnect(&self) -> Result<(), RealtimeError> {
        let pending = {
            let mut session = self.inner.session.lock().await;
            self.inner.usable_credential().await?;
            if session.discard(true) {
                self.inner.dispatcher.dispatch(&InboundEvent::Disconnected {
                    reason: "forced reconnect".to_string(),
                });
            }
            tracing::info!("Forcing reconnect");
            Inner::start_handshake(&self.inner, &mut session, HandshakeKind::Reconnect)
        };
        pending.await
    }

    /// Send a command over the channel, connecting first if needed.
    ///
    /// Commands are never queued: if the channel is not usable once the
    /// connect settles, the command fails and is dropped.
    pub async fn emit(&self, command: OutboundCommand) -> Result<(), RealtimeError> {
        self.ensure_connected().await?;
        let text = encode_command(&command).map_err(|e| RealtimeError::Encode(e.to_string()))?;

        let session = self.inner.session.lock().await;
        let sent = match (&session.channel, self.is_connected()) {
            (Some(channel), true) => channel.send(text).is_ok(),
            _ => false,
        };
        if !sent {
            tracing::warn!("Dropped '{}': channel not established", command.name());
            return Err(RealtimeError::EmitWhileDisconnected(command.name()));
        }

        tracing::debug!("Emitted '{}'", command.name());
        Ok(())
    }
}

impl Inner {
    /// Held credential, if it can still be presented.
    async fn usable_credential(&self) -> Result<Credential, RealtimeError> {
        let credential = self
            .credentials
            .credential()
            .await
            .ok_or(RealtimeError::NoCredential)?;

        if let Err(e) = self.credentials.validator().check(&credential) {
            tracing::warn!("Held credential is no longer usable: {}", e);
            self.credentials.invalidate("credential expired").await;
            return Err(RealtimeError::InvalidCredential);
        }
        Ok(credential)
    }

    fn start_handshake(
        self: &Arc<Self>,
        session: &mut Session,
        kind: HandshakeKind,
    ) -> PendingConnect {
        session.generation += 1;
        let generation = session.generation;
        self.attempts.store(0, Ordering::SeqCst);
        self.state.send_replace(match kind {
            HandshakeKind::Initial => ConnectionState::Connecting,
            HandshakeKind::Reconnect => ConnectionState::Reconnecting,
        });

        let task = tokio::spawn(Inner::run_handshake(Arc::clone(self), generation));
        session.handshake_task = Some(task.abort_handle());

        let pending = async move {
            match task.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    if !e.is_cancelled() {
                        tracing::error!("Handshake task failed: {}", e);
                    }
                    Err(RealtimeError::ConnectionAborted)
                }
            }
        }
        .boxed()
        .shared();
        session.pending = Some(pending.clone());
        pending
    }

    async fn run_handshake(self: Arc<Self>, generation: u64) -> Result<(), RealtimeError> {
        let bound = self.config.connect_timeout;
        let outcome = match tokio::time::timeout(bound, self.attempt_loop(generation)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                tracing::warn!("Channel not established within {:?}", bound);
                Err(RealtimeError::ConnectionTimeout(bound))
            }
        };

        let mut session = self.session.lock().await;
        if session.generation == generation {
            session.pending = None;
            session.handshake_task = None;
            if let Err(e) = &outcome {
                self.state.send_replace(match e {
                    RealtimeError::ConnectionRefused { .. } => ConnectionState::Failed,
                    _ => ConnectionState::Disconnected,
                });
            }
        }
        outcome
    }

    async fn attempt_loop(self: &Arc<Self>, generation: u64) -> Result<(), RealtimeError> {
        loop {
            // Re-checked on every attempt: the credential may expire mid-run.
            let credential = self.usable_credential().await?;
            tracing::debug!(
                "Handshake attempt {}/{} to {}",
                self.attempts.load(Ordering::SeqCst) + 1,
                self.policy.max_attempts,
                self.config.url
            );

            let bound = self.config.handshake_timeout;
            let error = match tokio::time::timeout(bound, self.transport.open(&credential)).await {
                Ok(Ok(channel)) => return self.establish(generation, channel).await,
                Ok(Err(e)) => e,
                Err(_) => TransportError::Timeout(bound),
            };

            let failed = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            tracing::warn!(
                "Handshake attempt {}/{} failed: {}",
                failed,
                self.policy.max_attempts,
                error
            );
            self.dispatcher.dispatch(&InboundEvent::ConnectError {
                reason: error.to_string(),
            });

            if !self.policy.should_attempt_reconnect(&error, failed) {
                if ReconnectPolicy::should_give_up_immediately(&error) {
                    self.handle_rejection(&error).await;
                }
                tracing::error!("Giving up after {} attempt(s)", failed);
                return Err(RealtimeError::ConnectionRefused { attempts: failed });
            }

            if !self
                .set_state_if_current(generation, ConnectionState::Reconnecting)
                .await
            {
                return Err(RealtimeError::ConnectionAborted);
            }
            tokio::time::sleep(self.policy.delay).await;
        }
    }

    async fn handle_rejection(&self, error: &TransportError) {
        let reason = error.to_string();
        match &self.guard {
            Some(guard) => {
                guard.reject(&reason).await;
            }
            None => self.credentials.invalidate(&reason).await,
        }
    }

    async fn set_state_if_current(&self, generation: u64, state: ConnectionState) -> bool {
        let session = self.session.lock().await;
        if session.generation != generation {
            return false;
        }
        self.state.send_replace(state);
        true
    }

    fn hooks(&self) -> Vec<Arc<dyn SessionHook>> {
        self.hooks.read().clone()
    }

    /// Install a freshly opened channel.
    ///
    /// Replayed commands are written before the channel becomes visible to
    /// `emit()`, so they precede every caller command on the new channel.
    async fn establish(
        self: &Arc<Self>,
        generation: u64,
        channel: Channel,
    ) -> Result<(), RealtimeError> {
        let Channel { outbound, inbound } = channel;

        let mut replay = Vec::new();
        for hook in self.hooks() {
            replay.extend(hook.replay_commands().await);
        }

        let mut session = self.session.lock().await;
        if session.generation != generation {
            tracing::debug!("Discarding channel of a cancelled handshake");
            return Err(RealtimeError::ConnectionAborted);
        }

        // Subscribed before the channel is installed so a revocation racing
        // the handshake is either caught here or seen by the reader.
        let signed_in = self.credentials.subscribe();
        if !*signed_in.borrow() {
            tracing::warn!("Credential revoked during handshake; discarding channel");
            return Err(RealtimeError::NoCredential);
        }
        self.usable_credential().await?;

        for command in &replay {
            let sent = encode_command(command)
                .map_err(|e| e.to_string())
                .and_then(|text| outbound.send(text).map_err(|e| e.to_string()));
            if let Err(e) = sent {
                tracing::warn!("Failed to replay '{}': {}", command.name(), e);
            }
        }

        session.channel = Some(outbound);
        let reader = tokio::spawn(Inner::read_loop(
            Arc::clone(self),
            generation,
            inbound,
            signed_in,
        ));
        session.reader_task = Some(reader.abort_handle());
        self.attempts.store(0, Ordering::SeqCst);
        self.state.send_replace(ConnectionState::Connected);

        tracing::info!(
            "Realtime channel established ({} command(s) replayed)",
            replay.len()
        );
        self.dispatcher.dispatch(&InboundEvent::Connected);
        Ok(())
    }

    async fn read_loop(
        self: Arc<Self>,
        generation: u64,
        mut inbound: mpsc::UnboundedReceiver<ChannelEvent>,
        mut signed_in: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                event = inbound.recv() => match event {
                    Some(ChannelEvent::Frame(text)) => {
                        let _ = self.dispatcher.dispatch_frame(&text);
                    }
                    Some(ChannelEvent::Closed(reason)) => {
                        let reason = reason.unwrap_or_else(|| "transport close".to_string());
                        self.on_channel_lost(generation, reason).await;
                        return;
                    }
                    None => {
                        self.on_channel_lost(generation, "transport close".to_string()).await;
                        return;
                    }
                },
                changed = signed_in.changed() => {
                    if changed.is_err() || !*signed_in.borrow_and_update() {
                        tracing::warn!("Credential revoked; closing realtime channel");
                        self.teardown("credential revoked", Some(generation)).await;
                        return;
                    }
                }
            }
        }
    }

    async fn on_channel_lost(self: &Arc<Self>, generation: u64, reason: String) {
        let mut session = self.session.lock().await;
        if session.generation != generation {
            return;
        }

        tracing::warn!("Realtime channel lost: {}", reason);
        session.channel = None;
        session.reader_task = None;
        self.dispatcher
            .dispatch(&InboundEvent::Disconnected { reason });

        if self.credentials.is_signed_in() {
            drop(Inner::start_handshake(self, &mut session, HandshakeKind::Reconnect));
        } else {
            self.state.send_replace(ConnectionState::Disconnected);
        }
    }

    /// Close everything and reset session hooks.
    ///
    /// `reader_generation` is set when called from the reader task itself,
    /// which must not abort its own task.
    async fn teardown(&self, reason: &str, reader_generation: Option<u64>) {
        {
            let mut session = self.session.lock().await;
            if let Some(generation) = reader_generation
                && session.generation != generation
            {
                return;
            }

            let had_channel = session.discard(reader_generation.is_none());
            self.attempts.store(0, Ordering::SeqCst);
            self.state.send_replace(ConnectionState::Disconnected);
            if had_channel {
                self.dispatcher.dispatch(&InboundEvent::Disconnected {
                    reason: reason.to_string(),
                });
            }
        }

        for hook in self.hooks() {
            hook.reset().await;
        }
        tracing::info!("Realtime channel closed: {}", reason);
    }
}
