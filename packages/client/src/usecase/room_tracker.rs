//! UseCase: conversation room membership
//!
//! Joined rooms are remembered so that every freshly established channel
//! rejoins them, in join order, before any other command goes out.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{
    domain::{OutboundCommand, RealtimeError, RoomEntry, RoomKey, RoomMembership, SessionHook},
    usecase::ConnectionManager,
};

/// Replays and resets membership on behalf of the tracker.
///
/// Kept separate from `RoomTracker` so the connection does not own the tracker.
struct MembershipHook {
    membership: Arc<Mutex<RoomMembership>>,
}

#[async_trait]
impl SessionHook for MembershipHook {
    async fn replay_commands(&self) -> Vec<OutboundCommand> {
        self.membership.lock().await.join_commands()
    }

    async fn reset(&self) {
        let mut membership = self.membership.lock().await;
        if !membership.is_empty() {
            tracing::debug!("Forgetting {} joined room(s)", membership.len());
        }
        membership.clear();
    }
}

#[derive(Clone)]
pub struct RoomTracker {
    connection: ConnectionManager,
    membership: Arc<Mutex<RoomMembership>>,
}

impl RoomTracker {
    pub fn new(connection: ConnectionManager) -> Self {
        let membership = Arc::new(Mutex::new(RoomMembership::new()));
        connection.register_hook(Arc::new(MembershipHook {
            membership: Arc::clone(&membership),
        }));
        Self {
            connection,
            membership,
        }
    }

    /// Join a conversation room.
    ///
    /// The room is recorded before the join is emitted, so a channel that
    /// drops right after the emit still rejoins it. It is remembered even when
    /// the join could not be emitted, so the next established channel retries it.
    pub async fn join(
        &self,
        conversation_id: impl Into<String>,
        other_user_id: Option<String>,
        order_id: Option<String>,
    ) -> Result<(), RealtimeError> {
        let entry = RoomEntry {
            key: RoomKey::new(conversation_id, order_id),
            other_user_id,
        };

        // Connect before recording, so the handshake's own replay does not
        // carry the room and the join goes out once.
        let connected = self.connection.ensure_connected().await;
        let command = entry.join_command();
        let conversation_id = entry.key.conversation_id.clone();
        self.membership.lock().await.insert(entry);

        let result = match connected {
            Ok(()) => self.connection.emit(command).await,
            Err(e) => Err(e),
        };

        match &result {
            Ok(()) => tracing::info!("Joined conversation '{}'", conversation_id),
            Err(e) => tracing::warn!(
                "Join of conversation '{}' not sent ({}); retrying on next connect",
                conversation_id,
                e
            ),
        }
        result
    }

    /// Leave a conversation room.
    ///
    /// Membership is dropped before emitting, so a reconnect triggered by this
    /// very call does not rejoin the room.
    pub async fn leave(
        &self,
        conversation_id: impl Into<String>,
        order_id: Option<String>,
    ) -> Result<(), RealtimeError> {
        let key = RoomKey::new(conversation_id, order_id);
        self.membership.lock().await.remove(&key);

        let result = self
            .connection
            .emit(OutboundCommand::LeaveConversation {
                conversation_id: key.conversation_id.clone(),
                order_id: key.order_id,
            })
            .await;
        if result.is_ok() {
            tracing::info!("Left conversation '{}'", key.conversation_id);
        }
        result
    }

    pub async fn rooms(&self) -> Vec<RoomEntry> {
        self.membership.lock().await.iter().cloned().collect()
    }

    pub async fn is_member(&self, key: &RoomKey) -> bool {
        self.membership.lock().await.contains(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::TransportError,
        infrastructure::transport::{HandshakeOutcome, InMemoryTransport},
        usecase::connection_manager::test_support::*,
    };
    use serde_json::{Value, json};
    use std::time::Duration;

    fn frames(values: Vec<String>) -> Vec<Value> {
        values
            .iter()
            .map(|f| serde_json::from_str(f).unwrap())
            .collect()
    }

    async fn tracker(transport: &InMemoryTransport) -> (ConnectionManager, RoomTracker) {
        let manager = manager_with(fast_config(), transport, signed_in_store().await);
        let tracker = RoomTracker::new(manager.clone());
        (manager, tracker)
    }

    #[tokio::test]
    async fn test_rooms_rejoined_in_order_after_transport_drop() {
        // テスト項目: チャンネルが切れて再接続した場合、参加済みルームに参加順で再参加する
        // given (前提条件):
        let transport = InMemoryTransport::new();
        let (manager, tracker) = tracker(&transport).await;
        tracker.join("A", Some("8".to_string()), None).await.unwrap();
        tracker
            .join("B", None, Some("o1".to_string()))
            .await
            .unwrap();
        let first = transport.take_peer().unwrap();

        // when (操作):
        first.close("network down");
        wait_until(|| transport.opens() == 2 && manager.is_connected()).await;

        // then (期待する結果):
        let mut second = transport.take_peer().unwrap();
        assert_eq!(
            frames(second.drain()),
            vec![
                json!({"event": "join_conversation", "data": {"conversationId": "A", "otherUserId": "8"}}),
                json!({"event": "join_conversation", "data": {"conversationId": "B", "orderId": "o1"}}),
            ]
        );
    }

    #[tokio::test]
    async fn test_rejoin_precedes_commands_after_reconnect() {
        // テスト項目: 再接続後、再参加コマンドが呼び出し元のコマンドより先に送られる
        // given (前提条件):
        let transport = InMemoryTransport::new();
        let (manager, tracker) = tracker(&transport).await;
        tracker.join("A", None, None).await.unwrap();

        // when (操作):
        manager.force_reconnect().await.unwrap();
        manager
            .emit(OutboundCommand::TypingStart {
                recipient_id: "8".to_string(),
                conversation_id: Some("A".to_string()),
            })
            .await
            .unwrap();

        // then (期待する結果):
        let _first = transport.take_peer().unwrap();
        let mut second = transport.take_peer().unwrap();
        let events: Vec<String> = frames(second.drain())
            .iter()
            .map(|f| f["event"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(events, vec!["join_conversation", "typing_start"]);
    }

    #[tokio::test]
    async fn test_disconnect_forgets_rooms() {
        // テスト項目: 明示的な disconnect 後の connect では再参加しない
        // given (前提条件):
        let transport = InMemoryTransport::new();
        let (manager, tracker) = tracker(&transport).await;
        tracker.join("A", None, None).await.unwrap();

        // when (操作):
        manager.disconnect().await;
        manager.connect().await.unwrap();

        // then (期待する結果):
        let _first = transport.take_peer().unwrap();
        let mut second = transport.take_peer().unwrap();
        assert!(second.drain().is_empty());
        assert!(tracker.rooms().await.is_empty());
    }

    #[tokio::test]
    async fn test_leave_removes_room_and_emits() {
        // テスト項目: leave でルームが記録から消え、leave_conversation が送信される
        // given (前提条件):
        let transport = InMemoryTransport::new();
        let (_manager, tracker) = tracker(&transport).await;
        tracker.join("A", None, None).await.unwrap();

        // when (操作):
        tracker.leave("A", None).await.unwrap();

        // then (期待する結果):
        assert!(!tracker.is_member(&RoomKey::new("A", None)).await);
        let mut peer = transport.take_peer().unwrap();
        assert_eq!(
            frames(peer.drain()),
            vec![
                json!({"event": "join_conversation", "data": {"conversationId": "A"}}),
                json!({"event": "leave_conversation", "data": {"conversationId": "A"}}),
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_join_is_retried_on_next_connect() {
        // テスト項目: 送信できなかった join も記録され、次の接続で送られる
        // given (前提条件):
        let transport = InMemoryTransport::new();
        transport.push_outcomes((0..5).map(|_| {
            HandshakeOutcome::Fail(TransportError::Handshake("unreachable".to_string()))
        }));
        let (manager, tracker) = tracker(&transport).await;

        // when (操作):
        let result = tracker.join("A", None, None).await;
        manager.connect().await.unwrap();

        // then (期待する結果):
        assert_eq!(result, Err(RealtimeError::ConnectionRefused { attempts: 5 }));
        let mut peer = transport.take_peer().unwrap();
        assert_eq!(
            frames(peer.drain()),
            vec![json!({"event": "join_conversation", "data": {"conversationId": "A"}})]
        );
    }

    #[tokio::test]
    async fn test_repeated_join_keeps_one_entry() {
        // テスト項目: 同じルームへの重複 join は 1 件として記録される
        // given (前提条件):
        let transport = InMemoryTransport::new();
        let (_manager, tracker) = tracker(&transport).await;

        // when (操作):
        tracker.join("A", None, None).await.unwrap();
        tracker.join("A", Some("9".to_string()), None).await.unwrap();

        // then (期待する結果):
        let rooms = tracker.rooms().await;
        assert_eq!(rooms.len(), 1);
        assert_eq!(rooms[0].other_user_id.as_deref(), Some("9"));
    }

    #[tokio::test]
    async fn test_join_during_reconnect_is_remembered() {
        // テスト項目: 再接続中に join したルームは新しいチャンネルで 1 回だけ送られ、次の切断後にも再参加する
        // given (前提条件):
        let transport = InMemoryTransport::new().with_open_delay(Duration::from_millis(20));
        let (manager, tracker) = tracker(&transport).await;
        manager.connect().await.unwrap();
        let first = transport.take_peer().unwrap();
        first.close("network down");
        wait_until(|| manager.state() == crate::domain::ConnectionState::Reconnecting).await;

        // when (操作):
        tracker.join("A", None, None).await.unwrap();
        let mut second = transport.take_peer().unwrap();
        let sent_on_second = frames(second.drain());
        second.close("network down again");
        wait_until(|| transport.opens() == 3 && manager.is_connected()).await;

        // then (期待する結果):
        let join_a = json!({"event": "join_conversation", "data": {"conversationId": "A"}});
        assert_eq!(sent_on_second, vec![join_a.clone()]);
        let mut third = transport.take_peer().unwrap();
        assert_eq!(frames(third.drain()), vec![join_a]);
    }
}
