//! UseCase: リアルタイムイベントの中継
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - RelayUseCase の接続登録、ルーム参加・退出、メッセージ中継、入力中通知、提案通知
//!
//! ### なぜこのテストが必要か
//! - メッセージが受信者の全接続に届き、送信者には確認が返ることを保証
//! - 空メッセージや連絡先を含むメッセージが中継されないことを保証
//! - 提案の状態更新が注文のルームに参加している接続にだけ届くことを保証
//!
//! ### どのような状況を想定しているか
//! - 正常系：メッセージ送信、入力中通知、ルーム参加
//! - 異常系：未登録の接続、未対応のイベント、不正なペイロード
//! - エッジケース：同じルームへの重複参加、受信者が未接続

use std::collections::{HashMap, HashSet};

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use tokio::sync::{Mutex, mpsc};
use uuid::Uuid;

use crate::{
    domain::{ContentVerdict, RoomKey, inspect_content},
    infrastructure::dto::websocket::{
        ClientFrame, DeliveryFailureDto, JoinConversationPayload, LeaveConversationPayload,
        MessageDto, ProposalUpdatedDto, SendMessagePayload, ServerFrame, TypingPayload,
        TypingSignalDto,
    },
};
use ichiba_shared::time::{get_timestamp_millis, timestamp_to_jst_rfc3339};

use super::error::RelayError;

/// Channel used to push text frames to one connection
pub type PusherChannel = mpsc::UnboundedSender<String>;

const DEFAULT_MESSAGE_TYPE: &str = "text";

/// Result of a `send_message` frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Relayed to this many recipient connections
    Delivered { message_id: String, recipients: usize },
    /// Answered with `message_error` or `message_filtered`
    Refused(ContentVerdict),
}

struct Connection {
    user_id: String,
    sender: PusherChannel,
    rooms: HashSet<RoomKey>,
}

/// 接続中の利用者の間でイベントを中継するユースケース
pub struct RelayUseCase {
    connections: Mutex<HashMap<Uuid, Connection>>,
}

impl Default for RelayUseCase {
    fn default() -> Self {
        Self::new()
    }
}

impl RelayUseCase {
    pub fn new() -> Self {
        Self {
            connections: Mutex::new(HashMap::new()),
        }
    }

    /// 接続を登録し、接続 ID を返す
    pub async fn register(&self, user_id: String, sender: PusherChannel) -> Uuid {
        let connection_id = Uuid::new_v4();
        tracing::info!("User '{}' connected as {}", user_id, connection_id);
        self.connections.lock().await.insert(
            connection_id,
            Connection {
                user_id,
                sender,
                rooms: HashSet::new(),
            },
        );
        connection_id
    }

    pub async fn unregister(&self, connection_id: Uuid) {
        if let Some(connection) = self.connections.lock().await.remove(&connection_id) {
            tracing::info!(
                "User '{}' disconnected ({}), left {} room(s)",
                connection.user_id,
                connection_id,
                connection.rooms.len()
            );
        }
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.lock().await.len()
    }

    /// 接続が参加しているルーム
    pub async fn rooms_of(&self, connection_id: Uuid) -> Result<HashSet<RoomKey>, RelayError> {
        let connections = self.connections.lock().await;
        let connection = connections
            .get(&connection_id)
            .ok_or(RelayError::UnknownConnection(connection_id))?;
        Ok(connection.rooms.clone())
    }

    /// クライアントから受信したテキストフレームを処理する
    pub async fn handle_frame(&self, connection_id: Uuid, text: &str) -> Result<(), RelayError> {
        let frame: ClientFrame =
            serde_json::from_str(text).map_err(|e| RelayError::MalformedFrame(e.to_string()))?;

        match frame.event.as_str() {
            "join_conversation" => {
                let payload: JoinConversationPayload = payload(&frame.event, frame.data)?;
                self.join(
                    connection_id,
                    RoomKey::new(payload.conversation_id, payload.order_id),
                )
                .await
            }
            "leave_conversation" => {
                let payload: LeaveConversationPayload = payload(&frame.event, frame.data)?;
                self.leave(
                    connection_id,
                    &RoomKey::new(payload.conversation_id, payload.order_id),
                )
                .await
            }
            "send_message" => {
                let payload: SendMessagePayload = payload(&frame.event, frame.data)?;
                self.send_message(connection_id, payload).await.map(|_| ())
            }
            "typing_start" => {
                let payload: TypingPayload = payload(&frame.event, frame.data)?;
                self.relay_typing(connection_id, payload, true)
                    .await
                    .map(|_| ())
            }
            "typing_stop" => {
                let payload: TypingPayload = payload(&frame.event, frame.data)?;
                self.relay_typing(connection_id, payload, false)
                    .await
                    .map(|_| ())
            }
            other => Err(RelayError::UnsupportedEvent(other.to_string())),
        }
    }

    /// ルームに参加する（同じルームへの再参加は何もしない）
    pub async fn join(&self, connection_id: Uuid, room: RoomKey) -> Result<(), RelayError> {
        let mut connections = self.connections.lock().await;
        let connection = connections
            .get_mut(&connection_id)
            .ok_or(RelayError::UnknownConnection(connection_id))?;
        tracing::debug!("User '{}' joined {}", connection.user_id, room);
        connection.rooms.insert(room);
        Ok(())
    }

    pub async fn leave(&self, connection_id: Uuid, room: &RoomKey) -> Result<(), RelayError> {
        let mut connections = self.connections.lock().await;
        let connection = connections
            .get_mut(&connection_id)
            .ok_or(RelayError::UnknownConnection(connection_id))?;
        if connection.rooms.remove(room) {
            tracing::debug!("User '{}' left {}", connection.user_id, room);
        }
        Ok(())
    }

    /// メッセージを受信者の全接続へ中継し、送信者に確認を返す
    ///
    /// 空のメッセージには `message_error`、連絡先を含むメッセージには
    /// `message_filtered` を送信者に返し、中継しない。
    pub async fn send_message(
        &self,
        connection_id: Uuid,
        payload: SendMessagePayload,
    ) -> Result<SendOutcome, RelayError> {
        let connections = self.connections.lock().await;
        let origin = connections
            .get(&connection_id)
            .ok_or(RelayError::UnknownConnection(connection_id))?;

        let verdict = inspect_content(&payload.content);
        let refusal = match verdict {
            ContentVerdict::Accepted => None,
            ContentVerdict::Empty => Some(("message_error", "message content is empty")),
            ContentVerdict::ContactDetails => Some((
                "message_filtered",
                "sharing contact details is not allowed",
            )),
        };
        if let Some((event, reason)) = refusal {
            tracing::info!("Refused message from '{}': {}", origin.user_id, reason);
            let frame = ServerFrame::new(
                event,
                DeliveryFailureDto {
                    reason: reason.to_string(),
                },
            );
            push(origin, &frame)?;
            return Ok(SendOutcome::Refused(verdict));
        }

        let message = MessageDto {
            id: Uuid::new_v4().to_string(),
            sender_id: origin.user_id.clone(),
            recipient_id: payload.recipient_id,
            content: payload.content,
            message_type: payload
                .message_type
                .unwrap_or_else(|| DEFAULT_MESSAGE_TYPE.to_string()),
            order_id: payload.order_id,
            created_at: timestamp_to_jst_rfc3339(get_timestamp_millis()).unwrap_or_default(),
        };

        let delivery = ServerFrame::new("newMessage", &message).to_text()?;
        let recipients = connections
            .values()
            .filter(|c| c.user_id == message.recipient_id)
            .filter(|c| c.sender.send(delivery.clone()).is_ok())
            .count();
        push(origin, &ServerFrame::new("message_sent", &message))?;

        tracing::info!(
            "Relayed message {} from '{}' to '{}' ({} connection(s))",
            message.id,
            message.sender_id,
            message.recipient_id,
            recipients
        );
        Ok(SendOutcome::Delivered {
            message_id: message.id,
            recipients,
        })
    }

    /// 入力中通知を受信者の全接続へ中継し、届いた接続数を返す
    pub async fn relay_typing(
        &self,
        connection_id: Uuid,
        payload: TypingPayload,
        typing: bool,
    ) -> Result<usize, RelayError> {
        let connections = self.connections.lock().await;
        let origin = connections
            .get(&connection_id)
            .ok_or(RelayError::UnknownConnection(connection_id))?;

        let event = if typing {
            "user_typing"
        } else {
            "user_stopped_typing"
        };
        let text = ServerFrame::new(
            event,
            TypingSignalDto {
                user_id: origin.user_id.clone(),
                conversation_id: payload.conversation_id,
            },
        )
        .to_text()?;

        Ok(connections
            .values()
            .filter(|c| c.user_id == payload.recipient_id)
            .filter(|c| c.sender.send(text.clone()).is_ok())
            .count())
    }

    /// 注文に紐づくルームに参加している全接続へ提案の状態更新を通知する
    pub async fn notify_proposal(
        &self,
        order_id: &str,
        proposal_id: &str,
        status: &str,
    ) -> Result<usize, RelayError> {
        let text = ServerFrame::new(
            "proposal_updated",
            ProposalUpdatedDto {
                proposal_id: proposal_id.to_string(),
                status: status.to_string(),
                order_id: order_id.to_string(),
            },
        )
        .to_text()?;

        let connections = self.connections.lock().await;
        let delivered = connections
            .values()
            .filter(|c| {
                c.rooms
                    .iter()
                    .any(|room| room.order_id.as_deref() == Some(order_id))
            })
            .filter(|c| c.sender.send(text.clone()).is_ok())
            .count();
        tracing::info!(
            "Proposal {} of order {} is now '{}' ({} connection(s))",
            proposal_id,
            order_id,
            status,
            delivered
        );
        Ok(delivered)
    }
}

fn payload<T: DeserializeOwned>(event: &str, data: Value) -> Result<T, RelayError> {
    serde_json::from_value(data)
        .map_err(|e| RelayError::MalformedFrame(format!("'{}' payload: {}", event, e)))
}

fn push<T: Serialize>(connection: &Connection, frame: &ServerFrame<T>) -> Result<(), RelayError> {
    let text = frame.to_text()?;
    if connection.sender.send(text).is_err() {
        tracing::warn!("Connection of '{}' is closing", connection.user_id);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn connect(
        usecase: &RelayUseCase,
        user_id: &str,
    ) -> (Uuid, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = usecase.register(user_id.to_string(), tx).await;
        (id, rx)
    }

    fn next_frame(rx: &mut mpsc::UnboundedReceiver<String>) -> Value {
        let text = rx.try_recv().expect("a frame should have been pushed");
        serde_json::from_str(&text).unwrap()
    }

    #[tokio::test]
    async fn test_send_message_reaches_every_recipient_connection() {
        // テスト項目: メッセージが受信者の全接続に届き、送信者には message_sent が返る
        // given (前提条件):
        let usecase = RelayUseCase::new();
        let (alice, mut alice_rx) = connect(&usecase, "7").await;
        let (_, mut bob_phone) = connect(&usecase, "8").await;
        let (_, mut bob_laptop) = connect(&usecase, "8").await;
        let (_, mut carol_rx) = connect(&usecase, "9").await;

        // when (操作):
        let frame = json!({
            "event": "send_message",
            "data": {"recipientId": 8, "content": "Hello!", "orderId": 77}
        });
        let result = usecase.handle_frame(alice, &frame.to_string()).await;

        // then (期待する結果):
        assert!(result.is_ok());
        for rx in [&mut bob_phone, &mut bob_laptop] {
            let delivered = next_frame(rx);
            assert_eq!(delivered["event"], "newMessage");
            assert_eq!(delivered["data"]["senderId"], "7");
            assert_eq!(delivered["data"]["recipientId"], "8");
            assert_eq!(delivered["data"]["content"], "Hello!");
            assert_eq!(delivered["data"]["messageType"], "text");
            assert_eq!(delivered["data"]["orderId"], "77");
        }
        let ack = next_frame(&mut alice_rx);
        assert_eq!(ack["event"], "message_sent");
        assert!(ack["data"]["createdAt"].as_str().unwrap().ends_with("+09:00"));
        assert!(carol_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_send_message_refuses_empty_and_contact_details() {
        // テスト項目: 空メッセージは message_error、連絡先を含むメッセージは message_filtered になる
        // given (前提条件):
        let usecase = RelayUseCase::new();
        let (alice, mut alice_rx) = connect(&usecase, "7").await;
        let (_, mut bob_rx) = connect(&usecase, "8").await;
        let message = |content: &str| SendMessagePayload {
            recipient_id: "8".to_string(),
            content: content.to_string(),
            message_type: None,
            order_id: None,
        };

        // when (操作):
        let empty = usecase.send_message(alice, message("  ")).await;
        let filtered = usecase
            .send_message(alice, message("mail me: aiko@example.com"))
            .await;

        // then (期待する結果):
        assert_eq!(empty, Ok(SendOutcome::Refused(ContentVerdict::Empty)));
        assert_eq!(
            filtered,
            Ok(SendOutcome::Refused(ContentVerdict::ContactDetails))
        );
        assert_eq!(next_frame(&mut alice_rx)["event"], "message_error");
        assert_eq!(next_frame(&mut alice_rx)["event"], "message_filtered");
        assert!(bob_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_send_message_to_offline_recipient() {
        // テスト項目: 受信者が未接続でも送信者には確認が返り、配送数は 0 になる
        // given (前提条件):
        let usecase = RelayUseCase::new();
        let (alice, mut alice_rx) = connect(&usecase, "7").await;

        // when (操作):
        let outcome = usecase
            .send_message(
                alice,
                SendMessagePayload {
                    recipient_id: "8".to_string(),
                    content: "are you there?".to_string(),
                    message_type: Some("text".to_string()),
                    order_id: None,
                },
            )
            .await
            .unwrap();

        // then (期待する結果):
        assert!(matches!(
            outcome,
            SendOutcome::Delivered { recipients: 0, .. }
        ));
        assert_eq!(next_frame(&mut alice_rx)["event"], "message_sent");
    }

    #[tokio::test]
    async fn test_typing_is_relayed_to_recipient() {
        // テスト項目: typing_start / typing_stop が user_typing / user_stopped_typing として中継される
        // given (前提条件):
        let usecase = RelayUseCase::new();
        let (alice, _alice_rx) = connect(&usecase, "7").await;
        let (_, mut bob_rx) = connect(&usecase, "8").await;

        // when (操作):
        let start = json!({"event": "typing_start", "data": {"recipientId": "8", "conversationId": "c1"}});
        let stop = json!({"event": "typing_stop", "data": {"recipientId": "8"}});
        usecase.handle_frame(alice, &start.to_string()).await.unwrap();
        usecase.handle_frame(alice, &stop.to_string()).await.unwrap();

        // then (期待する結果):
        assert_eq!(
            next_frame(&mut bob_rx),
            json!({"event": "user_typing", "data": {"userId": "7", "conversationId": "c1"}})
        );
        assert_eq!(
            next_frame(&mut bob_rx),
            json!({"event": "user_stopped_typing", "data": {"userId": "7"}})
        );
    }

    #[tokio::test]
    async fn test_join_is_idempotent_and_leave_removes() {
        // テスト項目: 同じルームへの重複参加は 1 件として扱われ、退出で削除される
        // given (前提条件):
        let usecase = RelayUseCase::new();
        let (alice, _rx) = connect(&usecase, "7").await;
        let join = json!({"event": "join_conversation", "data": {"conversationId": "c1", "orderId": "o1"}});

        // when (操作):
        usecase.handle_frame(alice, &join.to_string()).await.unwrap();
        usecase.handle_frame(alice, &join.to_string()).await.unwrap();
        let joined = usecase.rooms_of(alice).await.unwrap();
        let leave = json!({"event": "leave_conversation", "data": {"conversationId": "c1", "orderId": "o1"}});
        usecase.handle_frame(alice, &leave.to_string()).await.unwrap();
        let left = usecase.rooms_of(alice).await.unwrap();

        // then (期待する結果):
        assert_eq!(joined.len(), 1);
        assert!(joined.contains(&RoomKey::new("c1", Some("o1".to_string()))));
        assert!(left.is_empty());
    }

    #[tokio::test]
    async fn test_notify_proposal_reaches_order_rooms_only() {
        // テスト項目: 提案の状態更新は該当する注文のルームに参加している接続にだけ届く
        // given (前提条件):
        let usecase = RelayUseCase::new();
        let (alice, mut alice_rx) = connect(&usecase, "7").await;
        let (bob, mut bob_rx) = connect(&usecase, "8").await;
        usecase
            .join(alice, RoomKey::new("c1", Some("o1".to_string())))
            .await
            .unwrap();
        usecase
            .join(bob, RoomKey::new("c2", Some("o2".to_string())))
            .await
            .unwrap();

        // when (操作):
        let delivered = usecase.notify_proposal("o1", "p1", "accepted").await;

        // then (期待する結果):
        assert_eq!(delivered, Ok(1));
        assert_eq!(
            next_frame(&mut alice_rx),
            json!({"event": "proposal_updated", "data": {"proposalId": "p1", "status": "accepted", "orderId": "o1"}})
        );
        assert!(bob_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_rejects_unknown_connection_and_bad_frames() {
        // テスト項目: 未登録の接続、未対応のイベント、不正なペイロードはエラーになる
        // given (前提条件):
        let usecase = RelayUseCase::new();
        let (alice, _rx) = connect(&usecase, "7").await;
        let stranger = Uuid::new_v4();

        // when (操作):
        let unknown = usecase
            .join(stranger, RoomKey::new("c1", None))
            .await;
        let unsupported = usecase
            .handle_frame(alice, r#"{"event":"dance","data":{}}"#)
            .await;
        let malformed = usecase
            .handle_frame(alice, r#"{"event":"join_conversation","data":{}}"#)
            .await;
        let not_json = usecase.handle_frame(alice, "hello").await;

        // then (期待する結果):
        assert_eq!(unknown, Err(RelayError::UnknownConnection(stranger)));
        assert_eq!(
            unsupported,
            Err(RelayError::UnsupportedEvent("dance".to_string()))
        );
        assert!(matches!(malformed, Err(RelayError::MalformedFrame(_))));
        assert!(matches!(not_json, Err(RelayError::MalformedFrame(_))));
    }

    #[tokio::test]
    async fn test_unregister_removes_connection() {
        // テスト項目: 切断した接続は登録から外れ、メッセージが届かなくなる
        // given (前提条件):
        let usecase = RelayUseCase::new();
        let (alice, _alice_rx) = connect(&usecase, "7").await;
        let (bob, _bob_rx) = connect(&usecase, "8").await;

        // when (操作):
        usecase.unregister(bob).await;

        // then (期待する結果):
        assert_eq!(usecase.connection_count().await, 1);
        assert_eq!(
            usecase.rooms_of(bob).await,
            Err(RelayError::UnknownConnection(bob))
        );
        assert!(usecase.rooms_of(alice).await.is_ok());
    }
}
