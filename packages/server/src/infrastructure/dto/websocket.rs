//! WebSocket wire frames.
//!
//! Every frame is `{"event": <name>, "data": <payload>}` with camelCase payload
//! fields. Identifiers may arrive as strings or numbers.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Frame received from a client
#[derive(Debug, Clone, Deserialize)]
pub struct ClientFrame {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

/// Frame pushed to a client
#[derive(Debug, Clone, Serialize)]
pub struct ServerFrame<T: Serialize> {
    pub event: &'static str,
    pub data: T,
}

impl<T: Serialize> ServerFrame<T> {
    pub fn new(event: &'static str, data: T) -> Self {
        Self { event, data }
    }

    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

fn id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected a string or number identifier, found {}",
            other
        ))),
    }
}

fn optional_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected a string or number identifier, found {}",
            other
        ))),
    }
}

// ========================================
// Client → Server
// ========================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinConversationPayload {
    #[serde(deserialize_with = "id")]
    pub conversation_id: String,
    #[serde(default, deserialize_with = "optional_id")]
    pub other_user_id: Option<String>,
    #[serde(default, deserialize_with = "optional_id")]
    pub order_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveConversationPayload {
    #[serde(deserialize_with = "id")]
    pub conversation_id: String,
    #[serde(default, deserialize_with = "optional_id")]
    pub order_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessagePayload {
    #[serde(deserialize_with = "id")]
    pub recipient_id: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub message_type: Option<String>,
    #[serde(default, deserialize_with = "optional_id")]
    pub order_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingPayload {
    #[serde(deserialize_with = "id")]
    pub recipient_id: String,
    #[serde(default, deserialize_with = "optional_id")]
    pub conversation_id: Option<String>,
}

// ========================================
// Server → Client
// ========================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDto {
    pub id: String,
    pub sender_id: String,
    pub recipient_id: String,
    pub content: String,
    pub message_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryFailureDto {
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingSignalDto {
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalUpdatedDto {
    pub proposal_id: String,
    pub status: String,
    pub order_id: String,
}
