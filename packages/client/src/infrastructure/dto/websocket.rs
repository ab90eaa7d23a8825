//! WebSocket frame DTOs.
//!
//! Every frame is a JSON envelope `{"event": "<name>", "data": {...}}`.
//! Payload field names are camelCase. Identifiers are accepted as strings or
//! numbers and always serialized as strings.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Frame envelope shared by both directions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireFrame {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

// ========================================
// Outbound payloads
// ========================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinConversationPayload {
    pub conversation_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub other_user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveConversationPayload {
    pub conversation_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessagePayload {
    pub recipient_id: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
}

/// Payload of both `typing_start` and `typing_stop`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingPayload {
    pub recipient_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

// ========================================
// Inbound payloads
// ========================================

/// Payload of `newMessage` and `message_sent`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePayload {
    #[serde(default, alias = "_id", deserialize_with = "optional_id")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "optional_id")]
    pub conversation_id: Option<String>,
    #[serde(default, deserialize_with = "optional_id")]
    pub sender_id: Option<String>,
    #[serde(default, deserialize_with = "optional_id")]
    pub recipient_id: Option<String>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub message_type: Option<String>,
    #[serde(default, deserialize_with = "optional_id")]
    pub order_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Payload of `message_error` and `message_filtered`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryFailurePayload {
    #[serde(default, alias = "error", alias = "message")]
    pub reason: Option<String>,
    #[serde(default, deserialize_with = "optional_id")]
    pub message_id: Option<String>,
}

/// Payload of `user_typing` and `user_stopped_typing`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingEventPayload {
    #[serde(alias = "userId", alias = "senderId", deserialize_with = "required_id")]
    pub originator_id: String,
    #[serde(default, deserialize_with = "optional_id")]
    pub conversation_id: Option<String>,
}

/// Payload of `proposal_updated`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalUpdatedPayload {
    #[serde(alias = "id", deserialize_with = "required_id")]
    pub proposal_id: String,
    pub status: String,
    #[serde(default, deserialize_with = "optional_id")]
    pub order_id: Option<String>,
}

fn id_from_value<E: serde::de::Error>(value: Value) -> Result<Option<String>, E> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        other => Err(E::custom(format!(
            "expected string or number identifier, found {other}"
        ))),
    }
}

fn optional_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    id_from_value(Value::deserialize(deserializer)?)
}

fn required_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    id_from_value(Value::deserialize(deserializer)?)?
        .ok_or_else(|| serde::de::Error::custom("identifier must not be null"))
}
