//! Conversation room identity.

use std::fmt;

/// A conversation, optionally scoped to an order
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoomKey {
    pub conversation_id: String,
    pub order_id: Option<String>,
}

impl RoomKey {
    pub fn new(conversation_id: impl Into<String>, order_id: Option<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            order_id,
        }
    }
}

impl fmt::Display for RoomKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.order_id {
            Some(order_id) => write!(f, "{}@{}", self.conversation_id, order_id),
            None => f.write_str(&self.conversation_id),
        }
    }
}
