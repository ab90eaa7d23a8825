//! Inbound events and outbound commands crossing the channel boundary.

use std::fmt;

/// Category an inbound event is dispatched under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventCategory {
    NewMessage,
    MessageSent,
    MessageError,
    MessageFiltered,
    UserTyping,
    UserStoppedTyping,
    ProposalUpdated,
    /// Channel established
    Connect,
    /// Channel lost or torn down
    Disconnect,
    /// A handshake attempt failed
    ConnectError,
}

impl EventCategory {
    pub const ALL: [EventCategory; 10] = [
        Self::NewMessage,
        Self::MessageSent,
        Self::MessageError,
        Self::MessageFiltered,
        Self::UserTyping,
        Self::UserStoppedTyping,
        Self::ProposalUpdated,
        Self::Connect,
        Self::Disconnect,
        Self::ConnectError,
    ];

    /// Event name on the wire
    pub const fn wire_name(self) -> &'static str {
        match self {
            Self::NewMessage => "newMessage",
            Self::MessageSent => "message_sent",
            Self::MessageError => "message_error",
            Self::MessageFiltered => "message_filtered",
            Self::UserTyping => "user_typing",
            Self::UserStoppedTyping => "user_stopped_typing",
            Self::ProposalUpdated => "proposal_updated",
            Self::Connect => "connect",
            Self::Disconnect => "disconnect",
            Self::ConnectError => "connect_error",
        }
    }

    pub fn from_wire_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.wire_name() == name)
    }

    /// Lifecycle categories are raised locally, never received as frames.
    pub const fn is_lifecycle(self) -> bool {
        matches!(self, Self::Connect | Self::Disconnect | Self::ConnectError)
    }
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// A chat message as delivered or acknowledged by the server
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Message {
    pub id: Option<String>,
    pub conversation_id: Option<String>,
    pub sender_id: Option<String>,
    pub recipient_id: Option<String>,
    pub content: String,
    pub message_type: Option<String>,
    pub order_id: Option<String>,
    pub created_at: Option<String>,
}

/// Why a message was not delivered
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryFailure {
    pub reason: String,
    pub message_id: Option<String>,
}

/// Typing start/stop signal from another user
#[derive(Debug, Clone, PartialEq)]
pub struct TypingSignal {
    pub originator_id: String,
    pub conversation_id: Option<String>,
}

/// Status change of a proposal attached to an order
#[derive(Debug, Clone, PartialEq)]
pub struct ProposalUpdate {
    pub proposal_id: String,
    pub status: String,
    pub order_id: Option<String>,
}

/// Event handed to listeners
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    NewMessage(Message),
    MessageSent(Message),
    MessageError(DeliveryFailure),
    MessageFiltered(DeliveryFailure),
    UserTyping(TypingSignal),
    UserStoppedTyping(TypingSignal),
    ProposalUpdated(ProposalUpdate),
    Connected,
    Disconnected { reason: String },
    ConnectError { reason: String },
}

impl InboundEvent {
    pub fn category(&self) -> EventCategory {
        match self {
            Self::NewMessage(_) => EventCategory::NewMessage,
            Self::MessageSent(_) => EventCategory::MessageSent,
            Self::MessageError(_) => EventCategory::MessageError,
            Self::MessageFiltered(_) => EventCategory::MessageFiltered,
            Self::UserTyping(_) => EventCategory::UserTyping,
            Self::UserStoppedTyping(_) => EventCategory::UserStoppedTyping,
            Self::ProposalUpdated(_) => EventCategory::ProposalUpdated,
            Self::Connected => EventCategory::Connect,
            Self::Disconnected { .. } => EventCategory::Disconnect,
            Self::ConnectError { .. } => EventCategory::ConnectError,
        }
    }
}

/// Command emitted to the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundCommand {
    JoinConversation {
        conversation_id: String,
        other_user_id: Option<String>,
        order_id: Option<String>,
    },
    LeaveConversation {
        conversation_id: String,
        order_id: Option<String>,
    },
    SendMessage {
        recipient_id: String,
        content: String,
        message_type: Option<String>,
        order_id: Option<String>,
    },
    TypingStart {
        recipient_id: String,
        conversation_id: Option<String>,
    },
    TypingStop {
        recipient_id: String,
        conversation_id: Option<String>,
    },
}

impl OutboundCommand {
    /// Command name on the wire
    pub const fn name(&self) -> &'static str {
        match self {
            Self::JoinConversation { .. } => "join_conversation",
            Self::LeaveConversation { .. } => "leave_conversation",
            Self::SendMessage { .. } => "send_message",
            Self::TypingStart { .. } => "typing_start",
            Self::TypingStop { .. } => "typing_stop",
        }
    }
}
