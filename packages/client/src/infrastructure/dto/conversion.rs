//! Conversion logic between wire DTOs and domain events/commands.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::domain::{
    DeliveryFailure, EventCategory, FrameError, InboundEvent, Message, OutboundCommand,
    ProposalUpdate, TypingSignal,
};
use crate::infrastructure::dto::websocket as dto;

// ========================================
// Domain Command → DTO
// ========================================

impl TryFrom<&OutboundCommand> for dto::WireFrame {
    type Error = serde_json::Error;

    fn try_from(command: &OutboundCommand) -> Result<Self, Self::Error> {
        let data = match command.clone() {
            OutboundCommand::JoinConversation {
                conversation_id,
                other_user_id,
                order_id,
            } => serde_json::to_value(dto::JoinConversationPayload {
                conversation_id,
                other_user_id,
                order_id,
            })?,
            OutboundCommand::LeaveConversation {
                conversation_id,
                order_id,
            } => serde_json::to_value(dto::LeaveConversationPayload {
                conversation_id,
                order_id,
            })?,
            OutboundCommand::SendMessage {
                recipient_id,
                content,
                message_type,
                order_id,
            } => serde_json::to_value(dto::SendMessagePayload {
                recipient_id,
                content,
                message_type,
                order_id,
            })?,
            OutboundCommand::TypingStart {
                recipient_id,
                conversation_id,
            }
            | OutboundCommand::TypingStop {
                recipient_id,
                conversation_id,
            } => serde_json::to_value(dto::TypingPayload {
                recipient_id,
                conversation_id,
            })?,
        };

        Ok(Self {
            event: command.name().to_string(),
            data,
        })
    }
}

/// Serialize a command into the text frame sent over the channel
pub fn encode_command(command: &OutboundCommand) -> Result<String, serde_json::Error> {
    let frame = dto::WireFrame::try_from(command)?;
    serde_json::to_string(&frame)
}

// ========================================
// DTO → Domain Event
// ========================================

impl From<dto::MessagePayload> for Message {
    fn from(dto: dto::MessagePayload) -> Self {
        Self {
            id: dto.id,
            conversation_id: dto.conversation_id,
            sender_id: dto.sender_id,
            recipient_id: dto.recipient_id,
            content: dto.content,
            message_type: dto.message_type,
            order_id: dto.order_id,
            created_at: dto.created_at,
        }
    }
}

impl From<dto::DeliveryFailurePayload> for DeliveryFailure {
    fn from(dto: dto::DeliveryFailurePayload) -> Self {
        Self {
            reason: dto.reason.unwrap_or_else(|| "unspecified".to_string()),
            message_id: dto.message_id,
        }
    }
}

impl From<dto::TypingEventPayload> for TypingSignal {
    fn from(dto: dto::TypingEventPayload) -> Self {
        Self {
            originator_id: dto.originator_id,
            conversation_id: dto.conversation_id,
        }
    }
}

impl From<dto::ProposalUpdatedPayload> for ProposalUpdate {
    fn from(dto: dto::ProposalUpdatedPayload) -> Self {
        Self {
            proposal_id: dto.proposal_id,
            status: dto.status,
            order_id: dto.order_id,
        }
    }
}

fn payload<T: DeserializeOwned>(event: &str, data: Value) -> Result<T, FrameError> {
    serde_json::from_value(data)
        .map_err(|e| FrameError::Malformed(format!("'{}' payload: {}", event, e)))
}

impl TryFrom<dto::WireFrame> for InboundEvent {
    type Error = FrameError;

    fn try_from(frame: dto::WireFrame) -> Result<Self, Self::Error> {
        let category = EventCategory::from_wire_name(&frame.event)
            .ok_or_else(|| FrameError::UnknownCategory(frame.event.clone()))?;
        let event = frame.event.as_str();
        let data = frame.data;

        let inbound = match category {
            EventCategory::NewMessage => {
                Self::NewMessage(payload::<dto::MessagePayload>(event, data)?.into())
            }
            EventCategory::MessageSent => {
                Self::MessageSent(payload::<dto::MessagePayload>(event, data)?.into())
            }
            EventCategory::MessageError => {
                Self::MessageError(payload::<dto::DeliveryFailurePayload>(event, data)?.into())
            }
            EventCategory::MessageFiltered => {
                Self::MessageFiltered(payload::<dto::DeliveryFailurePayload>(event, data)?.into())
            }
            EventCategory::UserTyping => {
                Self::UserTyping(payload::<dto::TypingEventPayload>(event, data)?.into())
            }
            EventCategory::UserStoppedTyping => {
                Self::UserStoppedTyping(payload::<dto::TypingEventPayload>(event, data)?.into())
            }
            EventCategory::ProposalUpdated => {
                Self::ProposalUpdated(payload::<dto::ProposalUpdatedPayload>(event, data)?.into())
            }
            EventCategory::Connect | EventCategory::Disconnect | EventCategory::ConnectError => {
                return Err(FrameError::Malformed(format!(
                    "'{}' is a local lifecycle event and cannot arrive as a frame",
                    event
                )));
            }
        };

        Ok(inbound)
    }
}

/// Parse a text frame received from the channel
pub fn decode_frame(text: &str) -> Result<InboundEvent, FrameError> {
    let frame: dto::WireFrame =
        serde_json::from_str(text).map_err(|e| FrameError::Malformed(e.to_string()))?;
    InboundEvent::try_from(frame)
}
