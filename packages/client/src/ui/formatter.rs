//! Inbound event formatting for terminal display.

use ichiba_shared::time::{get_timestamp_millis, timestamp_to_jst_rfc3339};

use crate::domain::{DeliveryFailure, InboundEvent, Message, ProposalUpdate, TypingSignal};

const RULE: &str = "------------------------------------------------------------";

/// Event formatter for client display
pub struct EventFormatter;

impl EventFormatter {
    /// Format any inbound event
    ///
    /// # Arguments
    ///
    /// * `event` - The event to display
    /// * `current_user_id` - The signed-in user's ID (to mark as "me")
    pub fn format_event(event: &InboundEvent, current_user_id: &str) -> String {
        match event {
            InboundEvent::NewMessage(message) => Self::format_message(message, current_user_id),
            InboundEvent::MessageSent(message) => Self::format_sent_confirmation(message),
            InboundEvent::MessageError(failure) => Self::format_failure("not delivered", failure),
            InboundEvent::MessageFiltered(failure) => Self::format_failure("filtered", failure),
            InboundEvent::UserTyping(signal) => Self::format_typing(signal, true),
            InboundEvent::UserStoppedTyping(signal) => Self::format_typing(signal, false),
            InboundEvent::ProposalUpdated(update) => Self::format_proposal(update),
            InboundEvent::Connected => "\n* connected\n".to_string(),
            InboundEvent::Disconnected { reason } => format!("\n* disconnected ({})\n", reason),
            InboundEvent::ConnectError { reason } => format!("\n* connect failed: {}\n", reason),
        }
    }

    /// Format a chat message
    pub fn format_message(message: &Message, current_user_id: &str) -> String {
        let sender = message.sender_id.as_deref().unwrap_or("unknown");
        let me_suffix = if sender == current_user_id { " (me)" } else { "" };
        format!(
            "\n\n{}\n@{}{}: {}\nsent at {}\n{}\n",
            RULE,
            sender,
            me_suffix,
            message.content,
            Self::sent_at(message),
            RULE
        )
    }

    /// Format a delivery acknowledgment
    pub fn format_sent_confirmation(message: &Message) -> String {
        format!("\nsent at {}\n", Self::sent_at(message))
    }

    pub fn format_failure(kind: &str, failure: &DeliveryFailure) -> String {
        format!("\n! message {}: {}\n", kind, failure.reason)
    }

    pub fn format_typing(signal: &TypingSignal, typing: bool) -> String {
        if typing {
            format!("\n... {} is typing\n", signal.originator_id)
        } else {
            format!("\n... {} stopped typing\n", signal.originator_id)
        }
    }

    pub fn format_proposal(update: &ProposalUpdate) -> String {
        match &update.order_id {
            Some(order_id) => format!(
                "\n# proposal {} is now {} (order {})\n",
                update.proposal_id, update.status, order_id
            ),
            None => format!(
                "\n# proposal {} is now {}\n",
                update.proposal_id, update.status
            ),
        }
    }

    /// Server timestamp if present, otherwise local receive time in JST
    fn sent_at(message: &Message) -> String {
        message
            .created_at
            .clone()
            .or_else(|| timestamp_to_jst_rfc3339(get_timestamp_millis()))
            .unwrap_or_else(|| "unknown time".to_string())
    }
}
