//! Conversation room membership.

use super::OutboundCommand;

/// Identity of a room: a conversation, optionally scoped to an order
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

/// A room the caller asked to join, with the extra join parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomEntry {
    pub key: RoomKey,
    pub other_user_id: Option<String>,
}

impl RoomEntry {
    pub fn join_command(&self) -> OutboundCommand {
        OutboundCommand::JoinConversation {
            conversation_id: self.key.conversation_id.clone(),
            other_user_id: self.other_user_id.clone(),
            order_id: self.key.order_id.clone(),
        }
    }
}

/// Insertion-ordered set of rooms the caller believes it has joined
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoomMembership {
    entries: Vec<RoomEntry>,
}

impl RoomMembership {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a room. Returns `false` if it was already a member.
    ///
    /// A repeated join keeps the original position and takes the newest
    /// `other_user_id`.
    pub fn insert(&mut self, entry: RoomEntry) -> bool {
        match self.entries.iter_mut().find(|e| e.key == entry.key) {
            Some(existing) => {
                existing.other_user_id = entry.other_user_id;
                false
            }
            None => {
                self.entries.push(entry);
                true
            }
        }
    }

    /// Forget a room. Returns `false` if it was not a member.
    pub fn remove(&mut self, key: &RoomKey) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| &e.key != key);
        self.entries.len() != before
    }

    pub fn contains(&self, key: &RoomKey) -> bool {
        self.entries.iter().any(|e| &e.key == key)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RoomEntry> {
        self.entries.iter()
    }

    /// Join commands for every member, in insertion order
    pub fn join_commands(&self) -> Vec<OutboundCommand> {
        self.entries.iter().map(RoomEntry::join_command).collect()
    }
}
