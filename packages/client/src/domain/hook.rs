//! Hooks run by `ConnectionManager` at channel lifecycle boundaries.

use async_trait::async_trait;

use super::OutboundCommand;

/// Participant in the channel lifecycle
///
/// `replay_commands` runs every time a channel is established, before the
/// pending connect resolves, so replayed commands precede any command issued by
/// a caller after the connect. `reset` runs on an explicit `disconnect()`.
#[async_trait]
pub trait SessionHook: Send + Sync {
    /// Commands to emit on a fresh channel, in order
    async fn replay_commands(&self) -> Vec<OutboundCommand>;

    /// Forget state that must not survive an explicit disconnect
    async fn reset(&self);
}
