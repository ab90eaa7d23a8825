//! Transport trait 定義
//!
//! ConnectionManager が必要とするチャンネル生成のインターフェースを定義します。
//! 具体的な実装（WebSocket、インメモリ）は Infrastructure 層が提供します（依存性の逆転）。

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{Credential, TransportError};

/// Event produced by the server side of an open channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// A text frame from the server
    Frame(String),
    /// The channel closed, with the reason if known
    Closed(Option<String>),
}

/// An open, authenticated, bidirectional channel
///
/// Dropping `outbound` closes the channel from the client side.
#[derive(Debug)]
pub struct Channel {
    /// Serialized frames to the server
    pub outbound: mpsc::UnboundedSender<String>,
    /// Frames and close notifications from the server, in delivery order
    pub inbound: mpsc::UnboundedReceiver<ChannelEvent>,
}

/// Transport trait
///
/// Opens one channel per call. Retrying, timeouts across attempts and state
/// tracking belong to `ConnectionManager`, not to the transport.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open a channel, presenting `credential` at handshake time
    async fn open(&self, credential: &Credential) -> Result<Channel, TransportError>;
}
