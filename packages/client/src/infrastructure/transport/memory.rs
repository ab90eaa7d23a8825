//! インメモリの Transport 実装
//!
//! ハンドシェイク結果をスクリプトで指定でき、受け付けたチャンネルのサーバー側
//! （`ServerPeer`）を取り出して送受信を直接操作できます。

use std::{collections::VecDeque, sync::Arc, time::Duration};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::domain::{Channel, ChannelEvent, Credential, Transport, TransportError};

/// Scripted result of one `open` call
#[derive(Debug, Clone)]
pub enum HandshakeOutcome {
    Accept,
    Fail(TransportError),
    /// Never completes
    Hang,
}

/// Server side of an accepted in-memory channel
#[derive(Debug)]
pub struct ServerPeer {
    /// Frames the client emitted, in order
    pub received: mpsc::UnboundedReceiver<String>,
    /// Feed frames or a close notification to the client
    pub events: mpsc::UnboundedSender<ChannelEvent>,
    /// Raw credential presented at handshake
    pub credential: String,
}

impl ServerPeer {
    /// Deliver a text frame to the client. Returns `false` if the client side is gone.
    pub fn push_frame(&self, text: impl Into<String>) -> bool {
        self.events.send(ChannelEvent::Frame(text.into())).is_ok()
    }

    /// Simulate a transport-level drop of the channel.
    pub fn close(&self, reason: impl Into<String>) {
        let _ = self.events.send(ChannelEvent::Closed(Some(reason.into())));
    }

    /// Everything the client emitted so far, without waiting
    pub fn drain(&mut self) -> Vec<String> {
        let mut frames = Vec::new();
        while let Ok(frame) = self.received.try_recv() {
            frames.push(frame);
        }
        frames
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    script: VecDeque<HandshakeOutcome>,
    open_delay: Duration,
    opens: u32,
    peers: VecDeque<ServerPeer>,
}

/// In-process transport with scripted handshake outcomes
///
/// Once the script is exhausted every handshake is accepted.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTransport {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every handshake by `delay` before its outcome applies
    pub fn with_open_delay(self, delay: Duration) -> Self {
        self.state.lock().open_delay = delay;
        self
    }

    pub fn push_outcome(&self, outcome: HandshakeOutcome) {
        self.state.lock().script.push_back(outcome);
    }

    pub fn push_outcomes(&self, outcomes: impl IntoIterator<Item = HandshakeOutcome>) {
        self.state.lock().script.extend(outcomes);
    }

    /// Number of handshakes attempted so far
    pub fn opens(&self) -> u32 {
        self.state.lock().opens
    }

    /// Oldest accepted channel not yet taken
    pub fn take_peer(&self) -> Option<ServerPeer> {
        self.state.lock().peers.pop_front()
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn open(&self, credential: &Credential) -> Result<Channel, TransportError> {
        let (outcome, delay) = {
            let mut state = self.state.lock();
            state.opens += 1;
            let outcome = state.script.pop_front().unwrap_or(HandshakeOutcome::Accept);
            (outcome, state.open_delay)
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match outcome {
            HandshakeOutcome::Accept => {
                let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
                let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
                self.state.lock().peers.push_back(ServerPeer {
                    received: outbound_rx,
                    events: inbound_tx,
                    credential: credential.as_str().to_string(),
                });
                Ok(Channel {
                    outbound: outbound_tx,
                    inbound: inbound_rx,
                })
            }
            HandshakeOutcome::Fail(error) => Err(error),
            HandshakeOutcome::Hang => std::future::pending().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::encode_unsigned;
    use serde_json::json;

    fn credential() -> Credential {
        Credential::parse(encode_unsigned(&json!({"sub": "1"}))).unwrap()
    }

    #[tokio::test]
    async fn test_scripted_outcomes_then_accept() {
        // テスト項目: スクリプトの結果が順に適用され、その後は受け付けられる
        // given (前提条件):
        let transport = InMemoryTransport::new();
        transport.push_outcome(HandshakeOutcome::Fail(TransportError::Handshake(
            "boom".to_string(),
        )));

        // when (操作):
        let first = transport.open(&credential()).await;
        let second = transport.open(&credential()).await;

        // then (期待する結果):
        assert!(first.is_err());
        assert!(second.is_ok());
        assert_eq!(transport.opens(), 2);
    }

    #[tokio::test]
    async fn test_peer_sees_client_frames_and_feeds_events() {
        // テスト項目: サーバー側ピアがクライアントのフレームを受信し、イベントを送れる
        // given (前提条件):
        let transport = InMemoryTransport::new();
        let mut channel = transport.open(&credential()).await.unwrap();
        let mut peer = transport.take_peer().unwrap();

        // when (操作):
        channel.outbound.send("hello".to_string()).unwrap();
        peer.push_frame("world");
        peer.close("bye");

        // then (期待する結果):
        assert_eq!(peer.drain(), vec!["hello".to_string()]);
        assert_eq!(
            channel.inbound.recv().await,
            Some(ChannelEvent::Frame("world".to_string()))
        );
        assert_eq!(
            channel.inbound.recv().await,
            Some(ChannelEvent::Closed(Some("bye".to_string())))
        );
        assert_eq!(peer.credential, credential().as_str());
    }
}
