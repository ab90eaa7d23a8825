//! Transport の実装
//!
//! ## 実装
//!
//! - `websocket`: tokio-tungstenite を使った WebSocket 実装
//! - `memory`: プロセス内で完結するインメモリ実装（テスト・組み込み用）

pub mod memory;
pub mod websocket;

pub use memory::{HandshakeOutcome, InMemoryTransport, ServerPeer};
pub use websocket::WebSocketTransport;
