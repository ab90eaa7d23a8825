//! HTTP and WebSocket handlers.

mod http;
mod websocket;

pub use http::{health_check, notify_proposal};
pub use websocket::websocket_handler;
