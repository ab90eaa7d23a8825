//! Development relay server for the Ichiba realtime protocol.
//!
//! Authenticates WebSocket upgrades with a bearer credential, tracks joined
//! conversation rooms per connection and relays messages and typing signals
//! between users. Nothing is persisted.

// layers
pub mod domain;
pub mod infrastructure;
pub mod ui;
pub mod usecase;
