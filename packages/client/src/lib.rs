//! Realtime connection client for Ichiba.
//!
//! One authenticated, persistent channel per process: credential validity
//! gating, deduplicated connect with bounded retries, conversation room
//! tracking that survives reconnects, and ordered dispatch of inbound events.
//!
//! Everything hangs off a [`RealtimeContext`] constructed once at start-up.

// layers
pub mod domain;
pub mod infrastructure;
pub mod ui;
pub mod usecase;

pub mod config;
pub mod context;

pub use config::RealtimeConfig;
pub use context::RealtimeContext;
pub use domain::{ConnectionState, EventCategory, Identity, InboundEvent, RealtimeError};
