//! Data Transfer Objects (DTOs) for the realtime wire protocol.
//!
//! - `websocket`: frame envelope and payload DTOs
//! - `conversion`: DTO ⇄ domain conversion

pub mod conversion;
pub mod websocket;
