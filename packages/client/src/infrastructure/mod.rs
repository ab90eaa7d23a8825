//! Infrastructure layer: wire DTOs, transports and credential storage.

pub mod dto;
pub mod storage;
pub mod transport;
