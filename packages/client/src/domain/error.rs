//! Error types for the realtime connection subsystem.

use std::time::Duration;

use thiserror::Error;

use super::EventCategory;

/// Errors surfaced to callers of the connection, room and emit operations.
///
/// `Clone` because one in-flight connect outcome is shared by every caller
/// that awaited it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RealtimeError {
    /// The stored credential is malformed or expired
    #[error("credential is malformed or expired")]
    InvalidCredential,

    /// Connect attempted with nothing stored
    #[error("no credential is stored")]
    NoCredential,

    /// The channel did not reach `Connected` within the bound
    #[error("connection was not established within {0:?}")]
    ConnectionTimeout(Duration),

    /// Every retry attempt failed, or the server rejected the credential
    #[error("connection refused after {attempts} attempt(s)")]
    ConnectionRefused { attempts: u32 },

    /// Outbound command attempted without an established channel
    #[error("cannot emit '{0}' without an established channel")]
    EmitWhileDisconnected(&'static str),

    /// An in-flight connect was aborted by `disconnect()`
    #[error("connection attempt aborted by disconnect")]
    ConnectionAborted,

    /// The command could not be serialized into a wire frame
    #[error("failed to encode command: {0}")]
    Encode(String),
}

/// Errors from the credential store and its validation rules.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialError {
    #[error("invalid credential: {0}")]
    InvalidCredential(String),

    #[error("invalid identity: {0}")]
    InvalidIdentity(String),

    /// `update_identity` called while signed out
    #[error("no identity is currently held")]
    NoIdentity,

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors from the persisted credential storage.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("storage I/O error: {0}")]
    Io(String),

    #[error("persisted session is corrupt: {0}")]
    Corrupt(String),
}

/// Errors reported by a [`Transport`](super::Transport) handshake.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The server refused the presented credential
    #[error("handshake rejected: {0}")]
    Rejected(String),

    #[error("handshake failed: {0}")]
    Handshake(String),

    #[error("handshake did not complete within {0:?}")]
    Timeout(Duration),
}

/// Errors decoding an inbound wire frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("malformed frame: {0}")]
    Malformed(String),

    #[error("unknown event category '{0}'")]
    UnknownCategory(String),
}

/// A registered listener failed while handling an event.
///
/// Always recovered by the dispatcher; never aborts delivery to siblings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("listener for '{category}' failed: {message}")]
pub struct ListenerFault {
    pub category: EventCategory,
    pub message: String,
}
