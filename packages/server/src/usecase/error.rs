//! UseCase layer errors.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelayError {
    #[error("connection {0} is not registered")]
    UnknownConnection(Uuid),

    #[error("unsupported event '{0}'")]
    UnsupportedEvent(String),

    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    #[error("failed to encode frame: {0}")]
    Encode(String),
}

impl From<serde_json::Error> for RelayError {
    fn from(e: serde_json::Error) -> Self {
        Self::Encode(e.to_string())
    }
}
