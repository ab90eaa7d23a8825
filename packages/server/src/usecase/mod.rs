//! UseCase layer: connection registry and event relaying.

mod error;
mod relay;

pub use error::RelayError;
pub use relay::{PusherChannel, RelayUseCase, SendOutcome};
