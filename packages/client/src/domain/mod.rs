//! Domain layer: credential rules, connection state, rooms, events and ports.

mod connection;
mod credential;
mod error;
mod event;
mod hook;
mod identity;
mod navigation;
mod room;
mod storage;
mod transport;

pub use connection::{ConnectionState, ReconnectPolicy};
pub use credential::{Claims, Credential, TokenValidator, encode_unsigned};
pub use error::{
    CredentialError, FrameError, ListenerFault, RealtimeError, StorageError, TransportError,
};
pub use event::{
    DeliveryFailure, EventCategory, InboundEvent, Message, OutboundCommand, ProposalUpdate,
    TypingSignal,
};
pub use hook::SessionHook;
pub use identity::{Identity, IdentityPatch};
#[cfg(test)]
pub use navigation::MockNavigator;
pub use navigation::Navigator;
pub use room::{RoomEntry, RoomKey, RoomMembership};
#[cfg(test)]
pub use storage::MockCredentialStorage;
pub use storage::{CredentialStorage, PersistedSession};
pub use transport::{Channel, ChannelEvent, Transport};
