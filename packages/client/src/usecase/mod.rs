//! UseCase layer: services coordinating the domain through its ports.

mod authorization_guard;
pub(crate) mod connection_manager;
mod credential_store;
mod event_dispatcher;
mod room_tracker;

pub use authorization_guard::{AuthorizationGuard, RejectionOutcome};
pub use connection_manager::ConnectionManager;
pub use credential_store::{AuthSession, CredentialStore};
pub use event_dispatcher::{DispatchReport, EventDispatcher, ListenerResult, Subscription};
pub use room_tracker::RoomTracker;
