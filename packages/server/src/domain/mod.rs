//! Domain layer: bearer admission, content inspection and room identity.

mod bearer;
mod content;
mod room;

pub use bearer::{AuthenticatedUser, BearerError, authenticate};
pub use content::{ContentVerdict, inspect_content};
pub use room::RoomKey;
