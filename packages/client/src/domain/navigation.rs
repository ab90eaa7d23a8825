//! Navigation port used by the authorization-rejection protocol.

/// Where the user currently is, and how to send them elsewhere
#[cfg_attr(test, mockall::automock)]
pub trait Navigator: Send + Sync {
    /// Current location, e.g. `/orders/12`
    fn current_location(&self) -> String;

    /// Move the user to `location`
    fn navigate(&self, location: &str);
}
