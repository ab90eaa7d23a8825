//! Navigator for the terminal client.
//!
//! A terminal has no pages, so "navigating" to the authentication entry point
//! means telling the user to sign in again and remembering where they are.

use parking_lot::Mutex;

use crate::domain::Navigator;

#[derive(Debug)]
pub struct TerminalNavigator {
    location: Mutex<String>,
}

impl TerminalNavigator {
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: Mutex::new(location.into()),
        }
    }
}

impl Navigator for TerminalNavigator {
    fn current_location(&self) -> String {
        self.location.lock().clone()
    }

    fn navigate(&self, location: &str) {
        println!(
            "\n!! Authorization was rejected. Sign in again (--token) to continue. [{}]",
            location
        );
        *self.location.lock() = location.to_string();
    }
}
