//! Configuration of the realtime connection subsystem.

use std::time::Duration;

use crate::domain::ReconnectPolicy;

pub const DEFAULT_URL: &str = "ws://127.0.0.1:8080/ws";
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(20);
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_AUTH_ENTRY_PATH: &str = "/login";

/// Settings for [`RealtimeContext`](crate::RealtimeContext) and its services
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RealtimeConfig {
    /// Channel endpoint
    pub url: String,
    /// Bound on a whole `connect()`, retries included
    pub connect_timeout: Duration,
    /// Bound on a single handshake attempt
    pub handshake_timeout: Duration,
    /// Fixed delay between attempts
    pub reconnect_delay: Duration,
    /// Consecutive failed attempts before giving up
    pub max_attempts: u32,
    /// Where the user is sent after an authorization rejection
    pub auth_entry_path: String,
    /// Locations that already are (re-)authentication entry points
    pub auth_entry_points: Vec<String>,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            auth_entry_path: DEFAULT_AUTH_ENTRY_PATH.to_string(),
            auth_entry_points: vec![DEFAULT_AUTH_ENTRY_PATH.to_string(), "/register".to_string()],
        }
    }
}

impl RealtimeConfig {
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// At least one attempt is always made.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_auth_entry_path(mut self, path: impl Into<String>) -> Self {
        let path = path.into();
        if !self.auth_entry_points.contains(&path) {
            self.auth_entry_points.push(path.clone());
        }
        self.auth_entry_path = path;
        self
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy::new(self.max_attempts, self.reconnect_delay)
    }
}
