//! Connection state and reconnection policy.
//!
//! This module contains pure functions that implement the retry rules
//! without side effects, making them easy to test.

use std::{fmt, time::Duration};

use super::TransportError;

/// Lifecycle state of the single realtime channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No channel, nothing in flight.
    #[default]
    Disconnected,
    /// First handshake attempt in progress.
    Connecting,
    /// Channel established; outbound emission allowed.
    Connected,
    /// Retrying after a failed attempt or a lost channel.
    Reconnecting,
    /// Retry budget exhausted or credential rejected.
    Failed,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Returns true while a handshake is in progress.
    pub fn is_transitioning(&self) -> bool {
        matches!(self, Self::Connecting | Self::Reconnecting)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected => write!(f, "Connected"),
            Self::Reconnecting => write!(f, "Reconnecting"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

/// Fixed-delay retry budget for handshake attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl ReconnectPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// Check if the retry loop must stop immediately based on the error type.
    ///
    /// A rejected credential will be rejected again; retrying only burns attempts.
    pub fn should_give_up_immediately(error: &TransportError) -> bool {
        matches!(error, TransportError::Rejected(_))
    }

    /// Check if another handshake attempt should be made.
    ///
    /// # Arguments
    ///
    /// * `error` - The error of the attempt that just failed
    /// * `failed_attempts` - Consecutive failed attempts so far, including this one
    ///
    /// # Returns
    ///
    /// `true` if another attempt should be scheduled, `false` otherwise
    pub fn should_attempt_reconnect(&self, error: &TransportError, failed_attempts: u32) -> bool {
        if Self::should_give_up_immediately(error) {
            return false;
        }

        failed_attempts < self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> ReconnectPolicy {
        ReconnectPolicy::new(5, Duration::from_millis(10))
    }

    #[test]
    fn test_should_give_up_immediately_with_rejection() {
        // テスト項目: 資格情報が拒否された場合、即座に再試行を止めるべきと判定される
        // given (前提条件):
        let error = TransportError::Rejected("401 Unauthorized".to_string());

        // when (操作):
        let result = ReconnectPolicy::should_give_up_immediately(&error);

        // then (期待する結果):
        assert!(result);
    }

    #[test]
    fn test_should_give_up_immediately_with_handshake_error() {
        // テスト項目: 通常のハンドシェイク失敗では即座に止めるべきではないと判定される
        // given (前提条件):
        let error = TransportError::Handshake("connection reset".to_string());

        // when (操作):
        let result = ReconnectPolicy::should_give_up_immediately(&error);

        // then (期待する結果):
        assert!(!result);
    }

    #[test]
    fn test_should_attempt_reconnect_within_limit() {
        // テスト項目: 失敗回数が上限未満の場合、再接続すべきと判定される
        // given (前提条件):
        let error = TransportError::Handshake("network error".to_string());

        // when (操作):
        let first = policy().should_attempt_reconnect(&error, 1);
        let one_before_limit = policy().should_attempt_reconnect(&error, 4);

        // then (期待する結果):
        assert!(first);
        assert!(one_before_limit);
    }

    #[test]
    fn test_should_attempt_reconnect_at_limit() {
        // テスト項目: 失敗回数が上限に達した場合、再接続すべきではないと判定される
        // given (前提条件):
        let error = TransportError::Timeout(Duration::from_secs(1));

        // when (操作):
        let result = policy().should_attempt_reconnect(&error, 5);

        // then (期待する結果):
        assert!(!result);
    }

    #[test]
    fn test_should_attempt_reconnect_with_rejection() {
        // テスト項目: 拒否エラーの場合、回数に関わらず再接続すべきではないと判定される
        // given (前提条件):
        let error = TransportError::Rejected("403 Forbidden".to_string());

        // when (操作):
        let result = policy().should_attempt_reconnect(&error, 1);

        // then (期待する結果):
        assert!(!result);
    }

    #[test]
    fn test_connection_state_predicates() {
        // テスト項目: 状態の判定メソッドが正しく動作する
        // given (前提条件):
        let states = [
            ConnectionState::Disconnected,
            ConnectionState::Connecting,
            ConnectionState::Connected,
            ConnectionState::Reconnecting,
            ConnectionState::Failed,
        ];

        // when (操作):
        let connected: Vec<bool> = states.iter().map(|s| s.is_connected()).collect();
        let transitioning: Vec<bool> = states.iter().map(|s| s.is_transitioning()).collect();

        // then (期待する結果):
        assert_eq!(connected, [false, false, true, false, false]);
        assert_eq!(transitioning, [false, true, false, true, false]);
    }
}
