//! Parsing of lines typed at the client prompt.

/// What the user asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputCommand {
    /// Plain text: send it as a message
    Send(String),
    Typing,
    StopTyping,
    Join(String),
    Leave(String),
    Reconnect,
    Logout,
    Help,
    /// Slash command that is not recognized, or is missing its argument
    Invalid(String),
}

impl InputCommand {
    /// Parse one trimmed, non-empty input line
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        let Some(rest) = line.strip_prefix('/') else {
            return Self::Send(line.to_string());
        };

        let mut parts = rest.splitn(2, char::is_whitespace);
        let name = parts.next().unwrap_or_default();
        let argument = parts.next().map(str::trim).filter(|a| !a.is_empty());

        match (name, argument) {
            ("typing", None) => Self::Typing,
            ("stop-typing", None) => Self::StopTyping,
            ("join", Some(id)) => Self::Join(id.to_string()),
            ("leave", Some(id)) => Self::Leave(id.to_string()),
            ("reconnect", None) => Self::Reconnect,
            ("logout", None) => Self::Logout,
            ("help", _) => Self::Help,
            _ => Self::Invalid(line.to_string()),
        }
    }
}

pub const HELP: &str = "\
Commands:
  <text>            send a message to the recipient
  /typing           signal that you are typing
  /stop-typing      signal that you stopped typing
  /join <id>        join a conversation room
  /leave <id>       leave a conversation room
  /reconnect        drop and re-establish the channel
  /logout           sign out and close the channel
  /help             show this help";
