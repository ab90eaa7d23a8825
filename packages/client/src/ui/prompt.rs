//! UI utilities for the client prompt.

use std::io::Write;

pub fn prompt_for(user_id: &str) -> String {
    format!("{}> ", user_id)
}

/// Redisplay the prompt after printing an inbound event
pub fn redisplay_prompt(user_id: &str) {
    print!("{}", prompt_for(user_id));
    std::io::stdout().flush().ok();
}
