//! Terminal UI helpers for the `ichiba-client` binary.

pub mod command;
pub mod formatter;
pub mod navigator;
pub mod prompt;
