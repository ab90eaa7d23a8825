//! Utilities shared by the Ichiba client and the development relay server.

pub mod logger;
pub mod time;
