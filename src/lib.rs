//! Client-side TELNET sessions for driving network device command lines.

pub mod config;
pub mod error;
pub mod session;
