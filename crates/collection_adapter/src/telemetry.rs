//! Structured logging setup shared by every binary that embeds the adapter.

mod config;
mod init;

pub use self::config::*;
pub use init::*;
