//! HTTP API module.
//!
//! HTTP server, response envelopes and the log broadcaster shared with the
//! CLI.

pub mod logs;
pub mod server;
pub mod types;

pub use logs::*;
pub use server::start_server;
pub use types::*;
