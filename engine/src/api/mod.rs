//! HTTP API module.
//!
//! Import/export endpoints over the impex engine, plus a broadcast
//! logger streamed to clients via SSE.

pub mod logs;
pub mod server;
pub mod types;

pub use server::start_server;
pub use types::*;
