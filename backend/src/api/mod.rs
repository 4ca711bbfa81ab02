//! HTTP API module.
//!
//! HTTP server, response types and the log broadcaster for the walletcards
//! backend.

pub mod logs;
pub mod server;
pub mod types;

pub use logs::*;
pub use server::{router, start_server, AccessGate, AppState, ACCESS_KEY_HEADER};
pub use types::*;
