//! HTTP/WebSocket surface built on axum.

mod auth;
mod handler;
mod runner;
mod signal;
mod state;

pub use auth::header_identity;
pub use runner::{router, run_server};
pub use state::AppState;
