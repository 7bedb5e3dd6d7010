//! Real-time chat relay library.
//!
//! Clients hold persistent WebSocket connections; a message sent by one room
//! member is durably recorded, then fanned out to every live connection in
//! that room. Room membership is owned by a single hub loop, so no locks
//! guard shared state and a slow consumer never stalls the rest of a room.

// layers
pub mod domain;
pub mod hub;
pub mod infrastructure;
pub mod session;
pub mod ui;

// shared library
pub mod common;
