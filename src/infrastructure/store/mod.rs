//! Persistence collaborator implementations.
//!
//! The relay itself only ever talks to the [`crate::domain::RoomStore`]
//! trait; a production deployment plugs in its SQL-backed implementation
//! here.

mod inmemory;

pub use inmemory::InMemoryRoomStore;
