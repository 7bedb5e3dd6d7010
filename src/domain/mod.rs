//! Core domain types for the chat relay.
//!
//! These are plain values with validation at the boundary; everything else in
//! the crate moves them around without re-checking.

mod store;

pub use store::{RoomInfo, RoomStore, StoreError};

#[cfg(test)]
pub(crate) use store::MockRoomStore;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque room identifier, used as the registry key.
///
/// Rooms are provisioned by an external collaborator; the relay only requires
/// the identifier to be non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    pub fn new(value: String) -> Result<Self, DomainError> {
        if value.trim().is_empty() {
            return Err(DomainError::EmptyRoomId);
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RoomId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of an authenticated user, assigned by the external auth layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(Uuid);

impl UserId {
    pub fn new(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Identifier of one physical connection.
///
/// A session belongs to exactly one room for its whole lifetime and is never
/// re-registered under a new id. The hub keys its registry on this value
/// instead of holding back-references into the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Authenticated identity attached to a request before the connection upgrade
/// is permitted. Threaded explicitly into session construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: UserId,
    pub user_name: String,
}

/// One chat message, immutable once constructed by a session's read task.
///
/// Handed first to the persistence collaborator, then to the hub as a
/// broadcast request. Shared between recipients via `Arc`, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub room_id: RoomId,
    pub sender_id: UserId,
    pub sender_name: String,
    pub body: String,
    pub sent_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(room_id: RoomId, sender: &Identity, body: String, sent_at: DateTime<Utc>) -> Self {
        Self {
            room_id,
            sender_id: sender.user_id,
            sender_name: sender.user_name.clone(),
            body,
            sent_at,
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("room id must not be empty")]
    EmptyRoomId,
}
