//! Persistence collaborator trait.
//!
//! The relay consumes this interface but does not own the durable store. The
//! trait is defined here so the session and UI layers depend on the domain's
//! contract rather than on a concrete backend (dependency inversion, same as
//! the repository seam in the rest of the crate).

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{RoomId, UserId};

/// Summary of a room a user belongs to.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RoomInfo {
    pub id: RoomId,
    pub name: String,
}

/// Durable store for messages and room membership.
///
/// `store_message` is called by a session's read task before any broadcast is
/// submitted: content that could not be persisted is never delivered.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RoomStore: Send + Sync {
    /// Durably record one message.
    async fn store_message(
        &self,
        room_id: &RoomId,
        sender_id: &UserId,
        body: &str,
        sent_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Whether `user_id` is authorized to join `room_id`.
    async fn is_member(&self, room_id: &RoomId, user_id: &UserId) -> Result<bool, StoreError>;

    /// Rooms the user belongs to, for the dashboard listing.
    async fn list_rooms_for_user(&self, user_id: &UserId) -> Result<Vec<RoomInfo>, StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("room '{0}' not found")]
    RoomNotFound(String),
    #[error("storage backend failure: {0}")]
    Backend(String),
}
