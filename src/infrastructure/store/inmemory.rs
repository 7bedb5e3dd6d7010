//! In-memory `RoomStore` used by the demo binary and the integration tests.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::domain::{RoomId, RoomInfo, RoomStore, StoreError, UserId};

#[derive(Debug, Clone)]
#[allow(dead_code)] // sender/time are kept for parity with a SQL row
struct StoredMessage {
    sender_id: UserId,
    body: String,
    sent_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct RoomRecord {
    name: String,
    /// An open room admits any authenticated user (demo binary only).
    open: bool,
    members: HashSet<UserId>,
    messages: Vec<StoredMessage>,
}

/// HashMap-backed store. Rooms and memberships are provisioned through the
/// inherent methods; the relay consumes only the trait.
#[derive(Default)]
pub struct InMemoryRoomStore {
    rooms: Mutex<HashMap<RoomId, RoomRecord>>,
}

impl InMemoryRoomStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provision a room.
    pub async fn add_room(&self, room_id: RoomId, name: &str) {
        let mut rooms = self.rooms.lock().await;
        rooms.entry(room_id).or_default().name = name.to_string();
    }

    /// Provision a room that admits any authenticated user.
    pub async fn add_open_room(&self, room_id: RoomId, name: &str) {
        let mut rooms = self.rooms.lock().await;
        let record = rooms.entry(room_id).or_default();
        record.name = name.to_string();
        record.open = true;
    }

    /// Grant a user membership of a room.
    pub async fn add_member(&self, room_id: &RoomId, user_id: UserId) {
        let mut rooms = self.rooms.lock().await;
        if let Some(record) = rooms.get_mut(room_id) {
            record.members.insert(user_id);
        }
    }

    /// Number of messages recorded for a room.
    pub async fn message_count(&self, room_id: &RoomId) -> usize {
        let rooms = self.rooms.lock().await;
        rooms.get(room_id).map_or(0, |r| r.messages.len())
    }

    /// Bodies of the messages recorded for a room, in storage order.
    pub async fn message_bodies(&self, room_id: &RoomId) -> Vec<String> {
        let rooms = self.rooms.lock().await;
        rooms
            .get(room_id)
            .map(|r| r.messages.iter().map(|m| m.body.clone()).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl RoomStore for InMemoryRoomStore {
    async fn store_message(
        &self,
        room_id: &RoomId,
        sender_id: &UserId,
        body: &str,
        sent_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut rooms = self.rooms.lock().await;
        let record = rooms
            .get_mut(room_id)
            .ok_or_else(|| StoreError::RoomNotFound(room_id.as_str().to_string()))?;
        record.messages.push(StoredMessage {
            sender_id: *sender_id,
            body: body.to_string(),
            sent_at,
        });
        Ok(())
    }

    async fn is_member(&self, room_id: &RoomId, user_id: &UserId) -> Result<bool, StoreError> {
        let rooms = self.rooms.lock().await;
        Ok(rooms
            .get(room_id)
            .is_some_and(|record| record.open || record.members.contains(user_id)))
    }

    async fn list_rooms_for_user(&self, user_id: &UserId) -> Result<Vec<RoomInfo>, StoreError> {
        let rooms = self.rooms.lock().await;
        let mut infos: Vec<RoomInfo> = rooms
            .iter()
            .filter(|(_, record)| record.open || record.members.contains(user_id))
            .map(|(id, record)| RoomInfo {
                id: id.clone(),
                name: record.name.clone(),
            })
            .collect();
        infos.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
        Ok(infos)
    }
}
