//! Room registry: who is connected right now, per room.
//!
//! Pure data owned exclusively by the hub loop. Distinct from "who is
//! authorized to be in a room", which the persistence collaborator resolves
//! before a connection is ever upgraded.

use std::collections::HashMap;

use crate::domain::{RoomId, SessionId};

use super::OutboundSender;

/// Mapping from room id to the set of currently connected sessions.
///
/// Each entry holds the only sender half of that session's bounded outbound
/// queue, so removing an entry drops the sender and closes the queue exactly
/// once. An empty room keeps its entry until `delete_room`.
#[derive(Default)]
pub(super) struct RoomRegistry {
    rooms: HashMap<RoomId, HashMap<SessionId, OutboundSender>>,
}

impl RoomRegistry {
    /// Insert a session into a room, creating the room on first registration.
    ///
    /// Idempotent: returns `false` and drops `queue` if the session is already
    /// present.
    pub(super) fn insert(
        &mut self,
        room_id: RoomId,
        session_id: SessionId,
        queue: OutboundSender,
    ) -> bool {
        let members = self.rooms.entry(room_id).or_default();
        if members.contains_key(&session_id) {
            return false;
        }
        members.insert(session_id, queue);
        true
    }

    /// Remove a session from a room, returning its queue sender if present.
    ///
    /// Idempotent: absent room or session is a no-op. The room entry itself
    /// stays even when it becomes empty.
    pub(super) fn remove(
        &mut self,
        room_id: &RoomId,
        session_id: &SessionId,
    ) -> Option<OutboundSender> {
        self.rooms.get_mut(room_id)?.remove(session_id)
    }

    /// Ensure a registry entry exists for the room.
    pub(super) fn create_room(&mut self, room_id: RoomId) {
        self.rooms.entry(room_id).or_default();
    }

    /// Drop the room and all member queues, closing them.
    pub(super) fn delete_room(&mut self, room_id: &RoomId) -> usize {
        self.rooms.remove(room_id).map_or(0, |members| members.len())
    }

    pub(super) fn members(
        &self,
        room_id: &RoomId,
    ) -> impl Iterator<Item = (&SessionId, &OutboundSender)> {
        self.rooms.get(room_id).into_iter().flatten()
    }

    pub(super) fn room_size(&self, room_id: &RoomId) -> usize {
        self.rooms.get(room_id).map_or(0, HashMap::len)
    }

    pub(super) fn contains_room(&self, room_id: &RoomId) -> bool {
        self.rooms.contains_key(room_id)
    }
}
